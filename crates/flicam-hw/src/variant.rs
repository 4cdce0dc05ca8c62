//! Variant capability profiles.
//!
//! Maps each supported camera family to its capability profile: ROI
//! alignment, pixel depth, how frame dimensions are queried and, where the
//! hardware splits gain across domains, the analog ceiling. Profiles are
//! embedded at compile time from `profiles/*.toml`.

use crate::sdk::ModelCode;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

const PROFILE_CRED2: &str = include_str!("../profiles/cred2.toml");
const PROFILE_CRED3: &str = include_str!("../profiles/cred3.toml");
const PROFILE_CBLUE1: &str = include_str!("../profiles/cblue1.toml");

static PROFILE_DB: OnceLock<Vec<VariantProfile>> = OnceLock::new();

/// Hardware family of the active camera. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "cred2")]
    CredTwo,
    #[serde(rename = "cred3")]
    CredThree,
    #[serde(rename = "cblue1")]
    CblueOne,
}

impl Variant {
    /// Parse the short model tag used in profiles and configuration.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "cred2" => Some(Self::CredTwo),
            "cred3" => Some(Self::CredThree),
            "cblue1" => Some(Self::CblueOne),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_cred(self) -> bool {
        matches!(self, Self::CredTwo | Self::CredThree)
    }
}

impl From<ModelCode> for Variant {
    fn from(code: ModelCode) -> Self {
        match code {
            ModelCode::CRed2 => Self::CredTwo,
            ModelCode::CRed3 => Self::CredThree,
            ModelCode::CBlue1 => Self::CblueOne,
            ModelCode::Undefined => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(profile(*self).device.name.as_str())
    }
}

/// How the live frame dimensions are read back from hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionQuery {
    /// Cropping registers plus `current_image_dimension()`.
    Cropping,
    /// SFNC `Width`/`Height` registers.
    Sfnc,
    /// No camera: dimensions are 0×0.
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantProfile {
    pub device: ProfileDevice,
    pub roi: RoiAlignment,
    pub pixels: PixelCapabilities,
    #[serde(default)]
    pub gain: Option<GainSplit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileDevice {
    pub variant: Variant,
    pub name: String,
}

/// Pixel-block granularity as `[horizontal, vertical]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RoiAlignment {
    pub offset_alignment: [u32; 2],
    pub edge_alignment: [u32; 2],
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PixelCapabilities {
    pub bit_depth: u32,
    pub bytes_per_pixel: u32,
    pub dimension_query: DimensionQuery,
}

/// Composite gain: writes fill the analog domain up to the ceiling first.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GainSplit {
    pub analog_ceiling: f64,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("bad profile TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}: alignment granularity must be non-zero")]
    ZeroAlignment(String),
}

/// Parse and validate one embedded profile.
pub fn parse_profile(src: &str) -> Result<VariantProfile, ProfileError> {
    let profile: VariantProfile = toml::from_str(src)?;
    let all = profile
        .roi
        .offset_alignment
        .iter()
        .chain(profile.roi.edge_alignment.iter());
    if all.into_iter().any(|&g| g == 0) {
        return Err(ProfileError::ZeroAlignment(profile.device.name.clone()));
    }
    Ok(profile)
}

fn unknown_profile() -> VariantProfile {
    VariantProfile {
        device: ProfileDevice {
            variant: Variant::Unknown,
            name: "no camera".to_string(),
        },
        roi: RoiAlignment {
            offset_alignment: [1, 1],
            edge_alignment: [1, 1],
        },
        pixels: PixelCapabilities {
            bit_depth: 16,
            bytes_per_pixel: 2,
            dimension_query: DimensionQuery::None,
        },
        gain: None,
    }
}

fn profile_db() -> &'static Vec<VariantProfile> {
    PROFILE_DB.get_or_init(|| {
        let mut db = vec![unknown_profile()];
        for src in [PROFILE_CRED2, PROFILE_CRED3, PROFILE_CBLUE1] {
            match parse_profile(src) {
                Ok(p) => db.push(p),
                Err(e) => tracing::error!(error = %e, "skipping embedded variant profile"),
            }
        }
        db
    })
}

/// Capability profile for `variant`. Falls back to the no-camera profile.
pub fn profile(variant: Variant) -> &'static VariantProfile {
    let db = profile_db();
    db.iter()
        .find(|p| p.device.variant == variant)
        .unwrap_or(&db[0])
}

/// List all known profiles, the no-camera fallback first.
pub fn list_profiles() -> &'static [VariantProfile] {
    profile_db()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_profiles_parse() {
        assert_eq!(list_profiles().len(), 4);
    }

    #[test]
    fn test_cred_alignment() {
        let p = profile(Variant::CredTwo);
        assert_eq!(p.roi.offset_alignment, [32, 4]);
        assert_eq!(p.roi.edge_alignment, [32, 4]);
        assert_eq!(p.pixels.dimension_query, DimensionQuery::Cropping);
        assert!(p.gain.is_none());
    }

    #[test]
    fn test_cblue_profile() {
        let p = profile(Variant::CblueOne);
        assert_eq!(p.roi.offset_alignment, [16, 8]);
        assert_eq!(p.pixels.dimension_query, DimensionQuery::Sfnc);
        assert_eq!(p.gain.map(|g| g.analog_ceiling), Some(24.0));
    }

    #[test]
    fn test_unknown_falls_back() {
        let p = profile(Variant::Unknown);
        assert_eq!(p.pixels.dimension_query, DimensionQuery::None);
        assert_eq!(p.roi.offset_alignment, [1, 1]);
    }

    #[test]
    fn test_zero_alignment_rejected() {
        let src = r#"
            [device]
            variant = "cred2"
            name = "broken"
            [roi]
            offset_alignment = [0, 4]
            edge_alignment = [32, 4]
            [pixels]
            bit_depth = 16
            bytes_per_pixel = 2
            dimension_query = "cropping"
        "#;
        assert!(matches!(parse_profile(src), Err(ProfileError::ZeroAlignment(_))));
    }

    #[test]
    fn test_variant_from_model_code() {
        assert_eq!(Variant::from(ModelCode::CRed3), Variant::CredThree);
        assert_eq!(Variant::from(ModelCode::Undefined), Variant::Unknown);
        assert_eq!(Variant::from_tag("CBLUE1"), Some(Variant::CblueOne));
        assert_eq!(Variant::from_tag("cred9"), None);
    }
}
