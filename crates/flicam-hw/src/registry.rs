//! Camera enumeration and active-variant selection.
//!
//! Discovery failures never surface as errors: a machine with no grabber or
//! no camera simply enumerates to an empty list, which callers display as
//! "no camera".

use crate::sdk::{CameraSdk, SdkError};
use crate::variant::Variant;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("camera not found: {0}")]
    HardwareNotFound(String),
    #[error("camera selection failed: {0}")]
    Sdk(#[from] SdkError),
}

/// A camera discovered by one enumeration pass.
///
/// Handles from an earlier pass are stale once `enumerate()` runs again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraHandle {
    index: usize,
    generation: u64,
    name: String,
}

impl CameraHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl std::fmt::Display for CameraHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Owns the discovered cameras and the active-variant selector.
pub struct VariantRegistry {
    sdk: Arc<dyn CameraSdk>,
    buffer_frames: usize,
    generation: u64,
    cameras: Vec<CameraHandle>,
    active: Option<CameraHandle>,
    variant: Variant,
}

impl VariantRegistry {
    pub fn new(sdk: Arc<dyn CameraSdk>, buffer_frames: usize) -> Self {
        Self {
            sdk,
            buffer_frames,
            generation: 0,
            cameras: Vec::new(),
            active: None,
            variant: Variant::Unknown,
        }
    }

    /// Discover grabbers and cameras, discarding all previous handles.
    pub fn enumerate(&mut self) -> Vec<CameraHandle> {
        self.generation += 1;
        self.cameras.clear();
        self.active = None;
        self.variant = Variant::Unknown;

        let grabbers = match self.sdk.detect_grabbers() {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "grabber detection failed");
                0
            }
        };
        if grabbers == 0 {
            tracing::info!("no frame grabber detected");
            return Vec::new();
        }

        let names = match self.sdk.detect_cameras() {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, grabbers, "camera detection failed");
                Vec::new()
            }
        };

        let generation = self.generation;
        self.cameras = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| CameraHandle {
                index,
                generation,
                name,
            })
            .collect();

        tracing::info!(grabbers, cameras = self.cameras.len(), "camera enumeration complete");
        self.cameras.clone()
    }

    /// Select `handle` on the SDK and classify its variant.
    ///
    /// Does not start streaming. On failure the previous selection stays.
    pub fn select(&mut self, handle: &CameraHandle) -> Result<Variant, RegistryError> {
        if handle.generation != self.generation || !self.cameras.contains(handle) {
            return Err(RegistryError::HardwareNotFound(handle.name.clone()));
        }

        self.sdk.set_camera(&handle.name).map_err(|e| match e {
            SdkError::UnknownCamera(name) => RegistryError::HardwareNotFound(name),
            other => RegistryError::Sdk(other),
        })?;
        self.sdk.set_buffer_size(self.buffer_frames)?;
        self.sdk.update()?;

        let variant = Variant::from(self.sdk.camera_model());
        self.active = Some(handle.clone());
        self.variant = variant;
        tracing::info!(camera = %handle, ?variant, "camera selected");
        Ok(variant)
    }

    /// Select a camera from the current enumeration by display name.
    pub fn select_by_name(&mut self, name: &str) -> Result<Variant, RegistryError> {
        let handle = self
            .cameras
            .iter()
            .find(|h| h.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::HardwareNotFound(name.to_string()))?;
        self.select(&handle)
    }

    pub fn active_variant(&self) -> Variant {
        self.variant
    }

    pub fn active_camera(&self) -> Option<&CameraHandle> {
        self.active.as_ref()
    }

    pub fn cameras(&self) -> &[CameraHandle] {
        &self.cameras
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::ModelCode;
    use crate::sim::{SimCall, SimulatedSdk};

    fn registry(sim: &Arc<SimulatedSdk>) -> VariantRegistry {
        sim.init().unwrap();
        VariantRegistry::new(sim.clone(), 500)
    }

    #[test]
    fn test_enumerate_empty_without_grabber() {
        let sim = Arc::new(SimulatedSdk::new().with_camera("a", ModelCode::CRed2));
        sim.set_grabbers(0);
        let mut reg = registry(&sim);
        assert!(reg.enumerate().is_empty());
        assert!(!sim.calls().contains(&SimCall::DetectCameras));
        assert_eq!(reg.active_variant(), Variant::Unknown);
    }

    #[test]
    fn test_enumerate_empty_when_sdk_not_ready() {
        let sim = Arc::new(SimulatedSdk::new().with_camera("a", ModelCode::CRed2));
        let mut reg = VariantRegistry::new(sim.clone(), 500);
        assert!(reg.enumerate().is_empty());
    }

    #[test]
    fn test_select_classifies_variant() {
        let sim = Arc::new(
            SimulatedSdk::new()
                .with_camera("red", ModelCode::CRed3)
                .with_camera("blue", ModelCode::CBlue1),
        );
        let mut reg = registry(&sim);
        let handles = reg.enumerate();
        assert_eq!(handles.len(), 2);
        assert_eq!(reg.select(&handles[1]).unwrap(), Variant::CblueOne);
        assert_eq!(reg.active_variant(), Variant::CblueOne);
        assert_eq!(reg.active_camera().map(CameraHandle::name), Some("blue"));
        assert!(sim.calls().contains(&SimCall::SetBufferSize(500)));
        assert_eq!(reg.select_by_name("red").unwrap(), Variant::CredThree);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let sim = Arc::new(SimulatedSdk::new().with_camera("red", ModelCode::CRed2));
        let mut reg = registry(&sim);
        let old = reg.enumerate();
        reg.enumerate();
        assert!(matches!(
            reg.select(&old[0]),
            Err(RegistryError::HardwareNotFound(_))
        ));
    }

    #[test]
    fn test_unplugged_camera_is_not_found() {
        let sim = Arc::new(SimulatedSdk::new().with_camera("red", ModelCode::CRed2));
        let mut reg = registry(&sim);
        let handles = reg.enumerate();
        sim.unplug_all();
        assert!(matches!(
            reg.select(&handles[0]),
            Err(RegistryError::HardwareNotFound(_))
        ));
        assert_eq!(reg.active_variant(), Variant::Unknown);
    }

    #[test]
    fn test_select_unknown_name() {
        let sim = Arc::new(SimulatedSdk::new());
        let mut reg = registry(&sim);
        reg.enumerate();
        assert!(matches!(
            reg.select_by_name("ghost"),
            Err(RegistryError::HardwareNotFound(_))
        ));
    }
}
