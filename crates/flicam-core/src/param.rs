//! Named runtime parameters.
//!
//! Every parameter the host can see has a stable display name, a value kind
//! and optionally a closed set of allowed values. Which ones are registered
//! depends on the active variant; see [`crate::model::CameraModel::parameters`].

use crate::error::ControlError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamId {
    // Device level
    DetectCameras,
    Binning,
    Cameras,
    // Every camera
    CameraStatus,
    Shutdown,
    // C-RED family
    MaximumExposureMs,
    MaximumFps,
    SetMaxExposure,
    SetMaxFps,
    BuildBias,
    ApplyBias,
    Fps,
    SendCommand,
    SetSensorTemp,
    SensorTemp,
    // C-BLUE
    TemperatureSelector,
    CoolingSetpoint,
    FrameRate,
    FrameRateMin,
    FrameRateMax,
    ExposureTime,
    ExposureTimeMin,
    ExposureTimeMax,
    Gain,
    ConversionEfficiency,
    PixelFormat,
    ReverseX,
    ReverseY,
    FanMode,
    DeviceStatus,
}

impl ParamId {
    pub const ALL: [ParamId; 30] = [
        Self::DetectCameras,
        Self::Binning,
        Self::Cameras,
        Self::CameraStatus,
        Self::Shutdown,
        Self::MaximumExposureMs,
        Self::MaximumFps,
        Self::SetMaxExposure,
        Self::SetMaxFps,
        Self::BuildBias,
        Self::ApplyBias,
        Self::Fps,
        Self::SendCommand,
        Self::SetSensorTemp,
        Self::SensorTemp,
        Self::TemperatureSelector,
        Self::CoolingSetpoint,
        Self::FrameRate,
        Self::FrameRateMin,
        Self::FrameRateMax,
        Self::ExposureTime,
        Self::ExposureTimeMin,
        Self::ExposureTimeMax,
        Self::Gain,
        Self::ConversionEfficiency,
        Self::PixelFormat,
        Self::ReverseX,
        Self::ReverseY,
        Self::FanMode,
        Self::DeviceStatus,
    ];

    /// Display name shown to the host.
    pub fn name(self) -> &'static str {
        match self {
            Self::DetectCameras => "Detect cameras",
            Self::Binning => "Binning",
            Self::Cameras => "Cameras",
            Self::CameraStatus => "Camera Status",
            Self::Shutdown => "Shutdown",
            Self::MaximumExposureMs => "MaximumExposureMs",
            Self::MaximumFps => "MaximumFps",
            Self::SetMaxExposure => "Set max exposure",
            Self::SetMaxFps => "Set max fps",
            Self::BuildBias => "Build bias",
            Self::ApplyBias => "Apply bias",
            Self::Fps => "FPS",
            Self::SendCommand => "Send command",
            Self::SetSensorTemp => "Set sensor temp",
            Self::SensorTemp => "Sensor Temp",
            Self::TemperatureSelector => "Temperature Selector",
            Self::CoolingSetpoint => "Cooling Setpoint",
            Self::FrameRate => "Frame Rate",
            Self::FrameRateMin => "Frame Rate Min",
            Self::FrameRateMax => "Frame Rate Max",
            Self::ExposureTime => "Exposure Time (ms)",
            Self::ExposureTimeMin => "Exposure Time Min",
            Self::ExposureTimeMax => "Exposure Time Max",
            Self::Gain => "Gain",
            Self::ConversionEfficiency => "Conversion Efficiency",
            Self::PixelFormat => "Pixel Format",
            Self::ReverseX => "Reverse X",
            Self::ReverseY => "Reverse Y",
            Self::FanMode => "Fan Mode",
            Self::DeviceStatus => "Device Status",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.name() == name)
    }

    /// Device-level parameters are handled by the device itself, never by a
    /// variant model.
    pub fn is_device_level(self) -> bool {
        matches!(self, Self::DetectCameras | Self::Binning | Self::Cameras)
    }
}

impl std::fmt::Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Presented to the host as an integer restricted to `0`/`1`.
    Boolean,
    Integer,
    Float,
    Enumerated,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", u8::from(*b)),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Registration record for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    #[serde(skip)]
    pub id: ParamId,
    pub name: &'static str,
    pub kind: ParamKind,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl ParameterSpec {
    fn new(id: ParamId, kind: ParamKind) -> Self {
        Self {
            id,
            name: id.name(),
            kind,
            read_only: false,
            allowed: Vec::new(),
        }
    }

    pub fn boolean(id: ParamId) -> Self {
        let mut spec = Self::new(id, ParamKind::Boolean);
        spec.allowed = vec!["0".to_string(), "1".to_string()];
        spec
    }

    pub fn integer(id: ParamId) -> Self {
        Self::new(id, ParamKind::Integer)
    }

    pub fn float(id: ParamId) -> Self {
        Self::new(id, ParamKind::Float)
    }

    pub fn text(id: ParamId) -> Self {
        Self::new(id, ParamKind::Text)
    }

    pub fn enumerated<S: AsRef<str>>(id: ParamId, labels: &[S]) -> Self {
        let mut spec = Self::new(id, ParamKind::Enumerated);
        spec.allowed = labels.iter().map(|s| s.as_ref().to_string()).collect();
        spec
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Restrict an integer parameter to the given values.
    pub fn allow(mut self, values: &[i64]) -> Self {
        self.allowed = values.iter().map(i64::to_string).collect();
        self
    }

    /// Parse a host-supplied string into a value of this parameter's kind.
    ///
    /// Enumerated values and restricted integers must be one of `allowed`.
    pub fn coerce(&self, raw: &str) -> Result<ParamValue, ControlError> {
        let raw = raw.trim();
        let bad = || ControlError::invalid(self.name, raw);
        let value = match self.kind {
            ParamKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => ParamValue::Bool(true),
                "0" | "false" | "off" => ParamValue::Bool(false),
                _ => return Err(bad()),
            },
            ParamKind::Integer => ParamValue::Int(raw.parse().map_err(|_| bad())?),
            ParamKind::Float => {
                let v: f64 = raw.parse().map_err(|_| bad())?;
                if !v.is_finite() {
                    return Err(bad());
                }
                ParamValue::Float(v)
            }
            ParamKind::Enumerated | ParamKind::Text => ParamValue::Text(raw.to_string()),
        };
        let restricted = matches!(self.kind, ParamKind::Enumerated | ParamKind::Integer);
        if restricted && !self.allowed.is_empty() && !self.allowed.iter().any(|a| *a == value.to_string()) {
            return Err(bad());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique_and_resolvable() {
        for id in ParamId::ALL {
            assert_eq!(ParamId::from_name(id.name()), Some(id));
        }
        assert_eq!(ParamId::from_name("Exposure Time (ms)"), Some(ParamId::ExposureTime));
        assert_eq!(ParamId::from_name("exposure"), None);
    }

    #[test]
    fn test_coerce_boolean() {
        let spec = ParameterSpec::boolean(ParamId::ReverseX);
        assert_eq!(spec.coerce("1").unwrap(), ParamValue::Bool(true));
        assert_eq!(spec.coerce(" false ").unwrap(), ParamValue::Bool(false));
        assert!(matches!(
            spec.coerce("2"),
            Err(ControlError::InvalidParameterValue { .. })
        ));
    }

    #[test]
    fn test_coerce_float_rejects_garbage() {
        let spec = ParameterSpec::float(ParamId::Gain);
        assert_eq!(spec.coerce("30.5").unwrap(), ParamValue::Float(30.5));
        assert!(spec.coerce("fast").is_err());
        assert!(spec.coerce("NaN").is_err());
    }

    #[test]
    fn test_coerce_enumerated_checks_allowed() {
        let spec = ParameterSpec::enumerated(ParamId::FanMode, &["Auto", "Manual"]);
        assert_eq!(spec.coerce("Manual").unwrap(), ParamValue::Text("Manual".into()));
        assert!(spec.coerce("Turbo").is_err());
    }

    #[test]
    fn test_restricted_integer() {
        let spec = ParameterSpec::integer(ParamId::Binning).allow(&[1]);
        assert_eq!(spec.coerce("1").unwrap(), ParamValue::Int(1));
        assert!(spec.coerce("2").is_err());
    }

    #[test]
    fn test_bool_displays_as_integer() {
        assert_eq!(ParamValue::Bool(true).to_string(), "1");
        assert_eq!(ParamValue::Float(0.5).to_string(), "0.5");
    }
}
