//! Vendor SDK seam.
//!
//! The camera vendor ships a C library with process-wide state: one selected
//! camera, one streaming pipeline, one frame callback. [`CameraSdk`] mirrors
//! that surface with typed feature keys so the rest of the workspace never
//! deals with raw out-parameters or selector registers.

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdkError {
    #[error("SDK not initialized")]
    NotInitialized,
    #[error("no camera selected")]
    NoCameraSelected,
    #[error("unknown camera: {0}")]
    UnknownCamera(String),
    #[error("{feature:?} not available on the selected camera")]
    FeatureUnavailable { feature: Feature },
    #[error("{feature:?}: expected a {expected} value")]
    TypeMismatch {
        feature: Feature,
        expected: &'static str,
    },
    #[error("{feature:?}: value {value} rejected by hardware")]
    OutOfRange { feature: Feature, value: String },
    #[error("{call} failed: {reason}")]
    CallFailed { call: &'static str, reason: String },
}

/// Camera family as reported by the SDK after `update()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCode {
    Undefined,
    CRed2,
    CRed3,
    CBlue1,
}

/// Cropping window for the C-RED family. Column/row bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cropping {
    pub col1: u16,
    pub col2: u16,
    pub row1: u16,
    pub row2: u16,
}

/// One-shot camera commands with no value attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkCommand {
    BuildBias,
    ShutDown,
}

/// Gain domain addressed by the SFNC gain selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainSelector {
    AnalogAll,
    DigitalAll,
}

/// Hardware feature keys.
///
/// C-RED features go through the generic camera/Cred accessors; the rest are
/// C-BLUE registers (vendor `Cblue1_*` and SFNC `CblueSfnc_*` calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Fps,
    FpsMax,
    /// Integration time in seconds.
    Tint,
    TintMin,
    TintMax,
    BiasEnabled,
    SensorTemp,
    SensorTempSetpoint,
    TemperatureSelector,
    CoolingSetpoint,
    AcquisitionFrameRate,
    AcquisitionFrameRateMin,
    AcquisitionFrameRateMax,
    /// Exposure time in microseconds.
    ExposureTime,
    ExposureTimeMin,
    ExposureTimeMax,
    Gain(GainSelector),
    ConversionEfficiency,
    PixelFormat,
    ReverseX,
    ReverseY,
    FanMode,
    DeviceStatus,
    OffsetX,
    OffsetY,
    Width,
    Height,
    /// Full sensor width. Available on every family.
    WidthMax,
    HeightMax,
}

/// Value carried by a [`Feature`]. Hardware enums travel as their raw code.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Enum(u32),
    Text(String),
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureSelector {
    Sensor = 0,
    Cpu = 1,
    Power = 2,
    Frontend = 3,
    Heatsink = 4,
    Case = 5,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionEfficiency {
    Low = 0,
    High = 1,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Mono8 = 0,
    Mono12 = 1,
}

impl PixelFormat {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Mono8),
            1 => Some(Self::Mono12),
            _ => None,
        }
    }

    pub fn bit_depth(self) -> u32 {
        match self {
            Self::Mono8 => 8,
            Self::Mono12 => 12,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Mono8 => 1,
            Self::Mono12 => 2,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Automatic = 0,
    Manual = 1,
}

/// Callback invoked on the SDK's delivery thread with one raw frame.
pub type FrameCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// The vendor SDK surface.
///
/// Implementations hold process-wide state; callers serialize control calls
/// themselves. Frame delivery happens on a thread owned by the implementation.
pub trait CameraSdk: Send + Sync {
    fn init(&self) -> Result<(), SdkError>;
    fn exit(&self);

    fn detect_grabbers(&self) -> Result<usize, SdkError>;
    fn detect_cameras(&self) -> Result<Vec<String>, SdkError>;
    fn set_camera(&self, name: &str) -> Result<(), SdkError>;
    fn set_buffer_size(&self, frames: usize) -> Result<(), SdkError>;
    fn update(&self) -> Result<(), SdkError>;
    fn camera_model(&self) -> ModelCode;

    fn start(&self) -> Result<(), SdkError>;
    fn stop(&self) -> Result<(), SdkError>;
    fn set_frame_callback(&self, callback: Option<FrameCallback>);

    fn current_image_dimension(&self) -> Result<(u16, u16), SdkError>;
    /// Raw frame from the SDK ring buffer; `-1` is the most recent one.
    fn raw_image(&self, index: i64) -> Option<Vec<u8>>;

    fn cropping(&self) -> Result<(bool, Cropping), SdkError>;
    fn set_cropping(&self, enabled: bool, cropping: Cropping) -> Result<(), SdkError>;

    fn get(&self, feature: Feature) -> Result<FeatureValue, SdkError>;
    fn set(&self, feature: Feature, value: FeatureValue) -> Result<(), SdkError>;

    fn send_command(&self, command: &str) -> Result<String, SdkError>;
    /// Returns `(status, diagnostic)` strings.
    fn status_detailed(&self) -> Result<(String, String), SdkError>;
    fn execute(&self, command: SdkCommand) -> Result<(), SdkError>;

    fn get_f64(&self, feature: Feature) -> Result<f64, SdkError> {
        match self.get(feature)? {
            FeatureValue::Float(v) => Ok(v),
            FeatureValue::Int(v) => Ok(v as f64),
            _ => Err(SdkError::TypeMismatch {
                feature,
                expected: "float",
            }),
        }
    }

    fn get_i64(&self, feature: Feature) -> Result<i64, SdkError> {
        match self.get(feature)? {
            FeatureValue::Int(v) => Ok(v),
            _ => Err(SdkError::TypeMismatch {
                feature,
                expected: "integer",
            }),
        }
    }

    fn get_bool(&self, feature: Feature) -> Result<bool, SdkError> {
        match self.get(feature)? {
            FeatureValue::Bool(v) => Ok(v),
            _ => Err(SdkError::TypeMismatch {
                feature,
                expected: "boolean",
            }),
        }
    }

    fn get_enum(&self, feature: Feature) -> Result<u32, SdkError> {
        match self.get(feature)? {
            FeatureValue::Enum(v) => Ok(v),
            _ => Err(SdkError::TypeMismatch {
                feature,
                expected: "enum",
            }),
        }
    }

    fn get_text(&self, feature: Feature) -> Result<String, SdkError> {
        match self.get(feature)? {
            FeatureValue::Text(v) => Ok(v),
            _ => Err(SdkError::TypeMismatch {
                feature,
                expected: "text",
            }),
        }
    }
}
