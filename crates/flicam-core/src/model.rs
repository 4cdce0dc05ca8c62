//! Per-variant camera models.
//!
//! A [`CameraModel`] owns every piece of behavior that differs between
//! hardware families: which parameters exist, how each one maps onto SDK
//! features, how exposure is expressed, how the ROI is programmed and which
//! values are polled for status. The device holds exactly one model, chosen
//! from the active [`Variant`], and swaps it when the variant changes.

use crate::error::{ControlError, Outcome};
use crate::param::{ParamId, ParamValue, ParameterSpec};
use crate::roi::{RegionOfInterest, SensorBounds};
use flicam_hw::sdk::{
    CameraSdk, ConversionEfficiency, Cropping, FanMode, Feature, FeatureValue, GainSelector,
    PixelFormat, SdkCommand, TemperatureSelector,
};
use flicam_hw::variant::{profile, Variant};
use flicam_hw::{ByteOrder, FrameBufferDescriptor};
use std::sync::{Arc, Mutex, MutexGuard};

/// Analog gain ceiling used when a profile does not declare one.
pub const DEFAULT_ANALOG_CEILING: f64 = 24.0;

pub trait CameraModel: Send + Sync {
    fn variant(&self) -> Variant;

    /// Parameters this variant registers, in registration order.
    fn parameters(&self) -> Vec<ParameterSpec>;

    fn supports(&self, id: ParamId) -> bool {
        self.parameters().iter().any(|p| p.id == id)
    }

    fn read(&self, sdk: &dyn CameraSdk, id: ParamId) -> Result<Outcome<ParamValue>, ControlError>;

    fn write(
        &self,
        sdk: &dyn CameraSdk,
        id: ParamId,
        value: &ParamValue,
    ) -> Result<Outcome<()>, ControlError>;

    fn exposure_ms(&self, sdk: &dyn CameraSdk) -> Result<f64, ControlError>;
    fn set_exposure_ms(&self, sdk: &dyn CameraSdk, ms: f64) -> Result<(), ControlError>;

    /// Live full-sensor extent.
    fn sensor_bounds(&self, sdk: &dyn CameraSdk) -> Result<SensorBounds, ControlError>;

    /// Geometry of the frames the camera currently delivers.
    fn descriptor(&self, sdk: &dyn CameraSdk) -> Result<FrameBufferDescriptor, ControlError>;

    /// Program an already aligned region.
    fn apply_roi(&self, sdk: &dyn CameraSdk, roi: RegionOfInterest) -> Result<(), ControlError>;

    /// Region the hardware reports as applied.
    fn read_roi(&self, sdk: &dyn CameraSdk) -> Result<RegionOfInterest, ControlError>;

    /// Restore the full sensor and return it.
    fn clear_roi(&self, sdk: &dyn CameraSdk) -> Result<RegionOfInterest, ControlError>;

    /// Values refreshed once per supervisory tick.
    fn refresh_status(&self, sdk: &dyn CameraSdk) -> Vec<(ParamId, ParamValue)>;
}

/// Model for `variant`.
pub fn model_for(variant: Variant) -> Arc<dyn CameraModel> {
    match variant {
        Variant::CredTwo | Variant::CredThree => Arc::new(CredModel::new(variant)),
        Variant::CblueOne => Arc::new(CblueModel),
        Variant::Unknown => Arc::new(UnknownModel),
    }
}

/// Split a composite gain into `(analog, digital)`.
///
/// The analog domain is filled up to `ceiling` first; the remainder goes to
/// the digital domain, which is reset to zero when nothing is left over.
pub fn split_gain(total: f64, ceiling: f64) -> (f64, f64) {
    if total <= ceiling {
        (total, 0.0)
    } else {
        (ceiling, total - ceiling)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn common_parameters() -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::text(ParamId::CameraStatus).read_only(),
        ParameterSpec::boolean(ParamId::Shutdown),
    ]
}

fn camera_status(sdk: &dyn CameraSdk) -> Result<ParamValue, ControlError> {
    let (status, diagnostic) = sdk.status_detailed()?;
    Ok(ParamValue::Text(format!("{status}-{diagnostic}")))
}

fn expect_f64(id: ParamId, value: &ParamValue) -> Result<f64, ControlError> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ControlError::invalid(id.name(), value))
}

fn expect_bool(id: ParamId, value: &ParamValue) -> Result<bool, ControlError> {
    value
        .as_bool()
        .ok_or_else(|| ControlError::invalid(id.name(), value))
}

fn expect_text(id: ParamId, value: &ParamValue) -> Result<&str, ControlError> {
    value
        .as_text()
        .ok_or_else(|| ControlError::invalid(id.name(), value))
}

fn live_sensor_bounds(sdk: &dyn CameraSdk) -> Result<SensorBounds, ControlError> {
    let w = sdk.get_i64(Feature::WidthMax)?;
    let h = sdk.get_i64(Feature::HeightMax)?;
    Ok(SensorBounds {
        max_width: u32::try_from(w).unwrap_or(0),
        max_height: u32::try_from(h).unwrap_or(0),
    })
}

fn collect_status<M: CameraModel + ?Sized>(
    model: &M,
    sdk: &dyn CameraSdk,
    ids: &[ParamId],
) -> Vec<(ParamId, ParamValue)> {
    ids.iter()
        .filter_map(|&id| match model.read(sdk, id) {
            Ok(Outcome::Applied(v)) => Some((id, v)),
            Ok(Outcome::Unsupported) => None,
            Err(e) => {
                tracing::debug!(param = %id, error = %e, "status read failed");
                None
            }
        })
        .collect()
}

fn read_only(id: ParamId) -> ControlError {
    ControlError::ReadOnly(id.name().to_string())
}

// ---------------------------------------------------------------------------
// C-RED family
// ---------------------------------------------------------------------------

/// C-RED 2 and C-RED 3. Exposure is the integration time register in
/// seconds; the ROI is a cropping window with inclusive bounds.
pub struct CredModel {
    variant: Variant,
    last_response: Mutex<String>,
}

impl CredModel {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            last_response: Mutex::new(String::new()),
        }
    }

    fn has_sensor_temp(&self) -> bool {
        self.variant == Variant::CredTwo
    }

    fn response(&self) -> MutexGuard<'_, String> {
        self.last_response.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CameraModel for CredModel {
    fn variant(&self) -> Variant {
        self.variant
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        let mut params = common_parameters();
        params.extend([
            ParameterSpec::float(ParamId::MaximumExposureMs).read_only(),
            ParameterSpec::float(ParamId::MaximumFps).read_only(),
            ParameterSpec::boolean(ParamId::SetMaxExposure),
            ParameterSpec::boolean(ParamId::SetMaxFps),
            ParameterSpec::boolean(ParamId::BuildBias),
            ParameterSpec::boolean(ParamId::ApplyBias),
            ParameterSpec::float(ParamId::Fps),
            ParameterSpec::text(ParamId::SendCommand),
        ]);
        if self.has_sensor_temp() {
            params.push(ParameterSpec::float(ParamId::SetSensorTemp));
            params.push(ParameterSpec::float(ParamId::SensorTemp).read_only());
        } else {
            params.push(ParameterSpec::float(ParamId::SetSensorTemp).read_only());
        }
        params
    }

    fn read(&self, sdk: &dyn CameraSdk, id: ParamId) -> Result<Outcome<ParamValue>, ControlError> {
        let value = match id {
            ParamId::CameraStatus => camera_status(sdk)?,
            ParamId::Shutdown | ParamId::SetMaxExposure | ParamId::SetMaxFps | ParamId::BuildBias => {
                ParamValue::Bool(false)
            }
            ParamId::MaximumExposureMs => ParamValue::Float(sdk.get_f64(Feature::TintMax)? * 1000.0),
            ParamId::MaximumFps => ParamValue::Float(sdk.get_f64(Feature::FpsMax)?),
            ParamId::ApplyBias => ParamValue::Bool(sdk.get_bool(Feature::BiasEnabled)?),
            ParamId::Fps => ParamValue::Float(sdk.get_f64(Feature::Fps)?),
            ParamId::SendCommand => ParamValue::Text(self.response().clone()),
            ParamId::SetSensorTemp if self.has_sensor_temp() => {
                ParamValue::Float(sdk.get_f64(Feature::SensorTempSetpoint)?)
            }
            ParamId::SetSensorTemp => ParamValue::Float(0.0),
            ParamId::SensorTemp if self.has_sensor_temp() => {
                ParamValue::Float(sdk.get_f64(Feature::SensorTemp)?)
            }
            _ => return Ok(Outcome::Unsupported),
        };
        Ok(Outcome::Applied(value))
    }

    fn write(
        &self,
        sdk: &dyn CameraSdk,
        id: ParamId,
        value: &ParamValue,
    ) -> Result<Outcome<()>, ControlError> {
        match id {
            ParamId::Shutdown => {
                if expect_bool(id, value)? {
                    sdk.execute(SdkCommand::ShutDown)?;
                    tracing::info!(variant = ?self.variant, "camera shutdown requested");
                }
            }
            ParamId::SetMaxExposure => {
                if expect_bool(id, value)? {
                    let max = sdk.get_f64(Feature::TintMax)?;
                    sdk.set(Feature::Tint, FeatureValue::Float(max))?;
                }
            }
            ParamId::SetMaxFps => {
                if expect_bool(id, value)? {
                    let max = sdk.get_f64(Feature::FpsMax)?;
                    sdk.set(Feature::Fps, FeatureValue::Float(max))?;
                }
            }
            ParamId::BuildBias => {
                if expect_bool(id, value)? {
                    sdk.execute(SdkCommand::BuildBias)?;
                }
            }
            ParamId::ApplyBias => {
                let on = expect_bool(id, value)?;
                sdk.set(Feature::BiasEnabled, FeatureValue::Bool(on))?;
            }
            ParamId::Fps => {
                let fps = expect_f64(id, value)?;
                sdk.set(Feature::Fps, FeatureValue::Float(fps))?;
            }
            ParamId::SendCommand => {
                let command = expect_text(id, value)?;
                let response = sdk.send_command(command)?;
                tracing::debug!(command, response = %response, "serial command");
                *self.response() = response;
            }
            ParamId::SetSensorTemp if self.has_sensor_temp() => {
                let setpoint = expect_f64(id, value)?;
                sdk.set(Feature::SensorTempSetpoint, FeatureValue::Float(setpoint))?;
            }
            ParamId::CameraStatus
            | ParamId::MaximumExposureMs
            | ParamId::MaximumFps
            | ParamId::SetSensorTemp
            | ParamId::SensorTemp => return Err(read_only(id)),
            _ => return Ok(Outcome::Unsupported),
        }
        Ok(Outcome::Applied(()))
    }

    fn exposure_ms(&self, sdk: &dyn CameraSdk) -> Result<f64, ControlError> {
        Ok(sdk.get_f64(Feature::Tint)? * 1000.0)
    }

    fn set_exposure_ms(&self, sdk: &dyn CameraSdk, ms: f64) -> Result<(), ControlError> {
        if !ms.is_finite() || ms < 0.0 {
            return Err(ControlError::invalid("Exposure", ms));
        }
        sdk.set(Feature::Tint, FeatureValue::Float(ms / 1000.0))?;
        Ok(())
    }

    fn sensor_bounds(&self, sdk: &dyn CameraSdk) -> Result<SensorBounds, ControlError> {
        live_sensor_bounds(sdk)
    }

    fn descriptor(&self, sdk: &dyn CameraSdk) -> Result<FrameBufferDescriptor, ControlError> {
        let (w, h) = sdk.current_image_dimension()?;
        let pixels = profile(self.variant).pixels;
        Ok(FrameBufferDescriptor {
            width: u32::from(w),
            height: u32::from(h),
            bytes_per_pixel: pixels.bytes_per_pixel,
            bit_depth: pixels.bit_depth,
            byte_order: ByteOrder::LittleEndian,
        })
    }

    fn apply_roi(&self, sdk: &dyn CameraSdk, roi: RegionOfInterest) -> Result<(), ControlError> {
        if roi.is_empty() {
            return Err(ControlError::invalid("ROI", roi));
        }
        let bound = |v: u32| u16::try_from(v).map_err(|_| ControlError::invalid("ROI", roi));
        let window = Cropping {
            col1: bound(roi.x)?,
            col2: bound(roi.right() - 1)?,
            row1: bound(roi.y)?,
            row2: bound(roi.bottom() - 1)?,
        };
        sdk.set_cropping(true, window)?;
        Ok(())
    }

    fn read_roi(&self, sdk: &dyn CameraSdk) -> Result<RegionOfInterest, ControlError> {
        let (enabled, c) = sdk.cropping()?;
        if !enabled {
            return Ok(self.sensor_bounds(sdk)?.full_frame());
        }
        Ok(RegionOfInterest::new(
            u32::from(c.col1),
            u32::from(c.row1),
            (u32::from(c.col2) + 1).saturating_sub(u32::from(c.col1)),
            (u32::from(c.row2) + 1).saturating_sub(u32::from(c.row1)),
        ))
    }

    fn clear_roi(&self, sdk: &dyn CameraSdk) -> Result<RegionOfInterest, ControlError> {
        sdk.set_cropping(false, Cropping::default())?;
        Ok(self.sensor_bounds(sdk)?.full_frame())
    }

    fn refresh_status(&self, sdk: &dyn CameraSdk) -> Vec<(ParamId, ParamValue)> {
        if self.has_sensor_temp() {
            collect_status(
                self,
                sdk,
                &[ParamId::SensorTemp, ParamId::SetSensorTemp, ParamId::CameraStatus],
            )
        } else {
            collect_status(self, sdk, &[ParamId::CameraStatus])
        }
    }
}

// ---------------------------------------------------------------------------
// C-BLUE One
// ---------------------------------------------------------------------------

/// Closed mapping between display labels and a hardware enum register.
struct EnumTable {
    param: ParamId,
    feature: Feature,
    entries: &'static [(&'static str, u32)],
}

impl EnumTable {
    fn labels(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(label, _)| *label).collect()
    }

    fn spec(&self) -> ParameterSpec {
        ParameterSpec::enumerated(self.param, &self.labels())
    }

    fn read(&self, sdk: &dyn CameraSdk) -> Result<ParamValue, ControlError> {
        let raw = sdk.get_enum(self.feature)?;
        self.entries
            .iter()
            .find(|(_, code)| *code == raw)
            .map(|(label, _)| ParamValue::Text((*label).to_string()))
            .ok_or(ControlError::UnexpectedHardwareValue {
                name: self.param.name(),
                raw,
            })
    }

    fn write(&self, sdk: &dyn CameraSdk, value: &ParamValue) -> Result<(), ControlError> {
        let label = expect_text(self.param, value)?;
        let code = self
            .entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, code)| *code)
            .ok_or_else(|| ControlError::invalid(self.param.name(), label))?;
        sdk.set(self.feature, FeatureValue::Enum(code))?;
        Ok(())
    }
}

static TEMPERATURE_SELECTOR: EnumTable = EnumTable {
    param: ParamId::TemperatureSelector,
    feature: Feature::TemperatureSelector,
    entries: &[
        ("Sensor", TemperatureSelector::Sensor as u32),
        ("CPU", TemperatureSelector::Cpu as u32),
        ("Power", TemperatureSelector::Power as u32),
        ("Frontend", TemperatureSelector::Frontend as u32),
        ("Heatsink", TemperatureSelector::Heatsink as u32),
        ("Case", TemperatureSelector::Case as u32),
    ],
};

static CONVERSION_EFFICIENCY: EnumTable = EnumTable {
    param: ParamId::ConversionEfficiency,
    feature: Feature::ConversionEfficiency,
    entries: &[
        ("Low", ConversionEfficiency::Low as u32),
        ("High", ConversionEfficiency::High as u32),
    ],
};

static PIXEL_FORMAT: EnumTable = EnumTable {
    param: ParamId::PixelFormat,
    feature: Feature::PixelFormat,
    entries: &[
        ("Mono8", PixelFormat::Mono8 as u32),
        ("Mono12", PixelFormat::Mono12 as u32),
    ],
};

static FAN_MODE: EnumTable = EnumTable {
    param: ParamId::FanMode,
    feature: Feature::FanMode,
    entries: &[
        ("Auto", FanMode::Automatic as u32),
        ("Manual", FanMode::Manual as u32),
    ],
};

/// C-BLUE One. Exposure is the SFNC `ExposureTime` register in microseconds;
/// the ROI is programmed through the offset and size registers.
pub struct CblueModel;

impl CblueModel {
    fn analog_ceiling() -> f64 {
        profile(Variant::CblueOne)
            .gain
            .map(|g| g.analog_ceiling)
            .unwrap_or(DEFAULT_ANALOG_CEILING)
    }

    fn write_gain(sdk: &dyn CameraSdk, total: f64) -> Result<(), ControlError> {
        if total < 0.0 {
            return Err(ControlError::invalid(ParamId::Gain.name(), total));
        }
        let (analog, digital) = split_gain(total, Self::analog_ceiling());
        sdk.set(Feature::Gain(GainSelector::AnalogAll), FeatureValue::Float(analog))?;
        sdk.set(Feature::Gain(GainSelector::DigitalAll), FeatureValue::Float(digital))?;
        tracing::debug!(total, analog, digital, "gain split");
        Ok(())
    }

    fn read_gain(sdk: &dyn CameraSdk) -> Result<f64, ControlError> {
        let analog = sdk.get_f64(Feature::Gain(GainSelector::AnalogAll))?;
        let digital = sdk.get_f64(Feature::Gain(GainSelector::DigitalAll))?;
        Ok(analog + digital)
    }

    fn table(id: ParamId) -> Option<&'static EnumTable> {
        match id {
            ParamId::TemperatureSelector => Some(&TEMPERATURE_SELECTOR),
            ParamId::ConversionEfficiency => Some(&CONVERSION_EFFICIENCY),
            ParamId::PixelFormat => Some(&PIXEL_FORMAT),
            ParamId::FanMode => Some(&FAN_MODE),
            _ => None,
        }
    }
}

impl CameraModel for CblueModel {
    fn variant(&self) -> Variant {
        Variant::CblueOne
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        let mut params = common_parameters();
        params.extend([
            TEMPERATURE_SELECTOR.spec(),
            ParameterSpec::float(ParamId::CoolingSetpoint),
            ParameterSpec::float(ParamId::FrameRate),
            ParameterSpec::float(ParamId::FrameRateMin).read_only(),
            ParameterSpec::float(ParamId::FrameRateMax).read_only(),
            ParameterSpec::float(ParamId::ExposureTime),
            ParameterSpec::float(ParamId::ExposureTimeMin).read_only(),
            ParameterSpec::float(ParamId::ExposureTimeMax).read_only(),
            ParameterSpec::float(ParamId::Gain),
            CONVERSION_EFFICIENCY.spec(),
            PIXEL_FORMAT.spec(),
            ParameterSpec::boolean(ParamId::ReverseX),
            ParameterSpec::boolean(ParamId::ReverseY),
            FAN_MODE.spec(),
            ParameterSpec::text(ParamId::DeviceStatus).read_only(),
        ]);
        params
    }

    fn read(&self, sdk: &dyn CameraSdk, id: ParamId) -> Result<Outcome<ParamValue>, ControlError> {
        if let Some(table) = Self::table(id) {
            return Ok(Outcome::Applied(table.read(sdk)?));
        }
        let value = match id {
            ParamId::CameraStatus => camera_status(sdk)?,
            ParamId::Shutdown => ParamValue::Bool(false),
            ParamId::CoolingSetpoint => ParamValue::Float(sdk.get_f64(Feature::CoolingSetpoint)?),
            ParamId::FrameRate => ParamValue::Float(sdk.get_f64(Feature::AcquisitionFrameRate)?),
            ParamId::FrameRateMin => {
                ParamValue::Float(sdk.get_f64(Feature::AcquisitionFrameRateMin)?)
            }
            ParamId::FrameRateMax => {
                ParamValue::Float(sdk.get_f64(Feature::AcquisitionFrameRateMax)?)
            }
            ParamId::ExposureTime => ParamValue::Float(self.exposure_ms(sdk)?),
            ParamId::ExposureTimeMin => {
                ParamValue::Float(sdk.get_f64(Feature::ExposureTimeMin)? / 1000.0)
            }
            ParamId::ExposureTimeMax => {
                ParamValue::Float(sdk.get_f64(Feature::ExposureTimeMax)? / 1000.0)
            }
            ParamId::Gain => ParamValue::Float(Self::read_gain(sdk)?),
            ParamId::ReverseX => ParamValue::Bool(sdk.get_bool(Feature::ReverseX)?),
            ParamId::ReverseY => ParamValue::Bool(sdk.get_bool(Feature::ReverseY)?),
            ParamId::DeviceStatus => ParamValue::Text(sdk.get_text(Feature::DeviceStatus)?),
            _ => return Ok(Outcome::Unsupported),
        };
        Ok(Outcome::Applied(value))
    }

    fn write(
        &self,
        sdk: &dyn CameraSdk,
        id: ParamId,
        value: &ParamValue,
    ) -> Result<Outcome<()>, ControlError> {
        if let Some(table) = Self::table(id) {
            table.write(sdk, value)?;
            return Ok(Outcome::Applied(()));
        }
        match id {
            ParamId::Shutdown => {
                if expect_bool(id, value)? {
                    sdk.execute(SdkCommand::ShutDown)?;
                    tracing::info!(variant = ?Variant::CblueOne, "camera shutdown requested");
                }
            }
            ParamId::CoolingSetpoint => {
                let v = expect_f64(id, value)?;
                sdk.set(Feature::CoolingSetpoint, FeatureValue::Float(v))?;
            }
            ParamId::FrameRate => {
                let v = expect_f64(id, value)?;
                sdk.set(Feature::AcquisitionFrameRate, FeatureValue::Float(v))?;
            }
            ParamId::ExposureTime => self.set_exposure_ms(sdk, expect_f64(id, value)?)?,
            ParamId::Gain => Self::write_gain(sdk, expect_f64(id, value)?)?,
            ParamId::ReverseX => {
                let on = expect_bool(id, value)?;
                sdk.set(Feature::ReverseX, FeatureValue::Bool(on))?;
            }
            ParamId::ReverseY => {
                let on = expect_bool(id, value)?;
                sdk.set(Feature::ReverseY, FeatureValue::Bool(on))?;
            }
            ParamId::CameraStatus
            | ParamId::FrameRateMin
            | ParamId::FrameRateMax
            | ParamId::ExposureTimeMin
            | ParamId::ExposureTimeMax
            | ParamId::DeviceStatus => return Err(read_only(id)),
            _ => return Ok(Outcome::Unsupported),
        }
        Ok(Outcome::Applied(()))
    }

    fn exposure_ms(&self, sdk: &dyn CameraSdk) -> Result<f64, ControlError> {
        Ok(sdk.get_f64(Feature::ExposureTime)? / 1000.0)
    }

    fn set_exposure_ms(&self, sdk: &dyn CameraSdk, ms: f64) -> Result<(), ControlError> {
        if !ms.is_finite() || ms < 0.0 {
            return Err(ControlError::invalid("Exposure", ms));
        }
        sdk.set(Feature::ExposureTime, FeatureValue::Float(ms * 1000.0))?;
        Ok(())
    }

    fn sensor_bounds(&self, sdk: &dyn CameraSdk) -> Result<SensorBounds, ControlError> {
        live_sensor_bounds(sdk)
    }

    fn descriptor(&self, sdk: &dyn CameraSdk) -> Result<FrameBufferDescriptor, ControlError> {
        let width = u32::try_from(sdk.get_i64(Feature::Width)?).unwrap_or(0);
        let height = u32::try_from(sdk.get_i64(Feature::Height)?).unwrap_or(0);
        let pixels = profile(Variant::CblueOne).pixels;
        let (bytes_per_pixel, bit_depth) = match PixelFormat::from_raw(sdk.get_enum(Feature::PixelFormat)?) {
            Some(format) => (format.bytes_per_pixel(), format.bit_depth()),
            None => (pixels.bytes_per_pixel, pixels.bit_depth),
        };
        Ok(FrameBufferDescriptor {
            width,
            height,
            bytes_per_pixel,
            bit_depth,
            byte_order: ByteOrder::LittleEndian,
        })
    }

    fn apply_roi(&self, sdk: &dyn CameraSdk, roi: RegionOfInterest) -> Result<(), ControlError> {
        if roi.is_empty() {
            return Err(ControlError::invalid("ROI", roi));
        }
        // Offsets go to zero first so the new size never overhangs the sensor.
        let writes = [
            (Feature::OffsetX, 0),
            (Feature::OffsetY, 0),
            (Feature::Width, roi.width),
            (Feature::Height, roi.height),
            (Feature::OffsetX, roi.x),
            (Feature::OffsetY, roi.y),
        ];
        for (feature, v) in writes {
            sdk.set(feature, FeatureValue::Int(i64::from(v)))?;
        }
        Ok(())
    }

    fn read_roi(&self, sdk: &dyn CameraSdk) -> Result<RegionOfInterest, ControlError> {
        let reg = |f: Feature| -> Result<u32, ControlError> {
            Ok(u32::try_from(sdk.get_i64(f)?).unwrap_or(0))
        };
        Ok(RegionOfInterest::new(
            reg(Feature::OffsetX)?,
            reg(Feature::OffsetY)?,
            reg(Feature::Width)?,
            reg(Feature::Height)?,
        ))
    }

    fn clear_roi(&self, sdk: &dyn CameraSdk) -> Result<RegionOfInterest, ControlError> {
        let full = self.sensor_bounds(sdk)?.full_frame();
        sdk.set(Feature::OffsetX, FeatureValue::Int(0))?;
        sdk.set(Feature::OffsetY, FeatureValue::Int(0))?;
        sdk.set(Feature::Width, FeatureValue::Int(i64::from(full.width)))?;
        sdk.set(Feature::Height, FeatureValue::Int(i64::from(full.height)))?;
        Ok(full)
    }

    fn refresh_status(&self, sdk: &dyn CameraSdk) -> Vec<(ParamId, ParamValue)> {
        collect_status(self, sdk, &[ParamId::DeviceStatus])
    }
}

// ---------------------------------------------------------------------------
// No camera
// ---------------------------------------------------------------------------

/// Placeholder while no camera is selected. Every handler is a no-op.
pub struct UnknownModel;

impl CameraModel for UnknownModel {
    fn variant(&self) -> Variant {
        Variant::Unknown
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    fn read(&self, _sdk: &dyn CameraSdk, _id: ParamId) -> Result<Outcome<ParamValue>, ControlError> {
        Ok(Outcome::Unsupported)
    }

    fn write(
        &self,
        _sdk: &dyn CameraSdk,
        _id: ParamId,
        _value: &ParamValue,
    ) -> Result<Outcome<()>, ControlError> {
        Ok(Outcome::Unsupported)
    }

    fn exposure_ms(&self, _sdk: &dyn CameraSdk) -> Result<f64, ControlError> {
        Ok(0.0)
    }

    fn set_exposure_ms(&self, _sdk: &dyn CameraSdk, _ms: f64) -> Result<(), ControlError> {
        Ok(())
    }

    fn sensor_bounds(&self, _sdk: &dyn CameraSdk) -> Result<SensorBounds, ControlError> {
        Ok(SensorBounds::default())
    }

    fn descriptor(&self, _sdk: &dyn CameraSdk) -> Result<FrameBufferDescriptor, ControlError> {
        Ok(FrameBufferDescriptor::EMPTY)
    }

    fn apply_roi(&self, _sdk: &dyn CameraSdk, _roi: RegionOfInterest) -> Result<(), ControlError> {
        Ok(())
    }

    fn read_roi(&self, _sdk: &dyn CameraSdk) -> Result<RegionOfInterest, ControlError> {
        Ok(RegionOfInterest::default())
    }

    fn clear_roi(&self, _sdk: &dyn CameraSdk) -> Result<RegionOfInterest, ControlError> {
        Ok(RegionOfInterest::default())
    }

    fn refresh_status(&self, _sdk: &dyn CameraSdk) -> Vec<(ParamId, ParamValue)> {
        Vec::new()
    }
}
