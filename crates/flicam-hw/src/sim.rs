//! Simulated camera SDK.
//!
//! Stands in for the vendor library: grabber and camera discovery, per-camera
//! feature registers, C-RED cropping, streaming with an optional delivery
//! thread, and a call log so callers can assert on sequencing.

use crate::sdk::{
    CameraSdk, Cropping, Feature, FeatureValue, FrameCallback, GainSelector, ModelCode,
    PixelFormat, SdkCommand, SdkError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Analog gain the simulated C-BLUE sensor accepts at most.
const SIM_ANALOG_GAIN_MAX: f64 = 24.0;

/// One recorded SDK call.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Init,
    Exit,
    DetectGrabbers,
    DetectCameras,
    SetCamera(String),
    SetBufferSize(usize),
    Update,
    Start,
    Stop,
    SetCallback(bool),
    SetCropping(bool, Cropping),
    Set(Feature, FeatureValue),
    SendCommand(String),
    Execute(SdkCommand),
}

struct SimCamera {
    name: String,
    model: ModelCode,
    sensor: (u16, u16),
    features: HashMap<Feature, FeatureValue>,
    cropping: (bool, Cropping),
}

impl SimCamera {
    fn new(name: &str, model: ModelCode) -> Self {
        let sensor = match model {
            ModelCode::CRed2 | ModelCode::CRed3 => (640, 512),
            ModelCode::CBlue1 => (1608, 1104),
            ModelCode::Undefined => (0, 0),
        };
        Self {
            name: name.to_string(),
            model,
            sensor,
            features: default_features(model, sensor),
            cropping: (false, Cropping::default()),
        }
    }

    fn frame_geometry(&self) -> (u32, u32, u32) {
        match self.model {
            ModelCode::CBlue1 => {
                let w = int_feature(&self.features, Feature::Width);
                let h = int_feature(&self.features, Feature::Height);
                let bpp = match self.features.get(&Feature::PixelFormat) {
                    Some(FeatureValue::Enum(raw)) => PixelFormat::from_raw(*raw)
                        .map(PixelFormat::bytes_per_pixel)
                        .unwrap_or(2),
                    _ => 2,
                };
                (w as u32, h as u32, bpp)
            }
            _ => {
                let (enabled, c) = self.cropping;
                if enabled {
                    (
                        u32::from(c.col2 - c.col1) + 1,
                        u32::from(c.row2 - c.row1) + 1,
                        2,
                    )
                } else {
                    (u32::from(self.sensor.0), u32::from(self.sensor.1), 2)
                }
            }
        }
    }
}

fn int_feature(features: &HashMap<Feature, FeatureValue>, feature: Feature) -> i64 {
    match features.get(&feature) {
        Some(FeatureValue::Int(v)) => *v,
        _ => 0,
    }
}

fn default_features(model: ModelCode, sensor: (u16, u16)) -> HashMap<Feature, FeatureValue> {
    use FeatureValue::*;
    let mut f = HashMap::new();
    match model {
        ModelCode::CRed2 | ModelCode::CRed3 => {
            f.insert(Feature::Fps, Float(100.0));
            f.insert(Feature::FpsMax, Float(600.0));
            f.insert(Feature::Tint, Float(0.001));
            f.insert(Feature::TintMin, Float(0.000_001));
            f.insert(Feature::TintMax, Float(0.0016));
            f.insert(Feature::BiasEnabled, Bool(false));
            f.insert(Feature::WidthMax, Int(i64::from(sensor.0)));
            f.insert(Feature::HeightMax, Int(i64::from(sensor.1)));
            if model == ModelCode::CRed2 {
                f.insert(Feature::SensorTemp, Float(-40.0));
                f.insert(Feature::SensorTempSetpoint, Float(-40.0));
            }
        }
        ModelCode::CBlue1 => {
            f.insert(Feature::TemperatureSelector, Enum(0));
            f.insert(Feature::CoolingSetpoint, Float(20.0));
            f.insert(Feature::AcquisitionFrameRate, Float(60.0));
            f.insert(Feature::AcquisitionFrameRateMin, Float(1.0));
            f.insert(Feature::AcquisitionFrameRateMax, Float(240.0));
            f.insert(Feature::ExposureTime, Float(10_000.0));
            f.insert(Feature::ExposureTimeMin, Float(10.0));
            f.insert(Feature::ExposureTimeMax, Float(1_000_000.0));
            f.insert(Feature::Gain(GainSelector::AnalogAll), Float(0.0));
            f.insert(Feature::Gain(GainSelector::DigitalAll), Float(0.0));
            f.insert(Feature::ConversionEfficiency, Enum(0));
            f.insert(Feature::PixelFormat, Enum(PixelFormat::Mono12 as u32));
            f.insert(Feature::ReverseX, Bool(false));
            f.insert(Feature::ReverseY, Bool(false));
            f.insert(Feature::FanMode, Enum(0));
            f.insert(Feature::DeviceStatus, Text("Ready".to_string()));
            f.insert(Feature::OffsetX, Int(0));
            f.insert(Feature::OffsetY, Int(0));
            f.insert(Feature::Width, Int(i64::from(sensor.0)));
            f.insert(Feature::Height, Int(i64::from(sensor.1)));
            f.insert(Feature::WidthMax, Int(i64::from(sensor.0)));
            f.insert(Feature::HeightMax, Int(i64::from(sensor.1)));
        }
        ModelCode::Undefined => {}
    }
    f
}

fn is_read_only(feature: Feature) -> bool {
    matches!(
        feature,
        Feature::FpsMax
            | Feature::TintMin
            | Feature::TintMax
            | Feature::SensorTemp
            | Feature::AcquisitionFrameRateMin
            | Feature::AcquisitionFrameRateMax
            | Feature::ExposureTimeMin
            | Feature::ExposureTimeMax
            | Feature::DeviceStatus
            | Feature::WidthMax
            | Feature::HeightMax
    )
}

fn same_kind(a: &FeatureValue, b: &FeatureValue) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

#[derive(Default)]
struct SimState {
    initialized: bool,
    grabbers: usize,
    cameras: Vec<SimCamera>,
    detected: Vec<String>,
    selected: Option<usize>,
    model: Option<ModelCode>,
    streaming: bool,
    callback: Option<FrameCallback>,
    sequence: u64,
    last_frame: Option<Vec<u8>>,
    calls: Vec<SimCall>,
    fail_next_start: bool,
}

impl SimState {
    fn camera(&self) -> Result<&SimCamera, SdkError> {
        if !self.initialized {
            return Err(SdkError::NotInitialized);
        }
        self.selected
            .and_then(|i| self.cameras.get(i))
            .ok_or(SdkError::NoCameraSelected)
    }

    fn camera_mut(&mut self) -> Result<&mut SimCamera, SdkError> {
        if !self.initialized {
            return Err(SdkError::NotInitialized);
        }
        match self.selected {
            Some(i) if i < self.cameras.len() => Ok(&mut self.cameras[i]),
            _ => Err(SdkError::NoCameraSelected),
        }
    }

    fn synth_frame(&mut self) -> Option<Vec<u8>> {
        let (w, h, bpp) = self.camera().ok()?.frame_geometry();
        self.sequence += 1;
        let fill = (self.sequence % 256) as u8;
        Some(vec![fill; w as usize * h as usize * bpp as usize])
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Push one frame through the registered callback, outside the state lock.
fn deliver(state: &Mutex<SimState>) -> bool {
    let (callback, frame) = {
        let mut st = lock(state);
        if !st.streaming {
            return false;
        }
        let Some(callback) = st.callback.clone() else {
            return false;
        };
        let Some(frame) = st.synth_frame() else {
            return false;
        };
        st.last_frame = Some(frame.clone());
        (callback, frame)
    };
    callback(&frame);
    true
}

/// In-process stand-in for the vendor SDK.
pub struct SimulatedSdk {
    state: Arc<Mutex<SimState>>,
    frame_interval: Option<Duration>,
    delivery: Mutex<Option<JoinHandle<()>>>,
}

impl Default for SimulatedSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSdk {
    /// An SDK with one grabber and no cameras attached.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                grabbers: 1,
                ..SimState::default()
            })),
            frame_interval: None,
            delivery: Mutex::new(None),
        }
    }

    pub fn with_camera(self, name: &str, model: ModelCode) -> Self {
        self.plug(name, model);
        self
    }

    /// Deliver frames automatically every `interval` while streaming.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Attach a camera; visible after the next `detect_cameras()`.
    pub fn plug(&self, name: &str, model: ModelCode) {
        lock(&self.state).cameras.push(SimCamera::new(name, model));
    }

    /// Detach every camera. The current selection becomes stale.
    pub fn unplug_all(&self) {
        let mut st = lock(&self.state);
        st.cameras.clear();
        st.selected = None;
    }

    /// Make the next `start()` fail once.
    pub fn fail_next_start(&self) {
        lock(&self.state).fail_next_start = true;
    }

    pub fn set_grabbers(&self, count: usize) {
        lock(&self.state).grabbers = count;
    }

    pub fn calls(&self) -> Vec<SimCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn is_streaming(&self) -> bool {
        lock(&self.state).streaming
    }

    pub fn has_callback(&self) -> bool {
        lock(&self.state).callback.is_some()
    }

    /// Read a register of the selected camera without recording a call.
    pub fn peek(&self, feature: Feature) -> Option<FeatureValue> {
        let st = lock(&self.state);
        st.camera().ok()?.features.get(&feature).cloned()
    }

    /// Deliver one frame synchronously on the calling thread.
    ///
    /// Returns false when not streaming or no callback is registered.
    pub fn deliver_frame(&self) -> bool {
        deliver(&self.state)
    }

    fn record(&self, call: SimCall) {
        lock(&self.state).calls.push(call);
    }
}

impl CameraSdk for SimulatedSdk {
    fn init(&self) -> Result<(), SdkError> {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::Init);
        st.initialized = true;
        Ok(())
    }

    fn exit(&self) {
        let _ = self.stop();
        let mut st = lock(&self.state);
        st.calls.push(SimCall::Exit);
        st.initialized = false;
        st.selected = None;
        st.model = None;
        st.callback = None;
    }

    fn detect_grabbers(&self) -> Result<usize, SdkError> {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::DetectGrabbers);
        if !st.initialized {
            return Err(SdkError::NotInitialized);
        }
        Ok(st.grabbers)
    }

    fn detect_cameras(&self) -> Result<Vec<String>, SdkError> {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::DetectCameras);
        if !st.initialized {
            return Err(SdkError::NotInitialized);
        }
        let names: Vec<String> = if st.grabbers == 0 {
            Vec::new()
        } else {
            st.cameras.iter().map(|c| c.name.clone()).collect()
        };
        st.detected = names.clone();
        Ok(names)
    }

    fn set_camera(&self, name: &str) -> Result<(), SdkError> {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::SetCamera(name.to_string()));
        if !st.initialized {
            return Err(SdkError::NotInitialized);
        }
        if !st.detected.iter().any(|d| d == name) {
            return Err(SdkError::UnknownCamera(name.to_string()));
        }
        let idx = st
            .cameras
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| SdkError::UnknownCamera(name.to_string()))?;
        st.selected = Some(idx);
        st.model = None;
        Ok(())
    }

    fn set_buffer_size(&self, frames: usize) -> Result<(), SdkError> {
        self.record(SimCall::SetBufferSize(frames));
        Ok(())
    }

    fn update(&self) -> Result<(), SdkError> {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::Update);
        let model = st.camera()?.model;
        st.model = Some(model);
        Ok(())
    }

    fn camera_model(&self) -> ModelCode {
        lock(&self.state).model.unwrap_or(ModelCode::Undefined)
    }

    fn start(&self) -> Result<(), SdkError> {
        {
            let mut st = lock(&self.state);
            st.calls.push(SimCall::Start);
            st.camera()?;
            if std::mem::take(&mut st.fail_next_start) {
                return Err(SdkError::CallFailed {
                    call: "start",
                    reason: "streaming did not start".into(),
                });
            }
            if st.streaming {
                return Ok(());
            }
            st.streaming = true;
        }
        if let Some(interval) = self.frame_interval {
            let state = Arc::clone(&self.state);
            let handle = std::thread::Builder::new()
                .name("flicam-sim-delivery".into())
                .spawn(move || loop {
                    std::thread::sleep(interval);
                    if !lock(&state).streaming {
                        break;
                    }
                    deliver(&state);
                })
                .map_err(|e| SdkError::CallFailed {
                    call: "start",
                    reason: e.to_string(),
                })?;
            *self.delivery.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), SdkError> {
        {
            let mut st = lock(&self.state);
            st.calls.push(SimCall::Stop);
            st.streaming = false;
        }
        let handle = self
            .delivery
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        Ok(())
    }

    fn set_frame_callback(&self, callback: Option<FrameCallback>) {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::SetCallback(callback.is_some()));
        st.callback = callback;
    }

    fn current_image_dimension(&self) -> Result<(u16, u16), SdkError> {
        let st = lock(&self.state);
        let (w, h, _) = st.camera()?.frame_geometry();
        Ok((w as u16, h as u16))
    }

    fn raw_image(&self, index: i64) -> Option<Vec<u8>> {
        let mut st = lock(&self.state);
        if index != -1 {
            return None;
        }
        match st.last_frame.clone() {
            Some(frame) => Some(frame),
            None => st.synth_frame(),
        }
    }

    fn cropping(&self) -> Result<(bool, Cropping), SdkError> {
        let st = lock(&self.state);
        let cam = st.camera()?;
        if cam.model == ModelCode::CBlue1 {
            return Err(SdkError::CallFailed {
                call: "getCroppingState",
                reason: "not supported by C-BLUE".into(),
            });
        }
        Ok(cam.cropping)
    }

    fn set_cropping(&self, enabled: bool, cropping: Cropping) -> Result<(), SdkError> {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::SetCropping(enabled, cropping));
        let cam = st.camera_mut()?;
        if cam.model == ModelCode::CBlue1 {
            return Err(SdkError::CallFailed {
                call: "setCroppingState",
                reason: "not supported by C-BLUE".into(),
            });
        }
        if enabled
            && (cropping.col1 > cropping.col2
                || cropping.row1 > cropping.row2
                || cropping.col2 >= cam.sensor.0
                || cropping.row2 >= cam.sensor.1)
        {
            return Err(SdkError::CallFailed {
                call: "setCroppingState",
                reason: format!("window {cropping:?} outside sensor {:?}", cam.sensor),
            });
        }
        cam.cropping = (enabled, cropping);
        Ok(())
    }

    fn get(&self, feature: Feature) -> Result<FeatureValue, SdkError> {
        let st = lock(&self.state);
        st.camera()?
            .features
            .get(&feature)
            .cloned()
            .ok_or(SdkError::FeatureUnavailable { feature })
    }

    fn set(&self, feature: Feature, value: FeatureValue) -> Result<(), SdkError> {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::Set(feature, value.clone()));
        let cam = st.camera_mut()?;
        let current = cam
            .features
            .get(&feature)
            .ok_or(SdkError::FeatureUnavailable { feature })?;
        if is_read_only(feature) {
            return Err(SdkError::CallFailed {
                call: "set",
                reason: format!("{feature:?} is read-only"),
            });
        }
        if !same_kind(current, &value) {
            return Err(SdkError::TypeMismatch {
                feature,
                expected: match current {
                    FeatureValue::Float(_) => "float",
                    FeatureValue::Int(_) => "integer",
                    FeatureValue::Bool(_) => "boolean",
                    FeatureValue::Enum(_) => "enum",
                    FeatureValue::Text(_) => "text",
                },
            });
        }

        let out_of_range = || SdkError::OutOfRange {
            feature,
            value: format!("{value:?}"),
        };
        let f = &cam.features;
        let float_within = |v: f64, lo: Feature, hi: Feature| match (f.get(&lo), f.get(&hi)) {
            (Some(FeatureValue::Float(lo)), Some(FeatureValue::Float(hi))) => v >= *lo && v <= *hi,
            _ => true,
        };
        let int_max = |key: Feature| int_feature(f, key);
        let valid = match (feature, &value) {
            (Feature::Tint, FeatureValue::Float(v)) => float_within(*v, Feature::TintMin, Feature::TintMax),
            (Feature::Fps, FeatureValue::Float(v)) => *v > 0.0 && *v <= int_or_float(f, Feature::FpsMax),
            (Feature::ExposureTime, FeatureValue::Float(v)) => {
                float_within(*v, Feature::ExposureTimeMin, Feature::ExposureTimeMax)
            }
            (Feature::AcquisitionFrameRate, FeatureValue::Float(v)) => float_within(
                *v,
                Feature::AcquisitionFrameRateMin,
                Feature::AcquisitionFrameRateMax,
            ),
            (Feature::Gain(GainSelector::AnalogAll), FeatureValue::Float(v)) => {
                (0.0..=SIM_ANALOG_GAIN_MAX).contains(v)
            }
            (Feature::Gain(GainSelector::DigitalAll), FeatureValue::Float(v)) => *v >= 0.0,
            (Feature::Width, FeatureValue::Int(v)) => *v >= 1 && *v <= int_max(Feature::WidthMax),
            (Feature::Height, FeatureValue::Int(v)) => *v >= 1 && *v <= int_max(Feature::HeightMax),
            (Feature::OffsetX, FeatureValue::Int(v)) => *v >= 0 && *v < int_max(Feature::WidthMax),
            (Feature::OffsetY, FeatureValue::Int(v)) => *v >= 0 && *v < int_max(Feature::HeightMax),
            (Feature::PixelFormat, FeatureValue::Enum(v)) => PixelFormat::from_raw(*v).is_some(),
            (Feature::TemperatureSelector, FeatureValue::Enum(v)) => *v <= 5,
            (Feature::ConversionEfficiency | Feature::FanMode, FeatureValue::Enum(v)) => *v <= 1,
            _ => true,
        };
        if !valid {
            return Err(out_of_range());
        }
        cam.features.insert(feature, value);
        Ok(())
    }

    fn send_command(&self, command: &str) -> Result<String, SdkError> {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::SendCommand(command.to_string()));
        st.camera()?;
        Ok(format!("{} OK", command.trim_end()))
    }

    fn status_detailed(&self) -> Result<(String, String), SdkError> {
        let st = lock(&self.state);
        let cam = st.camera()?;
        let status = if st.streaming { "operational" } else { "standby" };
        Ok((status.to_string(), format!("{} no error", cam.name)))
    }

    fn execute(&self, command: SdkCommand) -> Result<(), SdkError> {
        let mut st = lock(&self.state);
        st.calls.push(SimCall::Execute(command));
        let cam = st.camera_mut()?;
        if command == SdkCommand::BuildBias && !cam.model_is_cred() {
            return Err(SdkError::CallFailed {
                call: "buildBias",
                reason: "bias maps are C-RED only".into(),
            });
        }
        Ok(())
    }
}

impl SimCamera {
    fn model_is_cred(&self) -> bool {
        matches!(self.model, ModelCode::CRed2 | ModelCode::CRed3)
    }
}

fn int_or_float(features: &HashMap<Feature, FeatureValue>, feature: Feature) -> f64 {
    match features.get(&feature) {
        Some(FeatureValue::Float(v)) => *v,
        Some(FeatureValue::Int(v)) => *v as f64,
        _ => f64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ready(model: ModelCode) -> SimulatedSdk {
        let sdk = SimulatedSdk::new().with_camera("cam0", model);
        sdk.init().unwrap();
        sdk.detect_cameras().unwrap();
        sdk.set_camera("cam0").unwrap();
        sdk.update().unwrap();
        sdk
    }

    #[test]
    fn test_no_grabbers_means_no_cameras() {
        let sdk = SimulatedSdk::new().with_camera("cam0", ModelCode::CRed2);
        sdk.init().unwrap();
        sdk.set_grabbers(0);
        assert!(sdk.detect_cameras().unwrap().is_empty());
    }

    #[test]
    fn test_set_camera_requires_detection() {
        let sdk = SimulatedSdk::new().with_camera("cam0", ModelCode::CRed2);
        sdk.init().unwrap();
        assert!(matches!(sdk.set_camera("cam0"), Err(SdkError::UnknownCamera(_))));
        sdk.detect_cameras().unwrap();
        sdk.set_camera("cam0").unwrap();
        assert_eq!(sdk.camera_model(), ModelCode::Undefined);
        sdk.update().unwrap();
        assert_eq!(sdk.camera_model(), ModelCode::CRed2);
    }

    #[test]
    fn test_cropping_changes_dimensions() {
        let sdk = ready(ModelCode::CRed3);
        assert_eq!(sdk.current_image_dimension().unwrap(), (640, 512));
        let c = Cropping { col1: 32, col2: 95, row1: 4, row2: 11 };
        sdk.set_cropping(true, c).unwrap();
        assert_eq!(sdk.current_image_dimension().unwrap(), (64, 8));
    }

    #[test]
    fn test_analog_gain_ceiling_enforced() {
        let sdk = ready(ModelCode::CBlue1);
        let analog = Feature::Gain(GainSelector::AnalogAll);
        assert!(sdk.set(analog, FeatureValue::Float(24.0)).is_ok());
        assert!(matches!(
            sdk.set(analog, FeatureValue::Float(25.0)),
            Err(SdkError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_read_only_feature_rejected() {
        let sdk = ready(ModelCode::CBlue1);
        assert!(sdk.set(Feature::WidthMax, FeatureValue::Int(10)).is_err());
    }

    #[test]
    fn test_manual_delivery_invokes_callback() {
        let sdk = ready(ModelCode::CBlue1);
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        sdk.set_frame_callback(Some(Arc::new(move |buf: &[u8]| {
            assert_eq!(buf.len(), 1608 * 1104 * 2);
            seen.fetch_add(1, Ordering::SeqCst);
        })));
        assert!(!sdk.deliver_frame(), "not streaming yet");
        sdk.start().unwrap();
        assert!(sdk.deliver_frame());
        sdk.stop().unwrap();
        assert!(!sdk.deliver_frame());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_injected_start_failure_is_one_shot() {
        let sdk = ready(ModelCode::CRed3);
        sdk.fail_next_start();
        assert!(sdk.start().is_err());
        assert!(!sdk.is_streaming());
        sdk.start().unwrap();
        assert!(sdk.is_streaming());
    }

    #[test]
    fn test_delivery_thread_stops_with_streaming() {
        let sdk = SimulatedSdk::new()
            .with_camera("cam0", ModelCode::CRed2)
            .with_frame_interval(Duration::from_millis(2));
        sdk.init().unwrap();
        sdk.detect_cameras().unwrap();
        sdk.set_camera("cam0").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        sdk.set_frame_callback(Some(Arc::new(move |_: &[u8]| {
            seen.fetch_add(1, Ordering::SeqCst);
        })));
        sdk.start().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        sdk.stop().unwrap();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }
}
