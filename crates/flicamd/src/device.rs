//! The camera device facade.
//!
//! [`CameraDevice`] is the one object the host talks to. It composes the SDK
//! session, the variant registry, the active camera model, the control
//! surface and the acquisition engine, and serializes every control
//! operation behind one lock.

use crate::engine::{AcquisitionEngine, AcquisitionState, EngineError, EngineTimings, FrameRouter, StatusPoller};
use crate::host::{FrameSink, PropertyHost};
use flicam_core::{
    model_for, to_hardware_region, CameraModel, ControlError, ControlSurface, Outcome, ParamId,
    ParamValue, ParameterSpec, RegionOfInterest,
};
use flicam_hw::{
    CameraSdk, FrameBufferDescriptor, RegistryError, SdkError, SdkSession, Variant, VariantRegistry,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device not initialized")]
    NotInitialized,
    #[error("device faulted after a failed acquisition stop; shut down and initialize again")]
    Faulted,
    #[error("hardware not found: {0}")]
    HardwareNotFound(String),
    #[error("invalid value {value:?} for {name}")]
    InvalidParameterValue { name: String, value: String },
    #[error("{0} is not supported by the active camera")]
    UnsupportedOnVariant(String),
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("parameter {0} is read-only")]
    ReadOnly(String),
    #[error("acquisition thread: {0}")]
    ThreadLifecycle(String),
    #[error("no image available")]
    NoImage,
    #[error("control: {0}")]
    Control(ControlError),
    #[error("SDK: {0}")]
    Sdk(#[from] SdkError),
}

impl From<ControlError> for DeviceError {
    fn from(e: ControlError) -> Self {
        match e {
            ControlError::InvalidParameterValue { name, value } => {
                Self::InvalidParameterValue { name, value }
            }
            ControlError::UnknownParameter(n) => Self::UnknownParameter(n),
            ControlError::ReadOnly(n) => Self::ReadOnly(n),
            ControlError::UnsupportedOnVariant(n) => Self::UnsupportedOnVariant(n),
            ControlError::Sdk(e) => Self::Sdk(e),
            other => Self::Control(other),
        }
    }
}

impl From<EngineError> for DeviceError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ThreadLifecycle(msg) => Self::ThreadLifecycle(msg),
            EngineError::Sdk(e) => Self::Sdk(e),
        }
    }
}

impl From<RegistryError> for DeviceError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::HardwareNotFound(name) => Self::HardwareNotFound(name),
            RegistryError::Sdk(e) => Self::Sdk(e),
        }
    }
}

/// Static device settings.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub label: String,
    pub sdk_buffer_frames: usize,
    pub poll_interval: Duration,
    pub stop_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Uninitialized,
    Ready,
    Faulted,
}

/// Snapshot reported by the D-Bus `Status` call.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub phase: Phase,
    pub variant: Variant,
    pub model: String,
    pub camera: Option<String>,
    pub cameras: Vec<String>,
    pub acquisition: AcquisitionState,
    pub capturing: bool,
    pub roi: RegionOfInterest,
    pub cropping: bool,
    pub frame: FrameBufferDescriptor,
}

struct Inner {
    phase: Phase,
    session: Option<SdkSession>,
    registry: VariantRegistry,
    engine: AcquisitionEngine,
    surface: ControlSurface,
    roi: RegionOfInterest,
    cropping: bool,
    snap: Vec<u8>,
}

pub struct CameraDevice {
    sdk: Arc<dyn CameraSdk>,
    host: Arc<dyn PropertyHost>,
    router: Arc<FrameRouter>,
    poller: Arc<StatusPoller>,
    settings: DeviceSettings,
    inner: Mutex<Inner>,
}

fn device_parameters(registry: &VariantRegistry) -> Vec<ParameterSpec> {
    let mut params = vec![
        ParameterSpec::boolean(ParamId::DetectCameras),
        ParameterSpec::integer(ParamId::Binning).allow(&[1]),
    ];
    let names: Vec<&str> = registry.cameras().iter().map(|c| c.name()).collect();
    if !names.is_empty() {
        params.push(ParameterSpec::enumerated(ParamId::Cameras, &names));
    }
    params
}

impl CameraDevice {
    pub fn new(
        sdk: Arc<dyn CameraSdk>,
        host: Arc<dyn PropertyHost>,
        sink: Arc<dyn FrameSink>,
        settings: DeviceSettings,
    ) -> Self {
        let unknown = model_for(Variant::Unknown);
        let router = Arc::new(FrameRouter::new(settings.label.clone(), sink));
        let poller = Arc::new(StatusPoller::new(
            Arc::clone(&sdk),
            Arc::clone(&host),
            Arc::clone(&unknown),
        ));
        let engine = AcquisitionEngine::new(
            Arc::clone(&sdk),
            Arc::clone(&router),
            Arc::clone(&poller),
            EngineTimings {
                poll_interval: settings.poll_interval,
                stop_timeout: settings.stop_timeout,
            },
        );
        let registry = VariantRegistry::new(Arc::clone(&sdk), settings.sdk_buffer_frames);
        let inner = Inner {
            phase: Phase::Uninitialized,
            session: None,
            registry,
            engine,
            surface: ControlSurface::build(unknown.as_ref(), Vec::new()),
            roi: RegionOfInterest::default(),
            cropping: false,
            snap: Vec::new(),
        };
        Self {
            sdk,
            host,
            router,
            poller,
            settings,
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ready(inner: &Inner) -> Result<(), DeviceError> {
        match inner.phase {
            Phase::Ready => Ok(()),
            Phase::Uninitialized => Err(DeviceError::NotInitialized),
            Phase::Faulted => Err(DeviceError::Faulted),
        }
    }

    fn model(&self) -> Arc<dyn CameraModel> {
        self.poller.model()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Open the SDK, bind the first camera found and register parameters.
    ///
    /// Idempotent. Finding no camera is not an error: the device comes up
    /// with the no-camera model and only device-level parameters.
    pub fn initialize(&self) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Ready => return Ok(()),
            Phase::Faulted => return Err(DeviceError::Faulted),
            Phase::Uninitialized => {}
        }
        if let Some(mut stale) = inner.session.take() {
            stale.close();
        }
        inner.session = Some(SdkSession::open(Arc::clone(&self.sdk))?);
        if let Err(e) = self.bind_first_camera(&mut inner) {
            tracing::error!(error = %e, "initialize failed; releasing SDK");
            self.release(&mut inner);
            return Err(e);
        }
        self.rebuild_parameters(&mut inner);
        inner.phase = Phase::Ready;
        tracing::info!(
            label = %self.settings.label,
            variant = ?inner.registry.active_variant(),
            "device initialized"
        );
        Ok(())
    }

    /// Stop acquisition, tear down the supervisor and release the SDK.
    ///
    /// Idempotent, and the only way out of the faulted state.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.phase == Phase::Uninitialized && inner.session.is_none() {
            return;
        }
        self.release(&mut inner);
        tracing::info!("device shut down");
    }

    fn release(&self, inner: &mut Inner) {
        self.router.set_capturing(false);
        if let Err(e) = inner.engine.stop() {
            tracing::error!(error = %e, "engine stop failed during shutdown; detaching supervisor");
            if let Err(e) = inner.engine.abandon() {
                tracing::warn!(error = %e, "hardware stop failed during shutdown");
            }
        }
        if let Some(mut session) = inner.session.take() {
            session.close();
        }
        self.poller.set_model(model_for(Variant::Unknown));
        self.router.update_geometry(FrameBufferDescriptor::EMPTY, 0, 0);
        inner.roi = RegionOfInterest::default();
        inner.cropping = false;
        inner.snap.clear();
        inner.phase = Phase::Uninitialized;
    }

    /// Enumerate, select the first camera and start the engine if one was
    /// found. The engine must be idle.
    fn bind_first_camera(&self, inner: &mut Inner) -> Result<(), DeviceError> {
        let handles = inner.registry.enumerate();
        let variant = match handles.first() {
            Some(first) => match inner.registry.select(first) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(camera = %first, error = %e, "could not select camera");
                    Variant::Unknown
                }
            },
            None => Variant::Unknown,
        };
        self.activate(inner, variant)?;
        if variant != Variant::Unknown {
            inner.engine.start()?;
        }
        Ok(())
    }

    /// Swap the active model and resync ROI and frame geometry from hardware.
    fn activate(&self, inner: &mut Inner, variant: Variant) -> Result<(), DeviceError> {
        let model = model_for(variant);
        self.poller.set_model(Arc::clone(&model));
        let sdk = self.sdk.as_ref();
        let (roi, cropping) = if variant == Variant::Unknown {
            (RegionOfInterest::default(), false)
        } else {
            let full = model.sensor_bounds(sdk)?.full_frame();
            let applied = model.read_roi(sdk)?;
            (applied, applied != full)
        };
        inner.roi = roi;
        inner.cropping = cropping;
        self.refresh_geometry(inner);
        tracing::info!(
            camera = inner.registry.active_camera().map(|c| c.name()).unwrap_or("none"),
            variant = ?variant,
            "camera model active"
        );
        Ok(())
    }

    fn refresh_geometry(&self, inner: &Inner) {
        let descriptor = match self.model().descriptor(self.sdk.as_ref()) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "could not read frame geometry");
                FrameBufferDescriptor::EMPTY
            }
        };
        let (x, y) = if inner.cropping {
            (inner.roi.x, inner.roi.y)
        } else {
            (0, 0)
        };
        self.router.update_geometry(descriptor, x, y);
    }

    fn rebuild_parameters(&self, inner: &mut Inner) {
        let model = self.model();
        inner.surface = ControlSurface::build(model.as_ref(), device_parameters(&inner.registry));
        self.host.replace_all(inner.surface.specs());
        let names: Vec<&'static str> = inner.surface.specs().iter().map(|s| s.name).collect();
        for name in names {
            match self.read_property(inner, name) {
                Ok(Outcome::Applied(value)) => self.host.notify(name, &value),
                Ok(Outcome::Unsupported) => {}
                Err(e) => tracing::debug!(param = name, error = %e, "initial read failed"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Redetect and camera selection
    // -----------------------------------------------------------------------

    /// Quiesce acquisition, re-enumerate, bind the first camera, restart and
    /// rebuild the parameter set for the new variant.
    pub fn redetect(&self) -> Result<Variant, DeviceError> {
        let mut inner = self.lock();
        Self::ready(&inner)?;
        self.redetect_locked(&mut inner)
    }

    fn redetect_locked(&self, inner: &mut Inner) -> Result<Variant, DeviceError> {
        let was_capturing = self.router.is_capturing();
        self.router.set_capturing(false);
        if let Err(e) = inner.engine.stop() {
            inner.phase = Phase::Faulted;
            tracing::error!(error = %e, "redetect: engine stop failed; device faulted");
            return Err(e.into());
        }
        tracing::info!("redetecting cameras");

        self.bind_first_camera(inner)?;
        self.rebuild_parameters(inner);

        let variant = inner.registry.active_variant();
        self.router
            .set_capturing(was_capturing && variant != Variant::Unknown);
        tracing::info!(variant = ?variant, cameras = inner.registry.cameras().len(), "redetect complete");
        Ok(variant)
    }

    /// Select an enumerated camera by name and reclassify the variant.
    ///
    /// The registered parameter set is kept as is; parameters the new
    /// variant lacks resolve to `Unsupported` until the next redetect.
    fn select_camera_locked(&self, inner: &mut Inner, name: &str) -> Result<Variant, DeviceError> {
        let was_capturing = self.router.is_capturing();
        self.router.set_capturing(false);
        if let Err(e) = inner.engine.stop() {
            inner.phase = Phase::Faulted;
            return Err(e.into());
        }
        let variant = match inner.registry.select_by_name(name) {
            Ok(variant) => variant,
            Err(e) => {
                tracing::warn!(camera = name, error = %e, "camera selection failed");
                self.resume_previous(inner, was_capturing);
                return Err(e.into());
            }
        };
        self.activate(inner, variant)?;
        if variant != Variant::Unknown {
            inner.engine.start()?;
        }
        self.router
            .set_capturing(was_capturing && variant != Variant::Unknown);
        Ok(variant)
    }

    /// Bring the previously selected camera back after a failed selection.
    /// Falls back to the no-camera model when the SDK lost it too.
    fn resume_previous(&self, inner: &mut Inner, was_capturing: bool) {
        let previous = inner.registry.active_variant();
        let resumed = self.activate(inner, previous).and_then(|()| {
            if previous != Variant::Unknown {
                inner.engine.start()?;
            }
            Ok(())
        });
        match resumed {
            Ok(()) => self
                .router
                .set_capturing(was_capturing && previous != Variant::Unknown),
            Err(e) => {
                tracing::warn!(variant = ?previous, error = %e, "previous camera unavailable");
                let _ = self.activate(inner, Variant::Unknown);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Sequence acquisition
    // -----------------------------------------------------------------------

    /// Let delivered frames through to the sink. Streaming itself follows
    /// camera selection and is not touched here.
    pub fn start_sequence_acquisition(&self) -> Result<(), DeviceError> {
        let inner = self.lock();
        Self::ready(&inner)?;
        self.router.set_capturing(true);
        tracing::info!("sequence acquisition started");
        Ok(())
    }

    pub fn stop_sequence_acquisition(&self) -> Result<(), DeviceError> {
        let inner = self.lock();
        Self::ready(&inner)?;
        self.router.set_capturing(false);
        tracing::info!("sequence acquisition stopped");
        Ok(())
    }

    pub fn is_capturing(&self) -> bool {
        self.router.is_capturing()
    }

    // -----------------------------------------------------------------------
    // ROI
    // -----------------------------------------------------------------------

    /// Align and apply a region. Returns the rectangle actually applied.
    pub fn set_roi(&self, requested: RegionOfInterest) -> Result<RegionOfInterest, DeviceError> {
        let mut inner = self.lock();
        Self::ready(&inner)?;
        let model = self.model();
        let sdk = self.sdk.as_ref();
        let bounds = model.sensor_bounds(sdk)?;
        let hw = to_hardware_region(requested, model.variant(), bounds);
        if hw.is_empty() {
            return Err(DeviceError::InvalidParameterValue {
                name: "ROI".into(),
                value: requested.to_string(),
            });
        }
        model.apply_roi(sdk, hw)?;
        inner.roi = hw;
        inner.cropping = hw != bounds.full_frame();
        self.refresh_geometry(&inner);
        tracing::info!(requested = %requested, applied = %hw, "ROI set");
        Ok(hw)
    }

    pub fn roi(&self) -> Result<RegionOfInterest, DeviceError> {
        let inner = self.lock();
        Self::ready(&inner)?;
        let model = self.model();
        let sdk = self.sdk.as_ref();
        if inner.cropping {
            Ok(model.read_roi(sdk)?)
        } else {
            Ok(model.sensor_bounds(sdk)?.full_frame())
        }
    }

    pub fn clear_roi(&self) -> Result<RegionOfInterest, DeviceError> {
        let mut inner = self.lock();
        Self::ready(&inner)?;
        let full = self.model().clear_roi(self.sdk.as_ref())?;
        inner.roi = full;
        inner.cropping = false;
        self.refresh_geometry(&inner);
        tracing::info!(roi = %full, "ROI cleared");
        Ok(full)
    }

    // -----------------------------------------------------------------------
    // Exposure, geometry, snap
    // -----------------------------------------------------------------------

    pub fn exposure_ms(&self) -> Result<f64, DeviceError> {
        let inner = self.lock();
        Self::ready(&inner)?;
        Ok(self.model().exposure_ms(self.sdk.as_ref())?)
    }

    pub fn set_exposure_ms(&self, ms: f64) -> Result<(), DeviceError> {
        let inner = self.lock();
        Self::ready(&inner)?;
        self.model().set_exposure_ms(self.sdk.as_ref(), ms)?;
        Ok(())
    }

    fn descriptor(&self) -> FrameBufferDescriptor {
        self.router.descriptor()
    }

    pub fn image_width(&self) -> u32 {
        self.descriptor().width
    }

    pub fn image_height(&self) -> u32 {
        self.descriptor().height
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.descriptor().bytes_per_pixel
    }

    pub fn bit_depth(&self) -> u32 {
        self.descriptor().bit_depth
    }

    pub fn image_buffer_size(&self) -> usize {
        self.descriptor().buffer_len()
    }

    /// Copy the most recent frame into the snap buffer.
    pub fn snap_image(&self) -> Result<usize, DeviceError> {
        let mut inner = self.lock();
        Self::ready(&inner)?;
        let len = self.router.descriptor().buffer_len();
        let frame = self.sdk.raw_image(-1).ok_or(DeviceError::NoImage)?;
        if len == 0 || frame.len() != len {
            tracing::warn!(expected = len, got = frame.len(), "latest frame does not match current geometry");
            return Err(DeviceError::NoImage);
        }
        inner.snap = frame;
        Ok(len)
    }

    pub fn image_buffer(&self) -> Vec<u8> {
        self.lock().snap.clone()
    }

    pub fn binning(&self) -> u32 {
        1
    }

    pub fn set_binning(&self, factor: u32) -> Result<(), DeviceError> {
        if factor == 1 {
            Ok(())
        } else {
            Err(DeviceError::InvalidParameterValue {
                name: ParamId::Binning.name().into(),
                value: factor.to_string(),
            })
        }
    }

    // -----------------------------------------------------------------------
    // Parameters
    // -----------------------------------------------------------------------

    pub fn properties(&self) -> Vec<ParameterSpec> {
        self.lock().surface.specs().to_vec()
    }

    fn read_property(&self, inner: &Inner, name: &str) -> Result<Outcome<ParamValue>, DeviceError> {
        let spec = inner
            .surface
            .spec(name)
            .ok_or_else(|| DeviceError::UnknownParameter(name.to_string()))?;
        let value = match spec.id {
            ParamId::DetectCameras => ParamValue::Bool(false),
            ParamId::Binning => ParamValue::Int(i64::from(self.binning())),
            ParamId::Cameras => ParamValue::Text(
                inner
                    .registry
                    .active_camera()
                    .map(|c| c.name().to_string())
                    .unwrap_or_default(),
            ),
            _ => {
                return Ok(inner
                    .surface
                    .get(self.model().as_ref(), self.sdk.as_ref(), name)?)
            }
        };
        Ok(Outcome::Applied(value))
    }

    pub fn get_property(&self, name: &str) -> Result<Outcome<ParamValue>, DeviceError> {
        let inner = self.lock();
        Self::ready(&inner)?;
        self.read_property(&inner, name)
    }

    /// Write a parameter from its host string form.
    ///
    /// A parameter registered for a different variant than the active one
    /// yields `Outcome::Unsupported` and touches no hardware.
    pub fn set_property(&self, name: &str, raw: &str) -> Result<Outcome<()>, DeviceError> {
        let mut inner = self.lock();
        Self::ready(&inner)?;
        let spec = inner
            .surface
            .spec(name)
            .cloned()
            .ok_or_else(|| DeviceError::UnknownParameter(name.to_string()))?;

        match spec.id {
            ParamId::DetectCameras => {
                if spec.coerce(raw)?.as_bool() == Some(true) {
                    self.redetect_locked(&mut inner)?;
                }
                return Ok(Outcome::Applied(()));
            }
            ParamId::Binning => {
                let factor = spec.coerce(raw)?.as_i64().and_then(|v| u32::try_from(v).ok());
                self.set_binning(factor.unwrap_or(0))?;
                return Ok(Outcome::Applied(()));
            }
            ParamId::Cameras => {
                let value = spec.coerce(raw)?;
                let camera = value.as_text().unwrap_or_default().to_string();
                self.select_camera_locked(&mut inner, &camera)?;
                self.host.notify(name, &value);
                return Ok(Outcome::Applied(()));
            }
            _ => {}
        }

        let model = self.model();
        let outcome = inner.surface.set(model.as_ref(), self.sdk.as_ref(), name, raw)?;
        if let Outcome::Applied(()) = outcome {
            self.refresh_geometry(&inner);
            if let Ok(Outcome::Applied(value)) = inner.surface.get(model.as_ref(), self.sdk.as_ref(), name) {
                self.host.notify(name, &value);
            }
        }
        Ok(outcome)
    }

    /// Like [`set_property`](Self::set_property) but treats `Unsupported` as
    /// an error.
    pub fn set_property_strict(&self, name: &str, raw: &str) -> Result<(), DeviceError> {
        Ok(self.set_property(name, raw)?.into_strict(name)?)
    }

    pub fn status(&self) -> DeviceStatus {
        let inner = self.lock();
        let variant = inner.registry.active_variant();
        DeviceStatus {
            phase: inner.phase,
            variant,
            model: variant.to_string(),
            camera: inner.registry.active_camera().map(|c| c.name().to_string()),
            cameras: inner
                .registry
                .cameras()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            acquisition: inner.engine.state(),
            capturing: self.is_capturing(),
            roi: inner.roi,
            cropping: inner.cropping,
            frame: self.router.descriptor(),
        }
    }
}

impl Drop for CameraDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FrameQueue, PropertyTable};
    use flicam_hw::sim::SimCall;
    use flicam_hw::{Feature, FeatureValue, ModelCode, SimulatedSdk};

    struct Rig {
        sdk: Arc<SimulatedSdk>,
        queue: Arc<FrameQueue>,
        table: Arc<PropertyTable>,
        device: CameraDevice,
    }

    fn rig(cameras: &[(&str, ModelCode)]) -> Rig {
        let mut sim = SimulatedSdk::new();
        for (name, model) in cameras {
            sim = sim.with_camera(name, *model);
        }
        rig_with(sim, 16)
    }

    fn rig_with(sim: SimulatedSdk, queue_capacity: usize) -> Rig {
        let sdk = Arc::new(sim);
        let queue = Arc::new(FrameQueue::new(queue_capacity));
        let table = Arc::new(PropertyTable::new());
        let device = CameraDevice::new(
            sdk.clone(),
            table.clone(),
            queue.clone(),
            DeviceSettings {
                label: "FliSdk".into(),
                sdk_buffer_frames: 500,
                poll_interval: Duration::from_millis(20),
                stop_timeout: Duration::from_secs(2),
            },
        );
        Rig {
            sdk,
            queue,
            table,
            device,
        }
    }

    fn names(specs: &[ParameterSpec]) -> Vec<String> {
        specs.iter().map(|s| s.name.to_string()).collect()
    }

    #[test]
    fn test_operations_require_initialize() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        assert!(matches!(r.device.roi(), Err(DeviceError::NotInitialized)));
        assert!(matches!(
            r.device.set_property("Gain", "1"),
            Err(DeviceError::NotInitialized)
        ));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        r.sdk.clear_calls();
        r.device.initialize().unwrap();
        assert!(r.sdk.calls().is_empty());
        assert_eq!(r.device.status().variant, Variant::CblueOne);
        assert_eq!(r.device.status().acquisition, AcquisitionState::Running);
        r.device.shutdown();
        r.device.shutdown();
        assert_eq!(r.device.status().phase, Phase::Uninitialized);
    }

    #[test]
    fn test_no_camera_is_a_valid_state() {
        let r = rig(&[]);
        r.device.initialize().unwrap();
        assert_eq!(r.device.status().variant, Variant::Unknown);
        assert_eq!(r.device.status().acquisition, AcquisitionState::Idle);
        assert_eq!(names(&r.device.properties()), vec!["Detect cameras", "Binning"]);
        assert_eq!(r.device.image_buffer_size(), 0);
    }

    #[test]
    fn test_clear_roi_then_get_roi_is_full_frame() {
        for (model, w, h) in [(ModelCode::CBlue1, 1608, 1104), (ModelCode::CRed2, 640, 512)] {
            let r = rig(&[("cam", model)]);
            r.device.initialize().unwrap();
            r.device.set_roi(RegionOfInterest::new(40, 40, 200, 100)).unwrap();
            r.device.clear_roi().unwrap();
            assert_eq!(r.device.roi().unwrap(), RegionOfInterest::new(0, 0, w, h));
            assert_eq!((r.device.image_width(), r.device.image_height()), (w, h));
        }
    }

    #[test]
    fn test_set_roi_returns_applied_rectangle() {
        let r = rig(&[("red", ModelCode::CRed2)]);
        r.device.initialize().unwrap();
        let applied = r.device.set_roi(RegionOfInterest::new(10, 3, 100, 50)).unwrap();
        assert_eq!(applied, RegionOfInterest::new(0, 4, 96, 48));
        assert_eq!(r.device.roi().unwrap(), applied);
        assert_eq!(r.device.image_buffer_size(), 96 * 48 * 2);
    }

    #[test]
    fn test_gain_split_through_facade() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        r.device.set_property("Gain", "30").unwrap();
        assert_eq!(
            r.sdk.peek(Feature::Gain(flicam_hw::sdk::GainSelector::AnalogAll)),
            Some(FeatureValue::Float(24.0))
        );
        assert_eq!(
            r.sdk.peek(Feature::Gain(flicam_hw::sdk::GainSelector::DigitalAll)),
            Some(FeatureValue::Float(6.0))
        );
        assert_eq!(
            r.device.get_property("Gain").unwrap(),
            Outcome::Applied(ParamValue::Float(30.0))
        );
        assert_eq!(r.table.value("Gain"), Some(ParamValue::Float(30.0)));
    }

    #[test]
    fn test_pixel_format_write_refreshes_descriptor() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        assert_eq!(r.device.bytes_per_pixel(), 2);
        r.device.set_property("Pixel Format", "Mono8").unwrap();
        assert_eq!((r.device.bytes_per_pixel(), r.device.bit_depth()), (1, 8));
    }

    #[test]
    fn test_capturing_gates_frames() {
        let r = rig(&[("red", ModelCode::CRed3)]);
        r.device.initialize().unwrap();
        assert!(r.sdk.deliver_frame());
        assert!(r.queue.is_empty());

        r.device.start_sequence_acquisition().unwrap();
        assert!(r.sdk.deliver_frame());
        assert_eq!(r.queue.len(), 1);

        r.device.stop_sequence_acquisition().unwrap();
        // Hardware keeps streaming after a logical stop.
        assert!(r.sdk.is_streaming());
        assert!(r.sdk.deliver_frame());
        assert_eq!(r.queue.len(), 1);
    }

    #[test]
    fn test_redetect_sequence_and_parameter_set() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        r.device.start_sequence_acquisition().unwrap();
        assert!(names(&r.device.properties()).contains(&"Gain".to_string()));

        r.sdk.unplug_all();
        r.sdk.plug("red", ModelCode::CRed2);
        r.sdk.clear_calls();
        assert_eq!(r.device.redetect().unwrap(), Variant::CredTwo);

        let calls = r.sdk.calls();
        let pos = |c: &SimCall| calls.iter().position(|x| x == c).unwrap();
        assert!(pos(&SimCall::Stop) < pos(&SimCall::DetectCameras));
        assert!(pos(&SimCall::SetCallback(false)) < pos(&SimCall::DetectCameras));
        assert!(pos(&SimCall::SetCamera("red".into())) < pos(&SimCall::Start));
        assert_eq!(r.device.status().acquisition, AcquisitionState::Running);
        assert!(r.device.is_capturing());

        // Registered set is exactly the new variant's.
        let model = model_for(Variant::CredTwo);
        let mut expected = names(&device_parameters_for(&["red"]));
        expected.extend(names(&model.parameters()));
        assert_eq!(names(&r.device.properties()), expected);
        assert_eq!(r.table.names(), expected);
    }

    fn device_parameters_for(cameras: &[&str]) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::boolean(ParamId::DetectCameras),
            ParameterSpec::integer(ParamId::Binning).allow(&[1]),
            ParameterSpec::enumerated(ParamId::Cameras, cameras),
        ]
    }

    #[test]
    fn test_redetect_with_no_cameras_stays_idle() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        r.device.start_sequence_acquisition().unwrap();
        r.sdk.unplug_all();

        assert_eq!(r.device.redetect().unwrap(), Variant::Unknown);
        assert_eq!(r.device.status().acquisition, AcquisitionState::Idle);
        assert!(!r.device.is_capturing());
        assert!(!r.sdk.deliver_frame());
        assert!(r.queue.is_empty());
        assert_eq!(names(&r.device.properties()), vec!["Detect cameras", "Binning"]);
    }

    #[test]
    fn test_detect_cameras_property_triggers_redetect() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        r.sdk.plug("red", ModelCode::CRed3);
        r.sdk.clear_calls();

        r.device.set_property("Detect cameras", "0").unwrap();
        assert!(r.sdk.calls().is_empty());

        r.device.set_property("Detect cameras", "1").unwrap();
        assert!(r.sdk.calls().contains(&SimCall::DetectCameras));
        let cams = r.device.status().cameras;
        assert_eq!(cams, vec!["blue".to_string(), "red".to_string()]);
    }

    #[test]
    fn test_camera_switch_keeps_parameters_and_soft_fails() {
        let r = rig(&[("blue", ModelCode::CBlue1), ("red", ModelCode::CRed2)]);
        r.device.initialize().unwrap();
        let before = names(&r.device.properties());

        r.device.set_property("Cameras", "red").unwrap();
        assert_eq!(r.device.status().variant, Variant::CredTwo);
        assert_eq!(names(&r.device.properties()), before);

        r.sdk.clear_calls();
        assert_eq!(r.device.set_property("Gain", "5").unwrap(), Outcome::Unsupported);
        assert!(r.sdk.calls().is_empty());
        assert!(matches!(
            r.device.set_property_strict("Gain", "5"),
            Err(DeviceError::UnsupportedOnVariant(_))
        ));
    }

    #[test]
    fn test_unknown_camera_name_rejected() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        assert!(matches!(
            r.device.set_property("Cameras", "green"),
            Err(DeviceError::InvalidParameterValue { .. })
        ));
        assert_eq!(r.device.status().variant, Variant::CblueOne);
    }

    #[test]
    fn test_binning_only_one() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        assert_eq!(r.device.binning(), 1);
        r.device.set_property("Binning", "1").unwrap();
        assert!(matches!(
            r.device.set_binning(2),
            Err(DeviceError::InvalidParameterValue { .. })
        ));
        assert!(r.device.set_property("Binning", "2").is_err());
        assert_eq!(
            r.device.get_property("Binning").unwrap(),
            Outcome::Applied(ParamValue::Int(1))
        );
    }

    #[test]
    fn test_exposure_dispatch() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        r.device.set_exposure_ms(4.0).unwrap();
        assert_eq!(r.sdk.peek(Feature::ExposureTime), Some(FeatureValue::Float(4000.0)));
        assert_eq!(r.device.exposure_ms().unwrap(), 4.0);
    }

    #[test]
    fn test_snap_fills_image_buffer() {
        let r = rig(&[("red", ModelCode::CRed2)]);
        r.device.initialize().unwrap();
        r.device.set_roi(RegionOfInterest::new(0, 0, 64, 8)).unwrap();
        let len = r.device.snap_image().unwrap();
        assert_eq!(len, 64 * 8 * 2);
        assert_eq!(r.device.image_buffer().len(), len);
    }

    /// Host whose `notify` blocks while the gate is closed, wedging the
    /// supervisor inside a status tick.
    #[derive(Default)]
    struct GatedHost {
        closed: Mutex<bool>,
        cv: std::sync::Condvar,
    }

    impl GatedHost {
        fn set_closed(&self, closed: bool) {
            *self.closed.lock().unwrap() = closed;
            self.cv.notify_all();
        }
    }

    impl PropertyHost for GatedHost {
        fn replace_all(&self, _specs: &[ParameterSpec]) {}

        fn notify(&self, _name: &str, _value: &ParamValue) {
            let mut closed = self.closed.lock().unwrap();
            while *closed {
                closed = self.cv.wait(closed).unwrap();
            }
        }
    }

    #[test]
    fn test_stuck_supervisor_faults_device() {
        let sdk = Arc::new(SimulatedSdk::new().with_camera("blue", ModelCode::CBlue1));
        let host = Arc::new(GatedHost::default());
        let device = CameraDevice::new(
            sdk.clone(),
            host.clone(),
            Arc::new(FrameQueue::new(4)),
            DeviceSettings {
                label: "FliSdk".into(),
                sdk_buffer_frames: 500,
                poll_interval: Duration::from_millis(10),
                stop_timeout: Duration::from_millis(100),
            },
        );
        device.initialize().unwrap();
        host.set_closed(true);
        std::thread::sleep(Duration::from_millis(50));

        assert!(matches!(device.redetect(), Err(DeviceError::ThreadLifecycle(_))));
        assert_eq!(device.status().phase, Phase::Faulted);
        assert!(matches!(device.roi(), Err(DeviceError::Faulted)));
        assert!(matches!(device.initialize(), Err(DeviceError::Faulted)));

        device.shutdown();
        host.set_closed(false);
        assert_eq!(device.status().phase, Phase::Uninitialized);
        assert!(!sdk.is_streaming());

        device.initialize().unwrap();
        assert_eq!(device.status().acquisition, AcquisitionState::Running);
    }

    #[test]
    fn test_read_only_parameter() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.device.initialize().unwrap();
        assert!(matches!(
            r.device.set_property("Device Status", "x"),
            Err(DeviceError::ReadOnly(_))
        ));
        assert!(matches!(
            r.device.set_property("Nope", "x"),
            Err(DeviceError::UnknownParameter(_))
        ));
    }

    fn lifecycle_calls(sdk: &SimulatedSdk) -> Vec<SimCall> {
        sdk.calls()
            .into_iter()
            .filter(|c| matches!(c, SimCall::Init | SimCall::Exit))
            .collect()
    }

    #[test]
    fn test_failed_initialize_releases_sdk_and_retries_cleanly() {
        let r = rig(&[("blue", ModelCode::CBlue1)]);
        r.sdk.fail_next_start();

        assert!(matches!(r.device.initialize(), Err(DeviceError::Sdk(_))));
        assert_eq!(r.device.status().phase, Phase::Uninitialized);
        assert_eq!(lifecycle_calls(&r.sdk), vec![SimCall::Init, SimCall::Exit]);
        assert!(matches!(r.device.roi(), Err(DeviceError::NotInitialized)));

        r.device.initialize().unwrap();
        assert_eq!(
            lifecycle_calls(&r.sdk),
            vec![SimCall::Init, SimCall::Exit, SimCall::Init]
        );
        let status = r.device.status();
        assert_eq!(status.phase, Phase::Ready);
        assert_eq!(status.variant, Variant::CblueOne);
        assert_eq!(status.acquisition, AcquisitionState::Running);
        assert!(r.sdk.is_streaming());

        r.device.shutdown();
        assert_eq!(
            lifecycle_calls(&r.sdk),
            vec![SimCall::Init, SimCall::Exit, SimCall::Init, SimCall::Exit]
        );
    }

    #[test]
    fn test_selecting_vanished_camera_is_hardware_not_found() {
        let r = rig(&[("blue", ModelCode::CBlue1), ("red", ModelCode::CRed2)]);
        r.device.initialize().unwrap();
        r.sdk.unplug_all();

        assert!(matches!(
            r.device.set_property("Cameras", "red"),
            Err(DeviceError::HardwareNotFound(name)) if name == "red"
        ));
        assert_eq!(r.device.status().phase, Phase::Ready);
    }

    #[test]
    fn test_snap_rejects_frame_from_previous_geometry() {
        let r = rig(&[("red", ModelCode::CRed2)]);
        r.device.initialize().unwrap();
        assert!(r.sdk.deliver_frame());

        r.device.set_roi(RegionOfInterest::new(0, 0, 64, 8)).unwrap();
        assert!(matches!(r.device.snap_image(), Err(DeviceError::NoImage)));
        assert!(r.device.image_buffer().is_empty());

        assert!(r.sdk.deliver_frame());
        assert_eq!(r.device.snap_image().unwrap(), 64 * 8 * 2);
    }

    #[test]
    fn test_redetect_to_no_camera_stops_timed_delivery() {
        let sim = SimulatedSdk::new()
            .with_camera("red", ModelCode::CRed2)
            .with_frame_interval(Duration::from_millis(5));
        let r = rig_with(sim, 4);
        r.device.initialize().unwrap();
        r.device.start_sequence_acquisition().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while r.queue.is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!r.queue.is_empty());

        r.sdk.unplug_all();
        assert_eq!(r.device.redetect().unwrap(), Variant::Unknown);
        r.queue.clear_backlog();
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(r.device.status().acquisition, AcquisitionState::Idle);
        assert!(!r.device.is_capturing());
        assert!(!r.sdk.is_streaming());
        assert!(r.queue.is_empty());
    }
}
