//! Acquisition engine.
//!
//! Two threads touch a running camera. The SDK's own delivery thread calls
//! [`FrameRouter::image_received`] for every frame; the engine owns a
//! supervisory thread that wakes once per poll interval to refresh status
//! parameters. Control operations (start, stop, redetect) are serialized by
//! the caller.

use crate::host::{FrameSink, PropertyHost, SinkError};
use chrono::Utc;
use flicam_core::CameraModel;
use flicam_hw::{CameraSdk, FrameBufferDescriptor, FrameCallback, FrameMetadata, SdkError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("supervisor thread: {0}")]
    ThreadLifecycle(String),
    #[error("SDK: {0}")]
    Sdk(#[from] SdkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionState {
    Idle,
    Running,
    Stopping,
}

/// What happened to one delivered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Capturing is off; the frame was ignored.
    Discarded,
    Inserted,
    /// Inserted after one backlog clear.
    Retried,
    Dropped,
}

#[derive(Debug, Clone, Copy, Default)]
struct Geometry {
    descriptor: FrameBufferDescriptor,
    roi_x: u32,
    roi_y: u32,
}

/// Forwards frames from the SDK callback into the host sink.
pub struct FrameRouter {
    label: String,
    capturing: AtomicBool,
    sequence: AtomicU64,
    geometry: RwLock<Geometry>,
    sink: Arc<dyn FrameSink>,
}

impl FrameRouter {
    pub fn new(label: impl Into<String>, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            label: label.into(),
            capturing: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            geometry: RwLock::new(Geometry::default()),
            sink,
        }
    }

    pub fn set_capturing(&self, on: bool) {
        self.capturing.store(on, Ordering::SeqCst);
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Commit the frame geometry and ROI origin used for the next frames.
    pub fn update_geometry(&self, descriptor: FrameBufferDescriptor, roi_x: u32, roi_y: u32) {
        let mut g = self.geometry.write().unwrap_or_else(|e| e.into_inner());
        *g = Geometry {
            descriptor,
            roi_x,
            roi_y,
        };
    }

    pub fn descriptor(&self) -> FrameBufferDescriptor {
        self.geometry.read().unwrap_or_else(|e| e.into_inner()).descriptor
    }

    /// Frame-ready callback body.
    pub fn image_received(&self, buffer: &[u8]) -> Delivery {
        if !self.is_capturing() {
            tracing::trace!("frame discarded, not capturing");
            return Delivery::Discarded;
        }
        let g = *self.geometry.read().unwrap_or_else(|e| e.into_inner());
        let expected = g.descriptor.buffer_len();
        if expected == 0 || buffer.len() < expected {
            tracing::warn!(
                got = buffer.len(),
                expected,
                "frame size does not match committed geometry; dropped"
            );
            return Delivery::Dropped;
        }
        let frame = &buffer[..expected];
        let metadata = FrameMetadata {
            camera_label: self.label.clone(),
            roi_x: g.roi_x,
            roi_y: g.roi_y,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: Utc::now(),
        };

        match self.sink.insert(frame, &g.descriptor, 1, &metadata) {
            Ok(()) => {
                tracing::trace!(sequence = metadata.sequence, "frame inserted");
                Delivery::Inserted
            }
            Err(SinkError::BufferOverflow) => {
                tracing::warn!(sequence = metadata.sequence, "frame sink overflow; clearing backlog");
                self.sink.clear_backlog();
                match self.sink.insert(frame, &g.descriptor, 1, &metadata) {
                    Ok(()) => Delivery::Retried,
                    Err(e) => {
                        tracing::warn!(sequence = metadata.sequence, error = %e, "frame dropped");
                        Delivery::Dropped
                    }
                }
            }
        }
    }
}

/// Refreshes status parameters through the active model.
///
/// Also the single owner of the active model: control operations swap it
/// here so the supervisory thread always polls the current variant.
pub struct StatusPoller {
    sdk: Arc<dyn CameraSdk>,
    host: Arc<dyn PropertyHost>,
    model: RwLock<Arc<dyn CameraModel>>,
}

impl StatusPoller {
    pub fn new(
        sdk: Arc<dyn CameraSdk>,
        host: Arc<dyn PropertyHost>,
        model: Arc<dyn CameraModel>,
    ) -> Self {
        Self {
            sdk,
            host,
            model: RwLock::new(model),
        }
    }

    pub fn model(&self) -> Arc<dyn CameraModel> {
        Arc::clone(&self.model.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn set_model(&self, model: Arc<dyn CameraModel>) {
        *self.model.write().unwrap_or_else(|e| e.into_inner()) = model;
    }

    /// Poll once. Returns the number of parameters refreshed.
    pub fn tick(&self) -> usize {
        let model = self.model();
        let values = model.refresh_status(self.sdk.as_ref());
        for (id, value) in &values {
            self.host.notify(id.name(), value);
        }
        tracing::trace!(count = values.len(), "status refreshed");
        values.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineTimings {
    pub poll_interval: Duration,
    pub stop_timeout: Duration,
}

struct Supervisor {
    exit_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Owns the hardware streaming lifecycle and the supervisory thread.
pub struct AcquisitionEngine {
    sdk: Arc<dyn CameraSdk>,
    router: Arc<FrameRouter>,
    poller: Arc<StatusPoller>,
    timings: EngineTimings,
    state: AcquisitionState,
    supervisor: Option<Supervisor>,
}

impl AcquisitionEngine {
    pub fn new(
        sdk: Arc<dyn CameraSdk>,
        router: Arc<FrameRouter>,
        poller: Arc<StatusPoller>,
        timings: EngineTimings,
    ) -> Self {
        Self {
            sdk,
            router,
            poller,
            timings,
            state: AcquisitionState::Idle,
            supervisor: None,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Register the frame callback, start streaming and spawn the
    /// supervisory thread. No-op unless idle.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.state != AcquisitionState::Idle {
            return Ok(());
        }

        let router = Arc::clone(&self.router);
        let callback: FrameCallback = Arc::new(move |buf: &[u8]| {
            router.image_received(buf);
        });
        self.sdk.set_frame_callback(Some(callback));
        if let Err(e) = self.sdk.start() {
            self.sdk.set_frame_callback(None);
            return Err(e.into());
        }

        let (exit_tx, exit_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let poller = Arc::clone(&self.poller);
        let interval = self.timings.poll_interval;

        let spawned = std::thread::Builder::new()
            .name("flicam-supervisor".into())
            .spawn(move || {
                tracing::info!("supervisor thread started");
                loop {
                    match exit_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            poller.tick();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                let _ = done_tx.send(());
                tracing::info!("supervisor thread exiting");
            });

        match spawned {
            Ok(handle) => {
                self.supervisor = Some(Supervisor {
                    exit_tx,
                    done_rx,
                    handle,
                });
                self.state = AcquisitionState::Running;
                tracing::info!(interval_ms = interval.as_millis() as u64, "acquisition engine running");
                Ok(())
            }
            Err(e) => {
                let _ = self.sdk.stop();
                self.sdk.set_frame_callback(None);
                Err(EngineError::ThreadLifecycle(format!("spawn failed: {e}")))
            }
        }
    }

    /// Signal the supervisor, wait for it to confirm exit, join it, then
    /// stop hardware streaming.
    ///
    /// If the supervisor does not confirm within the stop timeout the engine
    /// stays in `Stopping` and returns `ThreadLifecycle`; streaming is left
    /// untouched.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let Some(sup) = self.supervisor.take() else {
            if self.state == AcquisitionState::Stopping {
                self.halt_streaming()?;
            }
            return Ok(());
        };

        self.state = AcquisitionState::Stopping;
        let _ = sup.exit_tx.send(());
        match sup.done_rx.recv_timeout(self.timings.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(
                    timeout_ms = self.timings.stop_timeout.as_millis() as u64,
                    "supervisor thread did not exit in time"
                );
                self.supervisor = Some(sup);
                return Err(EngineError::ThreadLifecycle(
                    "supervisor did not exit within the stop timeout".into(),
                ));
            }
        }
        if sup.handle.join().is_err() {
            tracing::error!("supervisor thread panicked");
            self.halt_streaming()?;
            return Err(EngineError::ThreadLifecycle("supervisor thread panicked".into()));
        }

        self.halt_streaming()?;
        tracing::info!("acquisition engine idle");
        Ok(())
    }

    /// Give up on a supervisor that will not exit: detach it and stop
    /// streaming anyway. Used on the way to shutdown only.
    pub fn abandon(&mut self) -> Result<(), EngineError> {
        if let Some(sup) = self.supervisor.take() {
            let _ = sup.exit_tx.send(());
            tracing::warn!("supervisor thread detached");
        }
        self.halt_streaming()
    }

    fn halt_streaming(&mut self) -> Result<(), EngineError> {
        let stopped = self.sdk.stop();
        self.sdk.set_frame_callback(None);
        self.state = AcquisitionState::Idle;
        stopped.map_err(EngineError::from)
    }
}

impl Drop for AcquisitionEngine {
    fn drop(&mut self) {
        if self.supervisor.is_some() {
            let _ = self.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FrameQueue, PropertyTable};
    use flicam_core::{model_for, ParamValue, ParameterSpec};
    use flicam_hw::{ModelCode, SimulatedSdk, Variant};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Sink that records calls and overflows a configurable number of times.
    #[derive(Default)]
    struct RecordingSink {
        inserts: AtomicUsize,
        clears: AtomicUsize,
        overflows_left: AtomicUsize,
    }

    impl RecordingSink {
        fn overflowing(times: usize) -> Self {
            Self {
                overflows_left: AtomicUsize::new(times),
                ..Self::default()
            }
        }
    }

    impl FrameSink for RecordingSink {
        fn insert(
            &self,
            _buffer: &[u8],
            _descriptor: &FrameBufferDescriptor,
            _channels: u32,
            _metadata: &FrameMetadata,
        ) -> Result<(), SinkError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            let left = self.overflows_left.load(Ordering::SeqCst);
            if left > 0 {
                self.overflows_left.store(left - 1, Ordering::SeqCst);
                return Err(SinkError::BufferOverflow);
            }
            Ok(())
        }

        fn clear_backlog(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn descriptor() -> FrameBufferDescriptor {
        FrameBufferDescriptor {
            width: 4,
            height: 2,
            ..FrameBufferDescriptor::EMPTY
        }
    }

    fn router(sink: Arc<RecordingSink>) -> FrameRouter {
        let r = FrameRouter::new("FliSdk", sink);
        r.update_geometry(descriptor(), 32, 8);
        r
    }

    #[test]
    fn test_not_capturing_never_touches_sink() {
        let sink = Arc::new(RecordingSink::default());
        let r = router(Arc::clone(&sink));
        for _ in 0..5 {
            assert_eq!(r.image_received(&[0u8; 16]), Delivery::Discarded);
        }
        assert_eq!(sink.inserts.load(Ordering::SeqCst), 0);
        assert_eq!(sink.clears.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_overflow_clears_once_and_retries_once() {
        let sink = Arc::new(RecordingSink::overflowing(1));
        let r = router(Arc::clone(&sink));
        r.set_capturing(true);
        assert_eq!(r.image_received(&[0u8; 16]), Delivery::Retried);
        assert_eq!(sink.inserts.load(Ordering::SeqCst), 2);
        assert_eq!(sink.clears.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_overflow_is_not_retried() {
        let sink = Arc::new(RecordingSink::overflowing(5));
        let r = router(Arc::clone(&sink));
        r.set_capturing(true);
        assert_eq!(r.image_received(&[0u8; 16]), Delivery::Dropped);
        assert_eq!(sink.inserts.load(Ordering::SeqCst), 2);
        assert_eq!(sink.clears.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_short_buffer_dropped() {
        let sink = Arc::new(RecordingSink::default());
        let r = router(Arc::clone(&sink));
        r.set_capturing(true);
        assert_eq!(r.image_received(&[0u8; 3]), Delivery::Dropped);
        assert_eq!(sink.inserts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_metadata_carries_roi_origin() {
        let queue = Arc::new(FrameQueue::new(4));
        let r = FrameRouter::new("cam-label", queue.clone());
        r.update_geometry(descriptor(), 32, 8);
        r.set_capturing(true);
        r.image_received(&[7u8; 20]);
        let frame = queue.pop().unwrap();
        assert_eq!(frame.data.len(), 16);
        assert_eq!(frame.metadata.camera_label, "cam-label");
        assert_eq!((frame.metadata.roi_x, frame.metadata.roi_y), (32, 8));
        assert_eq!(frame.metadata.sequence, 1);
    }

    fn ready_sdk(model: ModelCode) -> Arc<SimulatedSdk> {
        let sdk = Arc::new(SimulatedSdk::new().with_camera("cam0", model));
        sdk.init().unwrap();
        sdk.detect_cameras().unwrap();
        sdk.set_camera("cam0").unwrap();
        sdk.update().unwrap();
        sdk
    }

    fn engine_for(
        sdk: &Arc<SimulatedSdk>,
        host: Arc<dyn PropertyHost>,
        variant: Variant,
        timings: EngineTimings,
    ) -> (AcquisitionEngine, Arc<FrameRouter>) {
        let router = Arc::new(FrameRouter::new("FliSdk", Arc::new(FrameQueue::new(8))));
        let poller = Arc::new(StatusPoller::new(sdk.clone(), host, model_for(variant)));
        let engine = AcquisitionEngine::new(sdk.clone(), Arc::clone(&router), poller, timings);
        (engine, router)
    }

    const FAST: EngineTimings = EngineTimings {
        poll_interval: Duration::from_millis(10),
        stop_timeout: Duration::from_secs(2),
    };

    #[test]
    fn test_start_stop_lifecycle() {
        let sdk = ready_sdk(ModelCode::CRed2);
        let (mut engine, _router) =
            engine_for(&sdk, Arc::new(PropertyTable::new()), Variant::CredTwo, FAST);
        assert_eq!(engine.state(), AcquisitionState::Idle);

        engine.start().unwrap();
        assert_eq!(engine.state(), AcquisitionState::Running);
        assert!(sdk.is_streaming());
        assert!(sdk.has_callback());

        engine.stop().unwrap();
        assert_eq!(engine.state(), AcquisitionState::Idle);
        assert!(!sdk.is_streaming());
        assert!(!sdk.has_callback());

        // Stopping an idle engine is harmless.
        engine.stop().unwrap();
    }

    #[test]
    fn test_supervisor_refreshes_status() {
        let sdk = ready_sdk(ModelCode::CRed2);
        let table = Arc::new(PropertyTable::new());
        table.replace_all(&model_for(Variant::CredTwo).parameters());
        let (mut engine, _router) = engine_for(&sdk, table.clone(), Variant::CredTwo, FAST);
        engine.start().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while table.value("Sensor Temp").is_none() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        engine.stop().unwrap();
        assert_eq!(table.value("Sensor Temp"), Some(ParamValue::Float(-40.0)));
        assert!(table.value("Camera Status").is_some());
    }

    #[test]
    fn test_callback_routes_frames_while_running() {
        let sdk = ready_sdk(ModelCode::CRed3);
        let queue = Arc::new(FrameQueue::new(8));
        let router = Arc::new(FrameRouter::new("FliSdk", queue.clone()));
        let poller = Arc::new(StatusPoller::new(
            sdk.clone(),
            Arc::new(PropertyTable::new()),
            model_for(Variant::CredThree),
        ));
        let mut engine = AcquisitionEngine::new(sdk.clone(), Arc::clone(&router), poller, FAST);
        router.update_geometry(
            FrameBufferDescriptor {
                width: 640,
                height: 512,
                ..FrameBufferDescriptor::EMPTY
            },
            0,
            0,
        );
        engine.start().unwrap();
        router.set_capturing(true);
        assert!(sdk.deliver_frame());
        assert_eq!(queue.len(), 1);

        engine.stop().unwrap();
        assert!(!sdk.deliver_frame());
        assert_eq!(queue.len(), 1);
    }

    /// Host whose notifications block until the test opens the gate.
    struct GatedHost {
        gate: Mutex<()>,
        entered: AtomicBool,
    }

    impl PropertyHost for GatedHost {
        fn replace_all(&self, _specs: &[ParameterSpec]) {}

        fn notify(&self, _name: &str, _value: &ParamValue) {
            self.entered.store(true, Ordering::SeqCst);
            let _guard = self.gate.lock().unwrap_or_else(|e| e.into_inner());
        }
    }

    #[test]
    fn test_stop_times_out_on_stuck_supervisor() {
        let sdk = ready_sdk(ModelCode::CRed2);
        let host = Arc::new(GatedHost {
            gate: Mutex::new(()),
            entered: AtomicBool::new(false),
        });
        let timings = EngineTimings {
            poll_interval: Duration::from_millis(5),
            stop_timeout: Duration::from_millis(50),
        };
        let (mut engine, _router) = engine_for(&sdk, host.clone(), Variant::CredTwo, timings);

        let guard = host.gate.lock().unwrap();
        engine.start().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !host.entered.load(Ordering::SeqCst) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(host.entered.load(Ordering::SeqCst));

        let err = engine.stop().unwrap_err();
        assert!(matches!(err, EngineError::ThreadLifecycle(_)));
        assert_eq!(engine.state(), AcquisitionState::Stopping);
        // Streaming must not be torn down under a live supervisor.
        assert!(sdk.is_streaming());

        drop(guard);
        engine.stop().unwrap();
        assert_eq!(engine.state(), AcquisitionState::Idle);
        assert!(!sdk.is_streaming());
    }
}
