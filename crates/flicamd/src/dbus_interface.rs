use crate::device::{CameraDevice, DeviceError};
use crate::host::{FrameQueue, PropertyTable};
use flicam_core::{Outcome, RegionOfInterest};
use std::sync::Arc;
use zbus::interface;

type Rect = (u32, u32, u32, u32);

/// width, height, bytes per pixel, bit depth, buffer size in bytes.
type ImageInfo = (u32, u32, u32, u32, u64);

/// D-Bus interface for the flicam camera daemon.
///
/// Bus name: org.flicam.Camera1
/// Object path: /org/flicam/Camera1
pub struct CameraService {
    device: Arc<CameraDevice>,
    queue: Arc<FrameQueue>,
    properties: Arc<PropertyTable>,
}

impl CameraService {
    pub fn new(
        device: Arc<CameraDevice>,
        queue: Arc<FrameQueue>,
        properties: Arc<PropertyTable>,
    ) -> Self {
        Self {
            device,
            queue,
            properties,
        }
    }
}

fn to_fdo(e: DeviceError) -> zbus::fdo::Error {
    use zbus::fdo::Error;
    match e {
        DeviceError::InvalidParameterValue { .. } => Error::InvalidArgs(e.to_string()),
        DeviceError::UnknownParameter(name) => Error::UnknownProperty(name),
        DeviceError::ReadOnly(name) => Error::PropertyReadOnly(name),
        DeviceError::UnsupportedOnVariant(_) => Error::NotSupported(e.to_string()),
        other => Error::Failed(other.to_string()),
    }
}

fn rect(roi: RegionOfInterest) -> Rect {
    (roi.x, roi.y, roi.width, roi.height)
}

/// Run a device call on the blocking pool. Device operations take the
/// device lock and may wait on the supervisor thread.
async fn run_blocking<T, F>(device: &Arc<CameraDevice>, f: F) -> zbus::fdo::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CameraDevice) -> Result<T, DeviceError> + Send + 'static,
{
    let device = Arc::clone(device);
    tokio::task::spawn_blocking(move || f(&device))
        .await
        .map_err(|e| zbus::fdo::Error::Failed(format!("device task failed: {e}")))?
        .map_err(to_fdo)
}

#[interface(name = "org.flicam.Camera1")]
impl CameraService {
    /// Return daemon and device status as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = run_blocking(&self.device, |d| Ok(d.status())).await?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "device": status,
            "pending_frames": self.queue.len(),
            "queue_capacity": self.queue.capacity(),
        })
        .to_string())
    }

    /// Registered parameters with their last known values, as JSON.
    async fn list_properties(&self) -> zbus::fdo::Result<String> {
        serde_json::to_string(&self.properties.entries())
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Read one parameter. The value is returned in its JSON form.
    async fn get_property(&self, name: &str) -> zbus::fdo::Result<String> {
        let owned = name.to_string();
        match run_blocking(&self.device, move |d| d.get_property(&owned)).await? {
            Outcome::Applied(value) => serde_json::to_string(&value)
                .map_err(|e| zbus::fdo::Error::Failed(e.to_string())),
            Outcome::Unsupported => Err(zbus::fdo::Error::NotSupported(format!(
                "{name} is not supported by the active camera"
            ))),
        }
    }

    /// Write one parameter. Returns false when the active camera does not
    /// support it.
    async fn set_property(&self, name: &str, value: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(param = name, value, "set_property requested");
        let (name, value) = (name.to_string(), value.to_string());
        let outcome = run_blocking(&self.device, move |d| d.set_property(&name, &value)).await?;
        Ok(!outcome.is_unsupported())
    }

    /// Like `SetProperty` but fails with `NotSupported` when the active
    /// camera lacks the parameter.
    async fn set_property_strict(&self, name: &str, value: &str) -> zbus::fdo::Result<()> {
        tracing::info!(param = name, value, "set_property_strict requested");
        let (name, value) = (name.to_string(), value.to_string());
        run_blocking(&self.device, move |d| d.set_property_strict(&name, &value)).await
    }

    async fn get_exposure(&self) -> zbus::fdo::Result<f64> {
        run_blocking(&self.device, |d| d.exposure_ms()).await
    }

    /// Set the exposure time in milliseconds.
    async fn set_exposure(&self, ms: f64) -> zbus::fdo::Result<()> {
        tracing::info!(ms, "set_exposure requested");
        run_blocking(&self.device, move |d| d.set_exposure_ms(ms)).await
    }

    /// Geometry of the frames currently delivered.
    async fn image_info(&self) -> zbus::fdo::Result<ImageInfo> {
        run_blocking(&self.device, |d| {
            Ok((
                d.image_width(),
                d.image_height(),
                d.bytes_per_pixel(),
                d.bit_depth(),
                d.image_buffer_size() as u64,
            ))
        })
        .await
    }

    /// Contents of the snap buffer filled by the last `Snap`.
    async fn image_buffer(&self) -> zbus::fdo::Result<Vec<u8>> {
        run_blocking(&self.device, |d| Ok(d.image_buffer())).await
    }

    async fn get_roi(&self) -> zbus::fdo::Result<Rect> {
        run_blocking(&self.device, |d| d.roi().map(rect)).await
    }

    /// Align and apply a region; returns the rectangle actually applied.
    async fn set_roi(&self, x: u32, y: u32, width: u32, height: u32) -> zbus::fdo::Result<Rect> {
        tracing::info!(x, y, width, height, "set_roi requested");
        let requested = RegionOfInterest::new(x, y, width, height);
        run_blocking(&self.device, move |d| d.set_roi(requested).map(rect)).await
    }

    async fn clear_roi(&self) -> zbus::fdo::Result<Rect> {
        run_blocking(&self.device, |d| d.clear_roi().map(rect)).await
    }

    async fn start_acquisition(&self) -> zbus::fdo::Result<()> {
        run_blocking(&self.device, |d| d.start_sequence_acquisition()).await
    }

    async fn stop_acquisition(&self) -> zbus::fdo::Result<()> {
        run_blocking(&self.device, |d| d.stop_sequence_acquisition()).await
    }

    /// Capture the most recent frame into the snap buffer; returns its size
    /// in bytes.
    async fn snap(&self) -> zbus::fdo::Result<u64> {
        let len = run_blocking(&self.device, |d| d.snap_image()).await?;
        Ok(len as u64)
    }

    /// Re-enumerate cameras; returns the active camera's model name.
    async fn redetect(&self) -> zbus::fdo::Result<String> {
        tracing::info!("redetect requested");
        let variant = run_blocking(&self.device, |d| d.redetect()).await?;
        Ok(variant.to_string())
    }

    /// Frames waiting in the in-process queue.
    async fn pending_frames(&self) -> zbus::fdo::Result<u32> {
        Ok(u32::try_from(self.queue.len()).unwrap_or(u32::MAX))
    }

    /// Take the oldest queued frame: its metadata as JSON and its pixels.
    async fn next_frame(&self) -> zbus::fdo::Result<(String, Vec<u8>)> {
        let frame = self
            .queue
            .pop()
            .ok_or_else(|| zbus::fdo::Error::Failed("no frame queued".into()))?;
        let meta = serde_json::json!({
            "metadata": frame.metadata,
            "descriptor": frame.descriptor,
            "channels": frame.channels,
        });
        Ok((meta.to_string(), frame.data))
    }
}
