use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod device;
mod engine;
mod host;

use device::{CameraDevice, DeviceSettings};
use host::{FrameQueue, PropertyTable};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("flicamd starting");

    let config = config::Config::from_env();

    let mut sim = flicam_hw::SimulatedSdk::new();
    for (name, model) in &config.sim_cameras {
        sim = sim.with_camera(name, *model);
    }
    if let Some(interval) = config.sim_frame_interval {
        sim = sim.with_frame_interval(interval);
    }
    tracing::info!(cameras = config.sim_cameras.len(), "using simulated camera SDK");

    let queue = Arc::new(FrameQueue::new(config.queue_capacity));
    let properties = Arc::new(PropertyTable::new());
    let device = Arc::new(CameraDevice::new(
        Arc::new(sim),
        properties.clone(),
        queue.clone(),
        DeviceSettings {
            label: config.device_label.clone(),
            sdk_buffer_frames: config.sdk_buffer_frames,
            poll_interval: config.poll_interval,
            stop_timeout: config.stop_timeout,
        },
    ));

    {
        let device = device.clone();
        tokio::task::spawn_blocking(move || device.initialize()).await??;
    }

    let _conn = if config.dbus_enabled {
        let service =
            dbus_interface::CameraService::new(device.clone(), queue.clone(), properties.clone());
        let conn = zbus::connection::Builder::session()?
            .name("org.flicam.Camera1")?
            .serve_at("/org/flicam/Camera1", service)?
            .build()
            .await?;
        tracing::info!("D-Bus interface registered on session bus");
        Some(conn)
    } else {
        tracing::info!("D-Bus disabled");
        None
    };

    tracing::info!("flicamd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("flicamd shutting down");

    tokio::task::spawn_blocking(move || device.shutdown()).await?;

    Ok(())
}
