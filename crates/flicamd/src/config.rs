use flicam_hw::{ModelCode, Variant};
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Label attached to every frame's metadata (default: FliSdk).
    pub device_label: String,
    /// Interval of the supervisory status loop.
    pub poll_interval: Duration,
    /// Bounded wait for the supervisory thread to exit on stop.
    pub stop_timeout: Duration,
    /// SDK ring buffer size, in frames, set on every camera selection.
    pub sdk_buffer_frames: usize,
    /// Capacity of the in-process frame queue.
    pub queue_capacity: usize,
    /// Cameras attached to the simulated SDK.
    pub sim_cameras: Vec<(String, ModelCode)>,
    /// Automatic delivery cadence of the simulated SDK; `None` disables it.
    pub sim_frame_interval: Option<Duration>,
    /// Whether to serve the D-Bus interface on the session bus.
    pub dbus_enabled: bool,
}

impl Config {
    /// Load configuration from `FLICAM_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let sim_cameras = std::env::var("FLICAM_SIM_CAMERAS")
            .map(|v| parse_sim_cameras(&v))
            .unwrap_or_else(|_| vec![("C-BLUE One".to_string(), ModelCode::CBlue1)]);

        let sim_interval_ms = env_u64("FLICAM_SIM_FRAME_INTERVAL_MS", 50);

        Self {
            device_label: std::env::var("FLICAM_DEVICE_LABEL")
                .unwrap_or_else(|_| "FliSdk".to_string()),
            poll_interval: Duration::from_millis(env_u64("FLICAM_POLL_INTERVAL_MS", 1000)),
            stop_timeout: Duration::from_millis(env_u64("FLICAM_STOP_TIMEOUT_MS", 5000)),
            sdk_buffer_frames: env_usize("FLICAM_SDK_BUFFER_FRAMES", 500),
            queue_capacity: env_usize("FLICAM_QUEUE_CAPACITY", 64),
            sim_cameras,
            sim_frame_interval: (sim_interval_ms > 0).then(|| Duration::from_millis(sim_interval_ms)),
            dbus_enabled: std::env::var("FLICAM_DBUS")
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }
}

/// Parse `name=model` pairs separated by commas. Unknown models are skipped.
pub fn parse_sim_cameras(spec: &str) -> Vec<(String, ModelCode)> {
    spec.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let (name, tag) = entry.split_once('=')?;
            let code = match Variant::from_tag(tag)? {
                Variant::CredTwo => ModelCode::CRed2,
                Variant::CredThree => ModelCode::CRed3,
                Variant::CblueOne => ModelCode::CBlue1,
                Variant::Unknown => return None,
            };
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), code))
        })
        .collect()
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sim_cameras() {
        let cams = parse_sim_cameras("red=cred2, blue = cblue1,bogus=cred9,=cred3,noequals");
        assert_eq!(
            cams,
            vec![
                ("red".to_string(), ModelCode::CRed2),
                ("blue".to_string(), ModelCode::CBlue1),
            ]
        );
    }

    #[test]
    fn test_parse_sim_cameras_empty() {
        assert!(parse_sim_cameras("").is_empty());
        assert!(parse_sim_cameras("ghost=unknown").is_empty());
    }
}
