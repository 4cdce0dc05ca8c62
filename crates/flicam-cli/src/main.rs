use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flicam", about = "First Light Imaging camera control CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon and camera status
    Status,
    /// List registered parameters with their current values
    List,
    /// Read one parameter
    Get {
        /// Parameter name (e.g., "Gain", "Exposure Time (ms)")
        name: String,
    },
    /// Write one parameter
    Set {
        name: String,
        value: String,
        /// Fail instead of warning when the active camera lacks the parameter
        #[arg(long)]
        strict: bool,
    },
    /// Show the exposure time in milliseconds
    Exposure,
    /// Set the exposure time in milliseconds
    SetExposure { ms: f64 },
    /// Show the geometry of delivered frames
    Image,
    /// Show the applied region of interest
    Roi,
    /// Request a region of interest; prints the aligned region applied
    SetRoi {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    /// Restore the full sensor frame
    ClearRoi,
    /// Start passing frames to the frame queue
    Start,
    /// Stop passing frames to the frame queue
    Stop,
    /// Capture the latest frame into the snap buffer
    Snap {
        /// Write the snapped pixels to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Re-enumerate cameras and rebuild the parameter set
    Redetect,
    /// Show how many frames are waiting in the queue
    Pending,
    /// Take the oldest queued frame
    Frame {
        /// Write the frame's pixels to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// `#[zbus::proxy]` generates `CameraProxy` (async) for the daemon interface.
#[zbus::proxy(
    interface = "org.flicam.Camera1",
    default_service = "org.flicam.Camera1",
    default_path = "/org/flicam/Camera1"
)]
trait Camera {
    async fn status(&self) -> zbus::Result<String>;
    async fn list_properties(&self) -> zbus::Result<String>;
    async fn get_property(&self, name: &str) -> zbus::Result<String>;
    async fn set_property(&self, name: &str, value: &str) -> zbus::Result<bool>;
    async fn set_property_strict(&self, name: &str, value: &str) -> zbus::Result<()>;
    async fn get_exposure(&self) -> zbus::Result<f64>;
    async fn set_exposure(&self, ms: f64) -> zbus::Result<()>;
    async fn image_info(&self) -> zbus::Result<(u32, u32, u32, u32, u64)>;
    async fn image_buffer(&self) -> zbus::Result<Vec<u8>>;
    async fn get_roi(&self) -> zbus::Result<(u32, u32, u32, u32)>;
    async fn set_roi(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> zbus::Result<(u32, u32, u32, u32)>;
    async fn clear_roi(&self) -> zbus::Result<(u32, u32, u32, u32)>;
    async fn start_acquisition(&self) -> zbus::Result<()>;
    async fn stop_acquisition(&self) -> zbus::Result<()>;
    async fn snap(&self) -> zbus::Result<u64>;
    async fn redetect(&self) -> zbus::Result<String>;
    async fn pending_frames(&self) -> zbus::Result<u32>;
    async fn next_frame(&self) -> zbus::Result<(String, Vec<u8>)>;
}

fn print_roi((x, y, w, h): (u32, u32, u32, u32)) {
    println!("{w}x{h}+{x}+{y}");
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = zbus::Connection::session().await?;
    let camera = CameraProxy::new(&conn).await?;

    match cli.command {
        Commands::Status => print_json(&camera.status().await?)?,
        Commands::List => {
            let entries: Vec<serde_json::Value> =
                serde_json::from_str(&camera.list_properties().await?)?;
            for entry in entries {
                let flag = if entry["read_only"] == true { " (ro)" } else { "" };
                println!("{}{flag} = {}", entry["name"].as_str().unwrap_or("?"), entry["value"]);
            }
        }
        Commands::Get { name } => println!("{}", camera.get_property(&name).await?),
        Commands::Set {
            name,
            value,
            strict: true,
        } => {
            camera.set_property_strict(&name, &value).await?;
            println!("{name} = {value}");
        }
        Commands::Set { name, value, .. } => {
            if camera.set_property(&name, &value).await? {
                println!("{name} = {value}");
            } else {
                println!("{name}: not supported by the active camera");
            }
        }
        Commands::Exposure => println!("{} ms", camera.get_exposure().await?),
        Commands::SetExposure { ms } => {
            camera.set_exposure(ms).await?;
            println!("exposure = {ms} ms");
        }
        Commands::Image => {
            let (width, height, bytes_per_pixel, bit_depth, size) = camera.image_info().await?;
            println!("{width}x{height}, {bytes_per_pixel} byte(s)/pixel, {bit_depth}-bit, {size} bytes");
        }
        Commands::Roi => print_roi(camera.get_roi().await?),
        Commands::SetRoi {
            x,
            y,
            width,
            height,
        } => print_roi(camera.set_roi(x, y, width, height).await?),
        Commands::ClearRoi => print_roi(camera.clear_roi().await?),
        Commands::Start => {
            camera.start_acquisition().await?;
            println!("acquisition started");
        }
        Commands::Stop => {
            camera.stop_acquisition().await?;
            println!("acquisition stopped");
        }
        Commands::Snap { output } => {
            println!("snapped {} bytes", camera.snap().await?);
            if let Some(path) = output {
                std::fs::write(&path, camera.image_buffer().await?)?;
                println!("wrote {}", path.display());
            }
        }
        Commands::Redetect => println!("active camera: {}", camera.redetect().await?),
        Commands::Pending => println!("{}", camera.pending_frames().await?),
        Commands::Frame { output } => {
            let (meta, data) = camera.next_frame().await?;
            print_json(&meta)?;
            if let Some(path) = output {
                std::fs::write(&path, &data)?;
                println!("wrote {} bytes to {}", data.len(), path.display());
            }
        }
    }

    Ok(())
}
