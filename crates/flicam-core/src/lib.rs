//! flicam-core — camera control logic independent of any transport.
//!
//! ROI geometry translation, the per-variant camera models and the named
//! parameter registry exposed to the host.

pub mod control;
pub mod error;
pub mod model;
pub mod param;
pub mod roi;

pub use control::ControlSurface;
pub use error::{ControlError, Outcome};
pub use model::{model_for, CameraModel};
pub use param::{ParamId, ParamKind, ParamValue, ParameterSpec};
pub use roi::{to_hardware_region, RegionOfInterest, SensorBounds};
