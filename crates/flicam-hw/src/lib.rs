//! flicam-hw — Hardware layer for First Light Imaging cameras.
//!
//! Wraps the vendor SDK behind the [`CameraSdk`] trait, embeds the per-variant
//! capability profiles, and enumerates and selects the active camera.

pub mod frame;
pub mod registry;
pub mod sdk;
pub mod session;
pub mod sim;
pub mod variant;

pub use frame::{ByteOrder, FrameBufferDescriptor, FrameMetadata};
pub use registry::{CameraHandle, RegistryError, VariantRegistry};
pub use sdk::{CameraSdk, Feature, FeatureValue, FrameCallback, ModelCode, SdkError};
pub use session::SdkSession;
pub use sim::SimulatedSdk;
pub use variant::{profile, Variant, VariantProfile};
