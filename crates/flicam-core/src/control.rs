//! Control surface: the registry of named parameters the host sees.
//!
//! The surface is rebuilt from the active model whenever cameras are
//! redetected. Selecting a different camera without redetection keeps the
//! old registry; parameters the new variant lacks then resolve to
//! [`Outcome::Unsupported`] instead of failing.

use crate::error::{ControlError, Outcome};
use crate::model::CameraModel;
use crate::param::{ParamId, ParamValue, ParameterSpec};
use flicam_hw::sdk::CameraSdk;
use flicam_hw::variant::Variant;

pub struct ControlSurface {
    built_for: Variant,
    specs: Vec<ParameterSpec>,
}

impl ControlSurface {
    /// Build the registry: `device_params` first, then the model's own.
    pub fn build(model: &dyn CameraModel, device_params: Vec<ParameterSpec>) -> Self {
        let mut specs = device_params;
        specs.extend(model.parameters());
        tracing::debug!(
            variant = ?model.variant(),
            count = specs.len(),
            "control surface built"
        );
        Self {
            built_for: model.variant(),
            specs,
        }
    }

    /// Variant whose parameters are registered.
    pub fn built_for(&self) -> Variant {
        self.built_for
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn spec(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, id: ParamId) -> bool {
        self.specs.iter().any(|s| s.id == id)
    }

    fn lookup(&self, name: &str) -> Result<&ParameterSpec, ControlError> {
        self.spec(name)
            .ok_or_else(|| ControlError::UnknownParameter(name.to_string()))
    }

    /// Read a registered parameter through the active model.
    pub fn get(
        &self,
        model: &dyn CameraModel,
        sdk: &dyn CameraSdk,
        name: &str,
    ) -> Result<Outcome<ParamValue>, ControlError> {
        let spec = self.lookup(name)?;
        if !model.supports(spec.id) {
            return Ok(Outcome::Unsupported);
        }
        model.read(sdk, spec.id)
    }

    /// Parse `raw` against the registered kind and write it through the
    /// active model.
    pub fn set(
        &self,
        model: &dyn CameraModel,
        sdk: &dyn CameraSdk,
        name: &str,
        raw: &str,
    ) -> Result<Outcome<()>, ControlError> {
        let spec = self.lookup(name)?;
        if spec.read_only {
            return Err(ControlError::ReadOnly(name.to_string()));
        }
        let value = spec.coerce(raw)?;
        if !model.supports(spec.id) {
            tracing::debug!(
                param = name,
                active = ?model.variant(),
                registered_for = ?self.built_for,
                "parameter not supported by active variant"
            );
            return Ok(Outcome::Unsupported);
        }
        let outcome = model.write(sdk, spec.id, &value)?;
        tracing::debug!(param = name, value = %value, "parameter written");
        Ok(outcome)
    }
}
