use flicam_hw::SdkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("invalid value {value:?} for {name}")]
    InvalidParameterValue { name: String, value: String },
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("parameter {0} is read-only")]
    ReadOnly(String),
    #[error("{0} is not supported by the active camera")]
    UnsupportedOnVariant(String),
    #[error("hardware reported unexpected value {raw} for {name}")]
    UnexpectedHardwareValue { name: &'static str, raw: u32 },
    #[error("SDK: {0}")]
    Sdk(#[from] SdkError),
}

impl ControlError {
    pub(crate) fn invalid(name: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self::InvalidParameterValue {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// Result of a handler invoked on the active variant.
///
/// `Unsupported` means the parameter exists but the active variant has no
/// hardware behind it. The call did nothing and is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Applied(T),
    Unsupported,
}

impl<T> Outcome<T> {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(v) => Some(v),
            Self::Unsupported => None,
        }
    }

    /// Turn `Unsupported` into a hard error for callers that must know.
    pub fn into_strict(self, param: &str) -> Result<T, ControlError> {
        match self {
            Self::Applied(v) => Ok(v),
            Self::Unsupported => Err(ControlError::UnsupportedOnVariant(param.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_strict() {
        assert_eq!(Outcome::Applied(3).into_strict("FPS").unwrap(), 3);
        let err = Outcome::<()>::Unsupported.into_strict("Gain").unwrap_err();
        assert!(matches!(err, ControlError::UnsupportedOnVariant(p) if p == "Gain"));
    }
}
