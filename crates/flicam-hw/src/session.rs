//! SDK session lifecycle.
//!
//! The vendor library keeps process-wide state, so exactly one session owns
//! it at a time: `open` runs the SDK init, `close` (or drop) runs the exit.

use crate::sdk::{CameraSdk, SdkError};
use std::sync::Arc;

pub struct SdkSession {
    sdk: Arc<dyn CameraSdk>,
    open: bool,
}

impl SdkSession {
    /// Initialize the SDK and take ownership of its global state.
    pub fn open(sdk: Arc<dyn CameraSdk>) -> Result<Self, SdkError> {
        sdk.init()?;
        tracing::info!("camera SDK initialized");
        Ok(Self { sdk, open: true })
    }

    pub fn sdk(&self) -> &Arc<dyn CameraSdk> {
        &self.sdk
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Release the SDK. Idempotent.
    pub fn close(&mut self) {
        if self.open {
            self.sdk.exit();
            self.open = false;
            tracing::info!("camera SDK released");
        }
    }
}

impl Drop for SdkSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCall, SimulatedSdk};

    #[test]
    fn test_close_is_idempotent() {
        let sim = Arc::new(SimulatedSdk::new());
        let mut session = SdkSession::open(sim.clone()).unwrap();
        assert!(session.is_open());
        session.close();
        session.close();
        drop(session);
        let exits = sim.calls().iter().filter(|c| **c == SimCall::Exit).count();
        assert_eq!(exits, 1);
    }
}
