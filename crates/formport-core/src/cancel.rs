use crate::error::{ConvertError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the Ctrl-C handler and the
/// pipeline. Checked between steps and before every interactive prompt;
/// nothing is interrupted mid-write.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Error out at a safe interruption point.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ConvertError::Cancelled);
        }
        Ok(())
    }
}
