use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, TenkError};

/// Cooperative cancellation flag for bulk indexing and pipeline runs.
/// Cancellation stops new external calls promptly; already-written index
/// state is left intact and recoverable via `delete_by_doc_id`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Errors out with `TenkError::Cancelled` once the token is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TenkError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_trips_once_cancelled() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        let clone = token.clone();
        clone.cancel();
        assert!(matches!(token.check(), Err(TenkError::Cancelled)));
    }
}
