//! Cancellation tied to a screen lifetime.
//!
//! # Responsibility
//! - Let a screen teardown stop its in-flight catalog operation.
//!
//! # Invariants
//! - Cancellation is sticky: once cancelled, a token never resets.
//! - Operations check the token before every store round-trip; a request
//!   already issued is allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
