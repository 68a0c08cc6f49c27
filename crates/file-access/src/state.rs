//! Consumer-owned stream state and cooperative stop flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Stream fields shared between the access core and its consumer.
///
/// The consumer creates this before open and keeps it after close. The core
/// only touches it while holding the mutex of a [`SharedStream`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamState {
    /// Random access supported; written once at open.
    pub seekable: bool,
    /// Caller controls read timing; written once at open.
    pub pace_controlled: bool,
    /// Known size in bytes, 0 when unknown.
    pub total_size: u64,
    /// Logical read offset.
    pub position: u64,
    /// Raised when a size re-check saw a different size. Cleared by the consumer.
    pub size_changed: bool,
}

/// Mutex-guarded stream state.
pub type SharedStream = Arc<Mutex<StreamState>>;

impl StreamState {
    /// Create a shared, mutex-protected stream state.
    pub fn shared() -> SharedStream {
        Arc::new(Mutex::new(Self::default()))
    }
}

/// Take the stream guard, recovering the data if a holder panicked.
pub(crate) fn lock(stream: &SharedStream) -> MutexGuard<'_, StreamState> {
    stream.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stop flags owned by the host and polled by the read loop.
#[derive(Clone, Debug, Default)]
pub struct InputFlags {
    cancel: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
}

impl InputFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the reader to stop at its next check.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Record an upstream fatal error.
    pub fn fail(&self) {
        self.failed.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// True once either flag is raised.
    pub fn should_stop(&self) -> bool {
        self.is_canceled() || self.has_failed()
    }

    /// Handle to the cancel flag, e.g. for a signal handler.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }
}
