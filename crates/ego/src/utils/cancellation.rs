use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag used to request a cooperative cancellation.
///
/// Clones share the same flag. Selection checks it between multistarts
/// and between batch points, never inside inner loops.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token not cancelled yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
