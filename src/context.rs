//! Cooperative cancellation, in the spirit of Go's `context.Context` but
//! scoped to the one signal this crate actually needs: "stop, and kill any
//! running subprocess."

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation handle shared between the caller driving an [`Iterator`]
/// and every task it hands off to [`Executor::exec`].
///
/// [`Iterator`]: crate::iterator::Iterator
/// [`Executor::exec`]: crate::task::Executor::exec
#[derive(Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    /// Returns a handle that can be used to cancel this context from
    /// another thread independently of the `Context` handed to tasks.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
