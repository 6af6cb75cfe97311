use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// A request to break out of evaluation, deliverable from another thread or
/// a signal handler.
///
/// The evaluator polls at every reduction step. The collector disables
/// delivery while it runs, so a break is never observed mid-collection; a
/// break raised during collection stays pending until the next poll after it.
#[derive(Clone, Debug)]
pub struct Interrupt(Arc<State>);

#[derive(Debug)]
struct State {
    pending: AtomicBool,
    enabled: AtomicBool,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        Interrupt(Arc::new(State {
            pending: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
        }))
    }

    /// Requests a break.
    pub fn raise(&self) {
        self.0.pending.store(true, Ordering::SeqCst);
    }

    pub(crate) fn disable(&self) {
        self.0.enabled.store(false, Ordering::SeqCst);
    }

    pub(crate) fn enable(&self) {
        self.0.enabled.store(true, Ordering::SeqCst);
    }

    /// Fails with [`Error::Break`] if a break is pending and delivery is enabled.
    pub fn poll(&self) -> Result<()> {
        if self.0.enabled.load(Ordering::SeqCst) && self.0.pending.swap(false, Ordering::SeqCst) {
            Err(Error::Break)
        } else {
            Ok(())
        }
    }

    /// Drops any pending break.
    pub fn clear(&self) {
        self.0.pending.store(false, Ordering::SeqCst);
    }
}
