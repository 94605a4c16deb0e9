//! Shutdown Coordination
//!
//! A flag shared by the signal handler and every running scan. Scans check
//! it between units of work and wind down through their normal cleanup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this flag to stop
    pub fn trigger(&self) {
        // Release pairs with the Acquire in is_requested
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
