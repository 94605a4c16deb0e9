//! Core services and infrastructure

pub mod error_handling;
pub mod keys;
pub mod logging;
pub mod retry;
pub mod shutdown;
pub mod sync;
pub mod time;
