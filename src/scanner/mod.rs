//! Scanners
//!
//! Incremental scanners for external sources. Each scanner derives a stable
//! key for every unit of work, skips work already recorded, and reports its
//! outcome through one named step.
//!
//! ## Components
//!
//! - **Evolution**: quarterly line-count checkpoints of a local clone
//! - **CI**: build records and queue snapshots of a remote CI service
//! - **WorkerPool**: bounded concurrent task draining with a poison budget
//! - **StatusReporter**: acquire/progress/release of the host step
//! - **ScannerRegistry**: built-in scanners registered through `inventory`

pub mod ci;
pub mod context;
pub mod error;
pub mod evolution;
pub mod pool;
pub mod registry;
pub mod status;
pub mod types;

pub use context::{ScanContext, ScanSettings};
pub use error::{ErrorKind, ScanError, ScanResult};
pub use pool::{PoolConfig, PoolOutcome, WorkerPool};
pub use registry::{Collaborators, Scanner, ScannerRegistry};
pub use status::{MemoryStepSink, StatusReporter, StepSink, StoreStepSink};
pub use types::{
    BuildRecord, BuildStatus, Checkpoint, Credential, LanguageLines, Measurement, QueueSnapshot,
    ScanStep, SourceDescriptor, SourceIdentity, SourceKind, Tally,
};
