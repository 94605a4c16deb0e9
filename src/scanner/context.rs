//! Shared scan context

use crate::core::keys::KeyScheme;
use crate::core::retry::RetryPolicy;
use crate::core::shutdown::ShutdownFlag;
use crate::core::time::Clock;
use crate::scanner::pool::PoolConfig;
use crate::scanner::status::{StatusReporter, StepSink};
use crate::store::DocumentStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Tunables shared by every scanner
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub scratch_dir: PathBuf,
    pub workers: usize,
    pub poison_threshold: usize,
    pub task_timeout: Option<Duration>,
    pub default_branch: String,
    pub key_scheme: KeyScheme,
    pub retry: RetryPolicy,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("repoharvest"),
            workers: 4,
            poison_threshold: 100,
            task_timeout: Some(Duration::from_secs(120)),
            default_branch: "master".to_string(),
            key_scheme: KeyScheme::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ScanSettings {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            poison_threshold: self.poison_threshold,
            task_timeout: self.task_timeout,
        }
    }
}

/// Everything a scanner needs from the host
#[derive(Clone)]
pub struct ScanContext {
    pub store: Arc<dyn DocumentStore>,
    pub steps: Arc<dyn StepSink>,
    pub clock: Arc<dyn Clock>,
    pub settings: ScanSettings,
    /// Raised on interrupt; scans stop between units of work
    pub shutdown: ShutdownFlag,
}

impl ScanContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        steps: Arc<dyn StepSink>,
        clock: Arc<dyn Clock>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            store,
            steps,
            clock,
            settings,
            shutdown: ShutdownFlag::new(),
        }
    }

    /// A reporter for one source's named step
    pub fn reporter(&self, source_id: &str, step_name: &str) -> StatusReporter {
        StatusReporter::new(self.steps.clone(), self.clock.clone(), source_id, step_name)
    }
}
