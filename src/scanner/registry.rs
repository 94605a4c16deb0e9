//! Scanner trait and registration
//!
//! Built-in scanners register a factory with `register_scanner!`; the
//! registry instantiates them with the shared collaborators.

use crate::scanner::ci::api::CiConnector;
use crate::scanner::context::ScanContext;
use crate::scanner::evolution::measure::Measurer;
use crate::scanner::evolution::vcs::VersionControl;
use crate::scanner::types::{ScanStep, SourceDescriptor};
use async_trait::async_trait;
use std::sync::Arc;

/// A scanner for one kind of external source
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Name of the step this scanner reports under
    fn step_name(&self) -> &'static str;

    fn accepts(&self, source: &SourceDescriptor) -> bool;

    /// Run one scan pass; every outcome is returned as the released step
    async fn scan(&self, ctx: &ScanContext, source: &SourceDescriptor) -> ScanStep;
}

/// External collaborators the built-in scanners are built from
#[derive(Clone)]
pub struct Collaborators {
    pub vcs: Arc<dyn VersionControl>,
    pub measurer: Arc<dyn Measurer>,
    pub ci: Arc<dyn CiConnector>,
}

/// Entry for a built-in scanner in the inventory
pub struct ScannerEntry {
    pub factory: fn(&Collaborators) -> Box<dyn Scanner>,
}

inventory::collect!(ScannerEntry);

/// Register a built-in scanner factory
#[macro_export]
macro_rules! register_scanner {
    ($factory_expr:expr) => {
        inventory::submit!($crate::scanner::registry::ScannerEntry {
            factory: $factory_expr
        });
    };
}

/// The scanners available to the host
pub struct ScannerRegistry {
    scanners: Vec<Box<dyn Scanner>>,
}

impl ScannerRegistry {
    /// Instantiate every registered built-in scanner, ordered by name
    pub fn builtin(collaborators: &Collaborators) -> Self {
        let mut scanners: Vec<Box<dyn Scanner>> = inventory::iter::<ScannerEntry>()
            .map(|entry| (entry.factory)(collaborators))
            .collect();
        scanners.sort_by_key(|scanner| scanner.name());
        Self { scanners }
    }

    pub fn with_scanners(scanners: Vec<Box<dyn Scanner>>) -> Self {
        Self { scanners }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.scanners.iter().map(|scanner| scanner.name()).collect()
    }

    pub fn accepting<'a>(
        &'a self,
        source: &'a SourceDescriptor,
    ) -> impl Iterator<Item = &'a dyn Scanner> + 'a {
        self.scanners
            .iter()
            .map(|scanner| -> &'a dyn Scanner { scanner.as_ref() })
            .filter(move |scanner| scanner.accepts(source))
    }

    /// Run every accepting scanner for one source, one after the other
    pub async fn scan_source(
        &self,
        ctx: &ScanContext,
        source: &SourceDescriptor,
    ) -> Vec<(&'static str, ScanStep)> {
        let mut results = Vec::new();
        for scanner in self.accepting(source) {
            log::info!(
                "[{}] Running {} scanner, step '{}'",
                source.source_id,
                scanner.name(),
                scanner.step_name()
            );
            let step = scanner.scan(ctx, source).await;
            results.push((scanner.name(), step));
        }
        if results.is_empty() {
            log::debug!("[{}] No scanner accepts {} sources", source.source_id, source.kind);
        }
        results
    }
}
