//! Step reporting
//!
//! A scan reports through exactly one named step: `acquire` marks it
//! running, `progress` updates the message, `release` finalises it. The
//! step is the only place failures become visible to the host, so a sink
//! that cannot persist a step logs and carries on.

use crate::core::sync::handle_mutex_poison;
use crate::core::time::{format_rfc2822_utc, Clock};
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::types::ScanStep;
use crate::store::{DocumentStore, SOURCE};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Narrow callback through which steps reach the host
#[async_trait]
pub trait StepSink: Send + Sync {
    async fn record(&self, source_id: &str, step_name: &str, step: &ScanStep) -> ScanResult<()>;
}

/// Keeps every reported step in memory, in order
#[derive(Debug, Default)]
pub struct MemoryStepSink {
    history: Mutex<HashMap<(String, String), Vec<ScanStep>>>,
}

impl MemoryStepSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All steps reported for one source and step name
    pub fn history(&self, source_id: &str, step_name: &str) -> Vec<ScanStep> {
        match self.history.lock() {
            Ok(history) => history
                .get(&(source_id.to_string(), step_name.to_string()))
                .cloned()
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// The most recent step for one source and step name
    pub fn latest(&self, source_id: &str, step_name: &str) -> Option<ScanStep> {
        self.history(source_id, step_name).pop()
    }
}

#[async_trait]
impl StepSink for MemoryStepSink {
    async fn record(&self, source_id: &str, step_name: &str, step: &ScanStep) -> ScanResult<()> {
        let mut history = handle_mutex_poison(self.history.lock(), |message| {
            ScanError::Internal { message }
        })?;
        history
            .entry((source_id.to_string(), step_name.to_string()))
            .or_default()
            .push(step.clone());
        Ok(())
    }
}

/// Writes steps into the host's source documents as `steps.<name>`
pub struct StoreStepSink {
    store: Arc<dyn DocumentStore>,
}

impl StoreStepSink {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StepSink for StoreStepSink {
    async fn record(&self, source_id: &str, step_name: &str, step: &ScanStep) -> ScanResult<()> {
        let mut document = self
            .store
            .get(SOURCE, source_id)
            .await?
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({ "id": source_id }));

        let step_value = serde_json::to_value(step)?;
        if let Some(fields) = document.as_object_mut() {
            let steps = fields.entry("steps").or_insert_with(|| json!({}));
            if !steps.is_object() {
                *steps = json!({});
            }
            if let Some(steps) = steps.as_object_mut() {
                steps.insert(step_name.to_string(), step_value);
            }
        }

        self.store.index(SOURCE, source_id, document).await?;
        Ok(())
    }
}

/// Reports one scanner's step for one source
pub struct StatusReporter {
    sink: Arc<dyn StepSink>,
    clock: Arc<dyn Clock>,
    source_id: String,
    step_name: String,
    last: Mutex<Option<ScanStep>>,
}

impl StatusReporter {
    pub fn new(
        sink: Arc<dyn StepSink>,
        clock: Arc<dyn Clock>,
        source_id: impl Into<String>,
        step_name: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            clock,
            source_id: source_id.into(),
            step_name: step_name.into(),
            last: Mutex::new(None),
        }
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    /// Current time formatted for status messages
    pub fn timestamp(&self) -> String {
        format_rfc2822_utc(self.clock.now())
    }

    /// Mark the step running
    pub async fn acquire(&self, status: impl Into<String>) -> ScanStep {
        self.report(status.into(), None, true, true).await
    }

    /// Update the message of a running step
    pub async fn progress(&self, status: impl Into<String>) -> ScanStep {
        self.report(status.into(), None, true, true).await
    }

    /// Finalise the step
    pub async fn release(
        &self,
        status: impl Into<String>,
        exception: Option<String>,
        good: bool,
    ) -> ScanStep {
        self.report(status.into(), exception, false, good).await
    }

    /// Whether the step has been finalised
    pub fn is_released(&self) -> bool {
        self.last_step().map(|step| !step.running).unwrap_or(false)
    }

    /// The most recently reported step
    pub fn last_step(&self) -> Option<ScanStep> {
        match handle_mutex_poison(self.last.lock(), |message| ScanError::Internal { message }) {
            Ok(last) => last.clone(),
            Err(err) => {
                log::warn!("{}", err);
                None
            }
        }
    }

    async fn report(
        &self,
        status: String,
        exception: Option<String>,
        running: bool,
        good: bool,
    ) -> ScanStep {
        let step = ScanStep {
            time: self.clock.epoch_seconds(),
            status,
            running,
            good,
            exception,
        };

        if let Err(err) = self.sink.record(&self.source_id, &self.step_name, &step).await {
            log::warn!(
                "[{}] Could not record '{}' step: {}",
                self.source_id,
                self.step_name,
                err
            );
        }

        match handle_mutex_poison(self.last.lock(), |message| ScanError::Internal { message }) {
            Ok(mut last) => *last = Some(step.clone()),
            Err(err) => log::warn!("{}", err),
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::FixedClock;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2021, 4, 10, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_lifecycle_running_then_released() {
        let sink = Arc::new(MemoryStepSink::new());
        let reporter = StatusReporter::new(sink.clone(), clock(), "src1", "travis");

        reporter.acquire("Parsing Travis job changes...").await;
        assert!(!reporter.is_released());
        reporter.progress("Downloading changeset").await;
        let released = reporter
            .release("Travis successfully scanned", None, true)
            .await;

        let history = sink.history("src1", "travis");
        assert_eq!(history.len(), 3);
        assert!(history[0].running && history[1].running);
        assert!(!released.running);
        assert!(released.good);
        assert!(reporter.is_released());
        assert_eq!(sink.latest("src1", "travis"), Some(released));
    }

    #[tokio::test]
    async fn test_release_carries_failure_detail() {
        let sink = Arc::new(MemoryStepSink::new());
        let reporter = StatusReporter::new(sink.clone(), clock(), "src1", "evolution");
        let step = reporter
            .release(
                format!("Evolution scan failed at {}", reporter.timestamp()),
                Some("no branch".into()),
                false,
            )
            .await;
        assert_eq!(step.status, "Evolution scan failed at Sat, 10 Apr 2021 12:00:00 +0000");
        assert_eq!(step.exception.as_deref(), Some("no branch"));
        assert_eq!(step.time, 1618056000);
    }

    #[tokio::test]
    async fn test_store_sink_keeps_other_steps() {
        let store = Arc::new(MemoryStore::new());
        store
            .index(SOURCE, "src1", json!({"id": "src1", "type": "git"}))
            .await
            .unwrap();
        let sink: Arc<dyn StepSink> = Arc::new(StoreStepSink::new(store.clone()));

        StatusReporter::new(sink.clone(), clock(), "src1", "evolution")
            .release("done", None, true)
            .await;
        StatusReporter::new(sink, clock(), "src1", "travis")
            .acquire("Parsing Travis job changes...")
            .await;

        let document = store.get(SOURCE, "src1").await.unwrap().unwrap();
        assert_eq!(document["type"], "git");
        assert_eq!(document["steps"]["evolution"]["running"], false);
        assert_eq!(document["steps"]["travis"]["running"], true);
        assert!(document["steps"]["evolution"].get("exception").is_none());
    }
}
