//! Evolution scanner tests
//!
//! Scripted version control and a counting measurer stand in for git and
//! cloc, so walks run without touching the filesystem.


use crate::core::shutdown::ShutdownFlag;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::evolution::measure::Measurer;
use crate::scanner::evolution::vcs::VersionControl;
use crate::scanner::types::{LanguageLines, Measurement, SourceIdentity};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(super) fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub(super) fn identity() -> SourceIdentity {
    SourceIdentity::new("apache", "src-evolution", "https://github.com/apache/thing.git")
}

/// Commits per branch, newest lookups answered from the script
pub(super) struct ScriptedVcs {
    pub origin: DateTime<Utc>,
    pub commits: Vec<(&'static str, DateTime<Utc>)>,
    pub current: Option<&'static str>,
    pub materialized: Mutex<Vec<String>>,
    pub restores: AtomicUsize,
}

impl ScriptedVcs {
    pub fn new(origin: DateTime<Utc>, commits: Vec<(&'static str, DateTime<Utc>)>) -> Self {
        Self {
            origin,
            commits,
            current: Some("master"),
            materialized: Mutex::new(Vec::new()),
            restores: AtomicUsize::new(0),
        }
    }

    pub fn materialized(&self) -> Vec<String> {
        self.materialized.lock().unwrap().clone()
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionControl for ScriptedVcs {
    async fn first_commit_time(&self, _repo: &Path) -> ScanResult<DateTime<Utc>> {
        Ok(self.origin)
    }

    async fn commit_before(
        &self,
        _repo: &Path,
        branch: &str,
        before: DateTime<Utc>,
    ) -> ScanResult<Option<String>> {
        if !self.commits.iter().any(|(name, _)| *name == branch) {
            return Err(ScanError::Io {
                message: format!("unknown revision {}", branch),
            });
        }
        Ok(self
            .commits
            .iter()
            .filter(|(name, at)| *name == branch && *at < before)
            .max_by_key(|(_, at)| *at)
            .map(|(name, at)| format!("{}@{}", name, at.timestamp())))
    }

    async fn materialize(&self, _repo: &Path, commit: &str) -> ScanResult<()> {
        self.materialized.lock().unwrap().push(commit.to_string());
        Ok(())
    }

    async fn restore(&self, _repo: &Path) -> ScanResult<()> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn current_branch(&self, _repo: &Path) -> ScanResult<Option<String>> {
        Ok(self.current.map(str::to_string))
    }
}

/// Returns a fixed measurement and counts calls; optionally fails on one
pub(super) struct CountingMeasurer {
    pub calls: AtomicUsize,
    pub fail_on_call: Option<usize>,
}

impl CountingMeasurer {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: Some(call),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Measurer for CountingMeasurer {
    async fn measure(&self, _tree: &Path) -> ScanResult<Measurement> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(ScanError::Io {
                message: "cloc crashed".into(),
            });
        }
        let mut measured = Measurement {
            code_lines: 1000,
            comment_lines: 100,
            blank_lines: 50,
            person_years: 0.2,
            estimated_cost: 14_000.0,
            ..Measurement::default()
        };
        measured.languages.insert(
            "Rust".into(),
            LanguageLines {
                code: 1000,
                comment: 100,
                blank: 50,
            },
        );
        Ok(measured)
    }
}

/// Requests shutdown while the first tree is being measured
pub(super) struct InterruptingMeasurer {
    pub inner: CountingMeasurer,
    pub shutdown: ShutdownFlag,
}

impl InterruptingMeasurer {
    pub fn new(shutdown: ShutdownFlag) -> Self {
        Self {
            inner: CountingMeasurer::new(),
            shutdown,
        }
    }
}

#[async_trait]
impl Measurer for InterruptingMeasurer {
    async fn measure(&self, tree: &Path) -> ScanResult<Measurement> {
        self.shutdown.trigger();
        self.inner.measure(tree).await
    }
}
