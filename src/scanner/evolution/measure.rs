//! Measurement collaborator
//!
//! Line counting is delegated to `cloc`. Effort and cost come from the basic
//! organic COCOMO model over the code line total.

use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::types::{LanguageLines, Measurement};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::process::Command;

#[async_trait]
pub trait Measurer: Send + Sync {
    async fn measure(&self, tree: &Path) -> ScanResult<Measurement>;
}

/// Runs `cloc --json` over a working tree
#[derive(Debug, Clone)]
pub struct ClocMeasurer {
    program: String,
    cost_per_year: f64,
}

impl Default for ClocMeasurer {
    fn default() -> Self {
        Self::new("cloc", 70_000.0)
    }
}

impl ClocMeasurer {
    pub fn new(program: impl Into<String>, cost_per_year: f64) -> Self {
        Self {
            program: program.into(),
            cost_per_year,
        }
    }
}

#[async_trait]
impl Measurer for ClocMeasurer {
    async fn measure(&self, tree: &Path) -> ScanResult<Measurement> {
        let output = Command::new(&self.program)
            .arg("--json")
            .arg("--quiet")
            .arg("--exclude-dir=.git")
            .arg(tree)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ScanError::Io {
                message: format!("Could not run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(ScanError::Io {
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        parse_cloc_report(&String::from_utf8_lossy(&output.stdout), self.cost_per_year)
    }
}

/// Fold a `cloc --json` report into a measurement
///
/// An empty report (no recognised files) is an empty measurement.
pub fn parse_cloc_report(report: &str, cost_per_year: f64) -> ScanResult<Measurement> {
    if report.trim().is_empty() {
        return Ok(Measurement::default());
    }

    let parsed: Value = serde_json::from_str(report).map_err(|e| ScanError::Io {
        message: format!("Unreadable cloc report: {}", e),
    })?;
    let entries = parsed.as_object().ok_or_else(|| ScanError::Io {
        message: "cloc report is not a JSON object".to_string(),
    })?;

    let mut languages = BTreeMap::new();
    for (language, counts) in entries {
        if language == "header" || language == "SUM" {
            continue;
        }
        let lines: LanguageLines = serde_json::from_value(counts.clone()).map_err(|e| {
            ScanError::Io {
                message: format!("Bad cloc entry for {}: {}", language, e),
            }
        })?;
        languages.insert(language.clone(), lines);
    }

    let code_lines = languages.values().map(|lines| lines.code).sum();
    let comment_lines = languages.values().map(|lines| lines.comment).sum();
    let blank_lines = languages.values().map(|lines| lines.blank).sum();
    let person_years = cocomo_person_years(code_lines);

    Ok(Measurement {
        languages,
        code_lines,
        comment_lines,
        blank_lines,
        person_years,
        estimated_cost: person_years * cost_per_year,
    })
}

/// Basic organic COCOMO: 2.4 * KLOC^1.05 person-months
pub fn cocomo_person_years(code_lines: u64) -> f64 {
    if code_lines == 0 {
        return 0.0;
    }
    let kloc = code_lines as f64 / 1000.0;
    2.4 * kloc.powf(1.05) / 12.0
}
