//! End-of-run summary table

use crate::scanner::types::ScanStep;
use prettytable::{format, Cell, Row, Table};

/// One released step for one source
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub source_id: String,
    pub scanner: &'static str,
    pub step: ScanStep,
}

/// Collected results of a run
#[derive(Debug, Default)]
pub struct RunSummary {
    rows: Vec<SummaryRow>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source_id: &str, scanner: &'static str, step: ScanStep) {
        self.rows.push(SummaryRow {
            source_id: source_id.to_string(),
            scanner,
            step,
        });
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn all_good(&self) -> bool {
        self.rows.iter().all(|row| row.step.good)
    }

    pub fn failures(&self) -> usize {
        self.rows.iter().filter(|row| !row.step.good).count()
    }

    pub fn to_table(&self, color: bool) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(Row::new(
            ["Source", "Scanner", "Status", "Good", "Detail"]
                .iter()
                .map(|title| Cell::new(title).style_spec("b"))
                .collect(),
        ));

        for row in &self.rows {
            let mut good = Cell::new(if row.step.good { "yes" } else { "no" });
            if color {
                good = good.style_spec(if row.step.good { "Fg" } else { "Fr" });
            }
            table.add_row(Row::new(vec![
                Cell::new(&row.source_id),
                Cell::new(row.scanner),
                Cell::new(&row.step.status),
                good,
                Cell::new(row.step.exception.as_deref().unwrap_or("")),
            ]));
        }
        table
    }

    /// Print the table to stdout, or a single line when nothing ran
    pub fn print(&self, color: bool) {
        if self.rows.is_empty() {
            println!("No scanner accepted any configured source");
            return;
        }
        self.to_table(color).printstd();
    }
}
