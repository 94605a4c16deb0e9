//! Command line arguments
//!
//! Every option here overrides the matching configuration file value.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "repoharvest")]
#[command(about = "Incremental scanner for repositories and CI services")]
#[command(version, long_version = crate::long_version())]
#[command(after_help = " * can be specified multiple times or as a comma-separated list")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Only scan these source ids*
    #[arg(short = 's', long = "source", value_name = "IDS", action = ArgAction::Append)]
    pub sources: Vec<String>,

    /// Concurrent workers per CI scan
    #[arg(short = 'w', long = "workers", value_name = "COUNT")]
    pub workers: Option<usize>,

    /// Task failures tolerated before a scan is abandoned
    #[arg(long = "poison-threshold", value_name = "COUNT")]
    pub poison_threshold: Option<usize>,

    /// Idempotency key scheme
    #[arg(long = "key-scheme", value_name = "SCHEME", value_parser = ["canonical", "legacy"])]
    pub key_scheme: Option<String>,

    /// Directory holding local clones (<dir>/<organisation>/git/<source>)
    #[arg(long = "scratch-dir", value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Directory of the JSON document store
    #[arg(long = "store", value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Force coloured output
    #[arg(short = 'g', long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color", conflicts_with = "color")]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,
}

impl Args {
    /// Source ids from all `--source` occurrences, comma lists split and deduplicated
    pub fn source_filter(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for id in self
            .sources
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
        ids
    }

    /// Colour choice: `Some` when forced either way, `None` for auto
    pub fn color_choice(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
