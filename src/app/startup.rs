//! Application startup
//!
//! Resolves configuration (file, then command line), starts logging, builds
//! the store and the built-in scanners, and scans every selected source.

use super::cli::args::Args;
use super::cli::config::Config;
use super::summary::RunSummary;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::time::SystemClock;
use crate::scanner::ci::travis::TravisConnector;
use crate::scanner::evolution::measure::ClocMeasurer;
use crate::scanner::evolution::vcs::GitCli;
use crate::scanner::{
    Collaborators, ScanContext, ScannerRegistry, SourceDescriptor, StoreStepSink,
};
use crate::store::{DocumentStore, JsonFileStore, MemoryStore};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// At least one scan was released as not good
pub const EXIT_SCAN_FAILED: i32 = 2;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Entry point for the binary; returns the process exit code
pub fn startup() -> i32 {
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return EXIT_FAILURE;
        }
    };

    runtime.block_on(run(args))
}

/// Run one harvest pass with parsed arguments
pub async fn run(args: Args) -> i32 {
    let (mut config, load_error) = match Config::load(args.config_file.as_deref()).await {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let override_error = config.apply_args(&args).err();

    let use_color = config
        .log
        .color
        .unwrap_or_else(|| std::io::stdout().is_terminal());
    colored::control::set_override(use_color);

    if let Err(e) = init_logging(
        config.log.level.as_deref(),
        config.log.format.as_deref(),
        config.log.file.as_deref(),
        use_color,
    ) {
        eprintln!("Failed to initialise logging: {}", e);
        return EXIT_FAILURE;
    }

    if let Some(e) = load_error.or(override_error) {
        log_error_with_context(&e, "Failed to load configuration");
        return EXIT_FAILURE;
    }
    if let Err(e) = config.validate() {
        log_error_with_context(&e, "Configuration is not valid");
        return EXIT_FAILURE;
    }
    let sources = match config.selected_sources(&args.source_filter()) {
        Ok(sources) => sources,
        Err(e) => {
            log_error_with_context(&e, "Failed to select sources");
            return EXIT_FAILURE;
        }
    };

    log::info!(
        "{} {} starting: {} source(s)",
        crate::PACKAGE_NAME,
        env!("CARGO_PKG_VERSION"),
        sources.len()
    );

    let store = build_store(&config);
    let ctx = ScanContext::new(
        store.clone(),
        Arc::new(StoreStepSink::new(store)),
        Arc::new(SystemClock),
        config.settings(),
    );
    let registry = ScannerRegistry::builtin(&collaborators(&config));
    log::debug!("Scanners: {}", registry.names().join(", "));

    let (summary, interrupted) = scan_until_interrupted(&registry, &ctx, &sources).await;

    summary.print(use_color);
    if interrupted {
        EXIT_INTERRUPTED
    } else if summary.all_good() {
        EXIT_OK
    } else {
        log::warn!("{} scan(s) did not complete cleanly", summary.failures());
        EXIT_SCAN_FAILED
    }
}

/// Scan every source concurrently, each through all accepting scanners
pub async fn scan_all(
    registry: &ScannerRegistry,
    ctx: &ScanContext,
    sources: &[SourceDescriptor],
) -> RunSummary {
    let results = futures::future::join_all(
        sources
            .iter()
            .map(|source| async move { (source, registry.scan_source(ctx, source).await) }),
    )
    .await;

    let mut summary = RunSummary::new();
    for (source, steps) in results {
        for (scanner, step) in steps {
            summary.push(&source.source_id, scanner, step);
        }
    }
    summary
}

/// Scan until done or until Ctrl-C
///
/// An interrupt raises the context's shutdown flag and then waits for the
/// running scans to stop at their next checkpoint, so working trees are
/// restored and steps released before the process exits.
async fn scan_until_interrupted(
    registry: &ScannerRegistry,
    ctx: &ScanContext,
    sources: &[SourceDescriptor],
) -> (RunSummary, bool) {
    let scans = scan_all(registry, ctx, sources);
    tokio::pin!(scans);

    tokio::select! {
        summary = &mut scans => (summary, false),
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, waiting for running scans to stop");
            ctx.shutdown.trigger();
            (scans.await, true)
        }
    }
}

fn build_store(config: &Config) -> Arc<dyn DocumentStore> {
    match &config.store.path {
        Some(path) => {
            let store = JsonFileStore::new(path);
            log::debug!("Using document store at {}", store.root().display());
            Arc::new(store)
        }
        None => {
            log::warn!("No store path configured, results are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    }
}

fn collaborators(config: &Config) -> Collaborators {
    Collaborators {
        vcs: Arc::new(GitCli::default()),
        measurer: Arc::new(ClocMeasurer::new(
            &config.measure.command,
            config.measure.cost_per_year,
        )),
        ci: Arc::new(TravisConnector::new(Duration::from_secs(
            config.scanner.request_timeout_secs.max(1),
        ))),
    }
}
