//! Bounded Worker Pool
//!
//! Tasks are loaded into a bounded channel which is closed once enumeration
//! is done. A fixed number of workers take turns holding the receiver just
//! long enough to pop one task, then run the handler outside the lock so
//! network waits overlap. Failures are charged to one shared counter; the
//! worker that pushes it past the threshold releases the step as failed and
//! raises a cancellation flag that every worker checks before its next pop.
//! A requested shutdown stops the workers at the same point.

use crate::core::shutdown::ShutdownFlag;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::status::StatusReporter;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// Pool sizing and failure policy
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub poison_threshold: usize,
    pub task_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poison_threshold: 100,
            task_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// What a pool run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolOutcome {
    pub enumerated: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub poisoned: bool,
    /// Shutdown was requested while tasks were still queued
    pub interrupted: bool,
}

#[derive(Default)]
struct PoolState {
    dispatched: AtomicUsize,
    succeeded: AtomicUsize,
    failures: AtomicUsize,
    cancelled: AtomicBool,
    poison_reported: AtomicBool,
}

pub struct WorkerPool {
    config: PoolConfig,
    shutdown: ShutdownFlag,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            shutdown: ShutdownFlag::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Drain `tasks` with the configured number of workers
    ///
    /// Returns once every worker has been joined. When the poison budget is
    /// exceeded the optional reporter is released as failed exactly once.
    pub async fn run<T, H, Fut>(
        &self,
        tasks: Vec<T>,
        handler: H,
        reporter: Option<Arc<StatusReporter>>,
    ) -> PoolOutcome
    where
        T: Display + Send + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ScanResult<()>> + Send + 'static,
    {
        let enumerated = tasks.len();
        let (sender, receiver) = mpsc::channel(enumerated.max(1));
        for task in tasks {
            if sender.send(task).await.is_err() {
                break;
            }
        }
        drop(sender);

        let queue = Arc::new(Mutex::new(receiver));
        let state = Arc::new(PoolState::default());
        let handler = Arc::new(handler);
        let workers = self.config.workers.max(1);

        log::debug!("Draining {} tasks with {} workers", enumerated, workers);

        let mut joins = JoinSet::new();
        for worker_id in 0..workers {
            joins.spawn(worker_loop(
                worker_id,
                queue.clone(),
                state.clone(),
                handler.clone(),
                self.config.clone(),
                self.shutdown.clone(),
                reporter.clone(),
            ));
        }

        while let Some(joined) = joins.join_next().await {
            if let Err(err) = joined {
                log::error!("Worker stopped abnormally: {}", err);
                state.failures.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dispatched = state.dispatched.load(Ordering::SeqCst);
        PoolOutcome {
            enumerated,
            dispatched,
            succeeded: state.succeeded.load(Ordering::SeqCst),
            failed: state.failures.load(Ordering::SeqCst),
            poisoned: state.poison_reported.load(Ordering::SeqCst),
            interrupted: self.shutdown.is_requested() && dispatched < enumerated,
        }
    }
}

async fn worker_loop<T, H, Fut>(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<T>>>,
    state: Arc<PoolState>,
    handler: Arc<H>,
    config: PoolConfig,
    shutdown: ShutdownFlag,
    reporter: Option<Arc<StatusReporter>>,
) where
    T: Display + Send + 'static,
    H: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ScanResult<()>> + Send + 'static,
{
    loop {
        if state.cancelled.load(Ordering::SeqCst) {
            log::debug!("Worker {} stopping, scan cancelled", worker_id);
            break;
        }
        if shutdown.is_requested() {
            log::debug!("Worker {} stopping, shutdown requested", worker_id);
            break;
        }

        let next = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(task) = next else {
            break;
        };

        state.dispatched.fetch_add(1, Ordering::SeqCst);
        let label = task.to_string();

        let result = match config.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, handler(task)).await {
                Ok(result) => result,
                Err(_) => Err(ScanError::task(&label, format!("timed out after {:?}", limit))),
            },
            None => handler(task).await,
        };

        match result {
            Ok(()) => {
                state.succeeded.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                let failures = state.failures.fetch_add(1, Ordering::SeqCst) + 1;
                log::warn!("[{}] Task failed, trying another one: {}", label, err);

                if failures > config.poison_threshold {
                    state.cancelled.store(true, Ordering::SeqCst);
                    if !state.poison_reported.swap(true, Ordering::SeqCst) {
                        let poison = ScanError::PoisonBudgetExceeded {
                            failures,
                            threshold: config.poison_threshold,
                        };
                        log::error!("Too many errors, bailing: {}", poison);
                        if let Some(reporter) = &reporter {
                            log::debug!("Releasing step '{}' as failed", reporter.step_name());
                            reporter
                                .release(
                                    format!(
                                        "Too many errors while parsing at {}",
                                        reporter.timestamp()
                                    ),
                                    Some(poison.to_string()),
                                    false,
                                )
                                .await;
                        }
                    }
                    break;
                }
            }
        }
    }
}
