//! Background scheduler: runs collection on a fixed interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::collector::CollectorService;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Run a collection immediately on start.
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            run_on_start: true,
        }
    }
}

/// Scheduler status for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_minutes: u64,
    pub collecting: bool,
}

/// Invokes `collect_all` on a fixed interval.
///
/// Runs execute inline in the scheduler task, so a tick that fires while a
/// run is still executing is simply dropped; the cadence stays anchored to
/// the original schedule rather than the finish time. `stop` never cancels
/// an in-flight run; it prevents future ticks and waits for the task.
pub struct Scheduler {
    config: SchedulerConfig,
    shutdown: watch::Sender<bool>,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
    collecting: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            shutdown,
            handle: parking_lot::Mutex::new(None),
            collecting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the background task. Calling `start` twice is a no-op.
    pub fn start(&self, collector: Arc<CollectorService>) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            warn!("Scheduler already started");
            return;
        }

        let config = self.config.clone();
        let mut shutdown = self.shutdown.subscribe();
        let collecting = self.collecting.clone();

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // interval fires immediately; consume the first tick unless an
            // immediate run was requested.
            if !config.run_on_start {
                ticker.tick().await;
            }

            info!(
                "Scheduler started: fetch every {} minutes",
                config.interval.as_secs() / 60
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        collecting.store(true, Ordering::SeqCst);
                        match collector.collect_all().await {
                            Ok(summary) => {
                                info!(
                                    "Scheduled fetch complete: {} new articles ({} processed) in {}ms",
                                    summary.total_new,
                                    summary.total_processed,
                                    summary.duration_ms,
                                );
                                for source in &summary.sources {
                                    for err in &source.errors {
                                        warn!("  {}: {err}", source.source_name);
                                    }
                                }
                            }
                            Err(e) => {
                                // Run failures never propagate out of the
                                // scheduler; the next tick tries again.
                                error!("Scheduled fetch failed: {e}");
                            }
                        }
                        collecting.store(false, Ordering::SeqCst);
                    }
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Scheduler stopped");
        }));
    }

    /// Stop the scheduler: no further ticks fire, and any in-flight run
    /// completes before this returns.
    pub async fn stop(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = self.shutdown.send(true);
            if let Err(e) = handle.await {
                warn!("Scheduler task join failed: {e}");
            }
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.handle.lock().is_some(),
            interval_minutes: self.config.interval.as_secs() / 60,
            collecting: self.collecting.load(Ordering::SeqCst),
        }
    }
}
