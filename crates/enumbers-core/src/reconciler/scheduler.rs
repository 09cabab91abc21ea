// # Reconcile Scheduler
//
// Runs `Reconciler::reconcile()` on a fixed interval in a background task.
//
// ## Lifecycle
//
// 1. Create with `ReconcileScheduler::new()` (or `with_interval()`)
// 2. Start with `spawn()`, keep the returned `SchedulerHandle`
// 3. Stop with `SchedulerHandle::shutdown()`, which waits for the task
//
// A reconciliation that has started always runs to completion; shutdown is
// only observed between runs. Dropping the handle without calling
// `shutdown()` also stops the task at the next opportunity.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use super::{ReconcileReport, Reconciler};
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Scheduler task started
    Started {
        interval: Duration,
    },

    /// A scheduled reconciliation finished
    RunCompleted {
        report: ReconcileReport,
    },

    /// A scheduled reconciliation failed (persistence error)
    RunFailed {
        error: String,
    },

    /// Scheduler task stopped
    Stopped {
        reason: String,
    },
}

/// Background task that reconciles on a fixed interval
pub struct ReconcileScheduler {
    reconciler: Arc<Reconciler>,

    /// Time between runs
    interval: Duration,

    /// Fire the first run immediately instead of after one interval
    run_on_start: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl ReconcileScheduler {
    /// Create a scheduler from configuration
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields
    /// scheduler events
    pub fn new(
        reconciler: Arc<Reconciler>,
        config: &SchedulerConfig,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        config.validate()?;
        Ok(Self::with_interval(
            reconciler,
            Duration::from_secs(config.interval_secs),
            config.run_on_start,
            config.event_channel_capacity,
        ))
    }

    /// Create a scheduler with an explicit interval
    pub fn with_interval(
        reconciler: Arc<Reconciler>,
        interval: Duration,
        run_on_start: bool,
        event_channel_capacity: usize,
    ) -> (Self, mpsc::Receiver<SchedulerEvent>) {
        let (tx, rx) = mpsc::channel(event_channel_capacity.max(1));
        let scheduler = Self {
            reconciler,
            interval,
            run_on_start,
            event_tx: tx,
        };
        (scheduler, rx)
    }

    /// Start the scheduler on the current tokio runtime
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(async move { self.run_with_shutdown(shutdown_rx).await });
        SchedulerHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    /// Run until `shutdown_rx` fires or its sender is dropped
    pub async fn run_with_shutdown(&self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        info!("Starting reconcile scheduler (interval={:?})", self.interval);
        self.emit_event(SchedulerEvent::Started {
            interval: self.interval,
        });

        let first = if self.run_on_start {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut interval = tokio::time::interval_at(first, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => {
                    info!("Scheduler shutdown signal received");
                    self.emit_event(SchedulerEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                Some(_) = ticks.next() => {
                    self.run_once().await;
                }
            }
        }

        Ok(())
    }

    async fn run_once(&self) {
        debug!("Scheduled reconciliation starting");
        match self.reconciler.reconcile().await {
            Ok(report) => {
                self.emit_event(SchedulerEvent::RunCompleted { report });
            }
            Err(e) => {
                // Keep the schedule alive; the next tick tries again
                error!("Scheduled reconciliation failed: {}", e);
                self.emit_event(SchedulerEvent::RunFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit_event(&self, event: SchedulerEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Scheduler event channel full or closed, dropping event");
        }
    }
}

/// Handle to a running scheduler task
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl SchedulerHandle {
    /// Signal the task to stop and wait for it
    ///
    /// If a reconciliation is in progress, this waits for it to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Receiver gone means the task already exited
            let _ = tx.send(());
        }
        self.task
            .await
            .map_err(|e| Error::Other(format!("Scheduler task panicked: {}", e)))?
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
