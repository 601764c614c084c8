//! Background commit worker.
//!
//! Plans are queued on an unbounded channel so the UI thread never waits on
//! storage. The worker writes one batch at a time, always the newest queued
//! plan. A transiently failed batch is retried as a whole; the last failed plan
//! is kept around for a manual retry.

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use tokio::{
    runtime::Handle,
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    events::PersistenceEvent,
    persistence::{CommitPlan, CommitSink, RecordStore},
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per plan, including the first one.
    pub max_attempts: u32,
    #[serde(rename = "delay_ms", with = "millis")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(250),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

enum WorkerCommand {
    Commit(CommitPlan),
    Retry,
    Shutdown,
}

/// Cheap, cloneable handle to a running commit worker.
#[derive(Clone)]
pub struct CommitHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    events: broadcast::Sender<PersistenceEvent>,
}

impl CommitHandle {
    /// Spawns the worker on `runtime`.
    pub fn spawn<S>(store: Arc<S>, policy: RetryPolicy, runtime: &Handle) -> (Self, JoinHandle<()>)
    where
        S: RecordStore + 'static,
    {
        let (commands, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let task = runtime.spawn(run_worker(store, policy, rx, events.clone()));
        (Self { commands, events }, task)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PersistenceEvent> {
        self.events.subscribe()
    }

    /// Replays the last failed plan unchanged. No-op if nothing failed.
    pub fn retry(&self) {
        if self.commands.send(WorkerCommand::Retry).is_err() {
            warn!("commit worker is gone; retry dropped");
        }
    }

    /// Stops the worker after any plan already being written.
    pub fn shutdown(&self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
    }
}

impl CommitSink for CommitHandle {
    fn submit(&self, plan: CommitPlan) {
        let generation = plan.generation();
        if self.commands.send(WorkerCommand::Commit(plan)).is_err() {
            error!(generation, "commit worker is gone; plan dropped");
        }
    }
}

async fn run_worker<S>(
    store: Arc<S>,
    policy: RetryPolicy,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    events: broadcast::Sender<PersistenceEvent>,
) where
    S: RecordStore + 'static,
{
    let mut failed: Option<CommitPlan> = None;
    let mut stopping = false;

    while !stopping {
        let Some(command) = commands.recv().await else {
            break;
        };
        let plan = match command {
            WorkerCommand::Commit(plan) => {
                let mut newest = plan;
                while let Ok(queued) = commands.try_recv() {
                    match queued {
                        WorkerCommand::Commit(plan) => {
                            debug!(
                                superseded = newest.generation(),
                                generation = plan.generation(),
                                "coalescing queued commit"
                            );
                            newest = plan;
                        }
                        WorkerCommand::Retry => {}
                        WorkerCommand::Shutdown => stopping = true,
                    }
                }
                newest
            }
            WorkerCommand::Retry => match failed.take() {
                Some(plan) => {
                    info!(generation = plan.generation(), "replaying failed commit");
                    plan
                }
                None => continue,
            },
            WorkerCommand::Shutdown => break,
        };

        let generation = plan.generation();
        match write_with_retry(store.as_ref(), &plan, policy, &events).await {
            Ok(()) => {
                failed = None;
                info!(generation, "order committed");
                let _ = events.send(PersistenceEvent::Committed { generation });
            }
            Err(err) => {
                error!(generation, error = %err, "commit failed after retries");
                let _ = events.send(PersistenceEvent::CommitFailed {
                    generation,
                    error: err,
                });
                failed = Some(plan);
            }
        }
    }
    debug!("commit worker stopped");
}

async fn write_with_retry<S>(
    store: &S,
    plan: &CommitPlan,
    policy: RetryPolicy,
    events: &broadcast::Sender<PersistenceEvent>,
) -> Result<(), shared::error::StoreError>
where
    S: RecordStore + ?Sized,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match store.batch_update_order_keys(plan.assignments()).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transient() && attempt < attempts => {
                warn!(
                    generation = plan.generation(),
                    attempt,
                    error = %err,
                    "commit attempt failed; retrying"
                );
                let _ = events.send(PersistenceEvent::Retrying {
                    generation: plan.generation(),
                    attempt,
                    error: err,
                });
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[path = "tests/worker_tests.rs"]
mod tests;
