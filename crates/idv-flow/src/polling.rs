//! # Status Polling
//!
//! A [`PollingCoordinator`] runs at most one poll loop per session. Each
//! loop is a spawned tokio task that calls `get_status` on a fixed interval
//! until one of:
//!
//! - the server reports a terminal status (always wins),
//! - the phase's done predicate accepts the snapshot,
//! - the phase's wall-clock timeout elapses,
//! - the loop is cancelled (teardown, or a newer poll replacing it),
//! - a status check fails permanently, or transiently more times than the
//!   phase's transport retry budget allows.
//!
//! All timing goes through `tokio::time`, so tests drive it with a paused
//! clock.

use std::sync::Arc;

use idv_client::{
    retry_transient, ClientError, RemoteStatus, RemoteVerificationClient, RetryPolicy,
    StatusSnapshot,
};
use idv_core::VerificationId;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{PollPhase, PollPolicy};

/// Predicate deciding whether a snapshot completes the phase.
pub type DonePredicate = Box<dyn Fn(&StatusSnapshot) -> bool + Send + Sync>;

/// How a poll loop ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The done predicate accepted this snapshot.
    Satisfied(StatusSnapshot),
    /// The server declared a final decision.
    Terminal(StatusSnapshot),
    /// The phase timeout elapsed after `polls` status checks.
    TimedOut { polls: u32 },
    Cancelled,
    /// A status check failed and retries did not help.
    Failed(ClientError),
}

struct ActivePoll {
    id: u64,
    phase: PollPhase,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    active: Option<ActivePoll>,
}

impl Slot {
    fn stop(&mut self) {
        if let Some(poll) = self.active.take() {
            if !poll.task.is_finished() {
                tracing::debug!(phase = %poll.phase, poll_id = poll.id, "cancelling poll");
            }
            let _ = poll.cancel.send(true);
            poll.task.abort();
        }
    }
}

/// Awaitable result of a started poll.
#[derive(Debug)]
pub struct PollHandle {
    id: u64,
    phase: PollPhase,
    outcome: oneshot::Receiver<PollOutcome>,
}

impl PollHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Wait for the loop to finish. A loop that was aborted before it could
    /// report counts as cancelled.
    pub async fn outcome(self) -> PollOutcome {
        self.outcome.await.unwrap_or(PollOutcome::Cancelled)
    }
}

/// Stops the active poll from outside the controller.
#[derive(Clone)]
pub struct PollCanceller {
    slot: Arc<Mutex<Slot>>,
}

impl PollCanceller {
    pub fn cancel(&self) {
        self.slot.lock().stop();
    }
}

impl std::fmt::Debug for PollCanceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollCanceller").finish_non_exhaustive()
    }
}

/// Scheduler for status poll loops.
pub struct PollingCoordinator {
    client: Arc<dyn RemoteVerificationClient>,
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for PollingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingCoordinator")
            .field("active_phase", &self.active_phase())
            .finish_non_exhaustive()
    }
}

impl PollingCoordinator {
    pub fn new(client: Arc<dyn RemoteVerificationClient>) -> Self {
        Self {
            client,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Start polling for `phase`. Any poll already running is cancelled
    /// first. Must be called from within a tokio runtime.
    pub fn start(
        &self,
        verification_id: VerificationId,
        phase: PollPhase,
        policy: PollPolicy,
        done: DonePredicate,
    ) -> PollHandle {
        let mut slot = self.slot.lock();
        slot.stop();

        let id = slot.next_id;
        slot.next_id += 1;

        let (cancel, cancel_rx) = watch::channel(false);
        let (report, outcome) = oneshot::channel();
        let client = Arc::clone(&self.client);

        tracing::debug!(%verification_id, %phase, poll_id = id, "starting poll");
        let task = tokio::spawn(async move {
            let result = run_poll(client, verification_id, phase, policy, done, cancel_rx).await;
            let _ = report.send(result);
        });

        slot.active = Some(ActivePoll {
            id,
            phase,
            cancel,
            task,
        });
        PollHandle { id, phase, outcome }
    }

    /// Cancel the active poll, if any.
    pub fn stop(&self) {
        self.slot.lock().stop();
    }

    /// Whether a poll loop is still running.
    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .active
            .as_ref()
            .is_some_and(|p| !p.task.is_finished())
    }

    /// Phase of the running poll loop.
    pub fn active_phase(&self) -> Option<PollPhase> {
        self.slot
            .lock()
            .active
            .as_ref()
            .filter(|p| !p.task.is_finished())
            .map(|p| p.phase)
    }

    pub fn canceller(&self) -> PollCanceller {
        PollCanceller {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl Drop for PollingCoordinator {
    fn drop(&mut self) {
        self.slot.lock().stop();
    }
}

async fn run_poll(
    client: Arc<dyn RemoteVerificationClient>,
    verification_id: VerificationId,
    phase: PollPhase,
    policy: PollPolicy,
    done: DonePredicate,
    mut cancel: watch::Receiver<bool>,
) -> PollOutcome {
    let deadline = Instant::now() + policy.timeout();
    let retry = RetryPolicy::fixed(policy.max_transport_retries, policy.retry_delay());
    let mut ticker = tokio::time::interval(policy.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls = 0u32;

    let client = &*client;
    let id = &verification_id;

    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(%verification_id, %phase, polls, "poll timed out");
                return PollOutcome::TimedOut { polls };
            }
            _ = ticker.tick() => {}
        }

        polls += 1;
        let check = retry_transient(retry, phase.as_str(), move || client.get_status(id));
        let result = tokio::select! {
            biased;
            _ = cancel.changed() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(%verification_id, %phase, polls, "poll timed out during status check");
                return PollOutcome::TimedOut { polls };
            }
            result = check => result,
        };

        match result {
            Err(e) => {
                tracing::warn!(%verification_id, %phase, polls, "status check failed: {e}");
                return PollOutcome::Failed(e);
            }
            Ok(snapshot) if snapshot.status.is_terminal() => {
                tracing::info!(%verification_id, %phase, status = %snapshot.status, "terminal status observed");
                return PollOutcome::Terminal(snapshot);
            }
            Ok(snapshot) if done(&snapshot) => {
                tracing::debug!(%verification_id, %phase, polls, "poll phase satisfied");
                return PollOutcome::Satisfied(snapshot);
            }
            Ok(snapshot) => {
                if snapshot.status == RemoteStatus::Completed {
                    tracing::warn!(
                        %verification_id,
                        %phase,
                        "server reported legacy status 'completed'; not treated as a decision"
                    );
                }
                tracing::trace!(%verification_id, %phase, polls, status = %snapshot.status, "still waiting");
            }
        }
    }
}
