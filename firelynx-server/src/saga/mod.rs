//! Saga orchestration
//!
//! Drives one validated transaction through two-phase commit across all
//! participants: stage everything, then activate everything, with
//! reverse-order compensation when staging fails. The orchestrator is
//! the single serializing actor; at no point can an external observer
//! see a participant-mix of two configurations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transaction::Transaction;

pub mod participant;

pub use participant::{Participant, SagaContext};

/// Notification sent on the coalescing reload channel after each
/// committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// Monotone commit counter; 0 until the first commit.
    pub generation: u64,
    pub transaction_id: Uuid,
}

/// Serializes configuration transactions across an ordered participant
/// list and owns the pointer to the current configuration.
pub struct SagaOrchestrator {
    participants: Vec<Arc<dyn Participant>>,

    /// Current committed configuration. Writers only ever swap the
    /// pointer; all participant calls happen outside the lock.
    current: RwLock<Arc<Config>>,

    /// One transaction at a time; concurrent updates queue here.
    gate: tokio::sync::Mutex<()>,

    updates: watch::Sender<ConfigUpdate>,
    generation: AtomicU64,

    /// Set when a participant failed to activate a committed
    /// configuration; cleared by the next fully clean commit.
    degraded: RwLock<Option<String>>,
}

impl SagaOrchestrator {
    pub fn new(participants: Vec<Arc<dyn Participant>>) -> Self {
        let (updates, _) = watch::channel(ConfigUpdate {
            generation: 0,
            transaction_id: Uuid::nil(),
        });
        Self {
            participants,
            current: RwLock::new(Arc::new(Config::default())),
            gate: tokio::sync::Mutex::new(()),
            updates,
            generation: AtomicU64::new(0),
            degraded: RwLock::new(None),
        }
    }

    /// The current committed configuration.
    pub fn current(&self) -> Arc<Config> {
        self.current.read().expect("current config poisoned").clone()
    }

    /// Failure detail left behind by a participant activation failure,
    /// if the server is running degraded.
    pub fn degraded(&self) -> Option<String> {
        self.degraded.read().expect("degraded flag poisoned").clone()
    }

    /// Subscribe to commit notifications. The channel holds a single
    /// slot: unread notifications are coalesced, never queued.
    pub fn subscribe(&self) -> watch::Receiver<ConfigUpdate> {
        self.updates.subscribe()
    }

    /// Run one transaction through validation and the saga protocol.
    ///
    /// On success the current-configuration pointer is swapped and the
    /// new value returned. On any staging failure every participant
    /// that was staged is compensated in reverse order and the current
    /// configuration is left untouched.
    pub async fn apply(
        &self,
        tx: Arc<Transaction>,
        cancel: CancellationToken,
    ) -> Result<Arc<Config>> {
        let _serialized = self.gate.lock().await;
        let ctx = SagaContext::new(tx.id(), cancel);

        tx.run_validation()?;
        if !tx.config().validation_completed() {
            return Err(Error::Internal(
                "transaction config lost its validation latch".to_string(),
            ));
        }

        tx.begin_execution()?;

        let mut staged: Vec<Arc<dyn Participant>> = Vec::new();
        let mut failure: Option<Error> = None;

        for participant in &self.participants {
            if !participant.is_running() {
                tx.log()
                    .info(format!("participant {} quiescent, skipped", participant.name()));
                continue;
            }
            if ctx.is_canceled() {
                failure = Some(Error::Canceled);
                break;
            }

            match participant.stage_config(&ctx, &tx).await {
                Ok(()) => {
                    tx.log()
                        .debug(format!("participant {} staged", participant.name()));
                    staged.push(participant.clone());
                }
                Err(e) => {
                    // The failing participant may have partially staged;
                    // it gets compensated along with the rest. An error
                    // produced by the token firing mid-call reports as
                    // cancellation, not a participant defect.
                    staged.push(participant.clone());
                    failure = Some(if ctx.is_canceled() {
                        Error::Canceled
                    } else {
                        Error::ParticipantStage {
                            participant: participant.name().to_string(),
                            message: e.to_string(),
                        }
                    });
                    break;
                }
            }
        }

        if let Some(error) = failure {
            tx.log().error(format!("staging aborted: {}", error));
            tx.mark_failed()?;
            tx.begin_compensation()?;
            for participant in staged.iter().rev() {
                if let Err(e) = participant.compensate(&ctx, &tx).await {
                    // Compensation is best effort; a failure here must
                    // not mask the original error.
                    tx.log().error(format!(
                        "participant {} compensation failed: {}",
                        participant.name(),
                        e
                    ));
                }
            }
            tx.mark_compensated()?;
            return Err(error);
        }

        tx.mark_succeeded()?;
        tx.begin_reload()?;

        // Activation runs to completion regardless of cancellation;
        // failures are logged and leave the server degraded, but the
        // commit proceeds.
        let mut degraded: Option<String> = None;
        for participant in &staged {
            if let Err(e) = participant.activate_pending(&ctx).await {
                let detail = format!("participant {}: {}", participant.name(), e);
                tracing::error!(
                    transaction_id = %tx.id(),
                    participant = participant.name(),
                    "activation failed, server degraded: {}",
                    e
                );
                tx.log().error(format!("activation failed: {}", detail));
                degraded.get_or_insert(detail);
            }
        }

        tx.mark_completed()?;

        let committed = tx.config_arc();
        {
            let mut current = self.current.write().expect("current config poisoned");
            *current = committed.clone();
        }
        *self.degraded.write().expect("degraded flag poisoned") = degraded;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let _ = self.updates.send(ConfigUpdate {
            generation,
            transaction_id: tx.id(),
        });

        tx.log().info("configuration committed");
        Ok(committed)
    }
}
