//! Participant contract
//!
//! A participant is any runtime subsystem that must observe
//! configuration changes: listener runtimes, the routing table, the app
//! registry. The orchestrator only ever talks to this capability set
//! and never branches on concrete participant types.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;
use crate::transaction::Transaction;

/// Per-saga call context threaded through every participant call.
#[derive(Debug, Clone)]
pub struct SagaContext {
    transaction_id: Uuid,
    cancel: CancellationToken,
}

impl SagaContext {
    pub fn new(transaction_id: Uuid, cancel: CancellationToken) -> Self {
        Self {
            transaction_id,
            cancel,
        }
    }

    /// The transaction this saga run is executing.
    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    /// Cancellation token for this saga run. Participants doing slow
    /// I/O should poll it.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A runtime component that observes configuration through the saga.
///
/// `stage_config` prepares a pending representation without activating
/// it; `activate_pending` swaps it into use and must not fail for
/// reasons checkable during staging; `compensate` discards the pending
/// representation and must be idempotent (safe even when
/// `stage_config` was never called for the transaction).
#[async_trait]
pub trait Participant: Send + Sync {
    /// Human-readable id for diagnostics.
    fn name(&self) -> &str;

    /// Whether this participant is currently accepting configuration
    /// changes. Quiescent participants are skipped by the saga.
    fn is_running(&self) -> bool {
        true
    }

    /// Examine the transaction's configuration, extract the slice this
    /// participant cares about, and build a pending representation.
    async fn stage_config(&self, ctx: &SagaContext, tx: &Transaction) -> Result<()>;

    /// Atomically swap the pending representation into active use.
    async fn activate_pending(&self, ctx: &SagaContext) -> Result<()>;

    /// Discard the pending representation.
    async fn compensate(&self, ctx: &SagaContext, tx: &Transaction) -> Result<()>;
}
