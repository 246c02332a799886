//! Control-plane gRPC service
//!
//! Implements `firelynx.control.v1.ConfigService`: `GetConfig` returns
//! a deep copy of the current configuration, `UpdateConfig` runs a new
//! document through the transaction saga under a wall-clock budget.
//! Every update response carries the effective configuration so clients
//! never need to poll after a failure.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::config::{wire, Config};
use crate::error::{Error, Result};
use crate::proto::control;
use crate::saga::SagaOrchestrator;
use crate::transaction::Transaction;

use super::lifecycle::Lifecycle;

/// Handler behind the generated `ConfigService` server.
pub struct ConfigServiceHandler {
    orchestrator: Arc<SagaOrchestrator>,
    lifecycle: Arc<Lifecycle>,
    update_timeout: Duration,
}

impl ConfigServiceHandler {
    pub fn new(
        orchestrator: Arc<SagaOrchestrator>,
        lifecycle: Arc<Lifecycle>,
        update_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            lifecycle,
            update_timeout,
        }
    }

    /// Run the saga in its own task under the update budget. On
    /// timeout the cancellation token fires and the saga is awaited so
    /// compensation always runs to completion.
    async fn run_saga(&self, tx: Arc<Transaction>) -> Result<Arc<Config>> {
        let cancel = CancellationToken::new();
        let orchestrator = self.orchestrator.clone();
        let saga_tx = tx.clone();
        let child = cancel.child_token();
        let mut saga = tokio::spawn(async move { orchestrator.apply(saga_tx, child).await });

        tokio::select! {
            finished = &mut saga => {
                finished.map_err(|e| Error::Internal(format!("saga task failed: {}", e)))?
            }
            _ = tokio::time::sleep(self.update_timeout) => {
                cancel.cancel();
                let finished = saga
                    .await
                    .map_err(|e| Error::Internal(format!("saga task failed: {}", e)))?;
                match finished {
                    Err(e) if e.is_canceled() => Err(Error::DeadlineExceeded),
                    other => other,
                }
            }
        }
    }

    fn failure_response(&self, tx: &Transaction, error: &Error) -> control::UpdateConfigResponse {
        control::UpdateConfigResponse {
            success: Some(false),
            config: Some(wire::to_wire(&self.orchestrator.current())),
            transaction_id: Some(tx.id().to_string()),
            error: Some(control::UpdateError {
                code: Some(status_code_name(error).to_string()),
                kind: Some(error.kind_name().to_string()),
                message: Some(error.to_string()),
                log: tx.log().lines(),
            }),
        }
    }
}

/// Transport status-code name carried in structured failure details.
fn status_code_name(error: &Error) -> &'static str {
    match error {
        Error::Conversion(_) | Error::Validation(_) | Error::Loader(_) => "INVALID_ARGUMENT",
        Error::Canceled => "CANCELLED",
        Error::DeadlineExceeded => "DEADLINE_EXCEEDED",
        _ => "INTERNAL",
    }
}

#[tonic::async_trait]
impl control::config_service_server::ConfigService for ConfigServiceHandler {
    async fn get_config(
        &self,
        _request: Request<control::GetConfigRequest>,
    ) -> std::result::Result<Response<control::GetConfigResponse>, Status> {
        let current = self.orchestrator.current();
        Ok(Response::new(control::GetConfigResponse {
            config: Some(wire::to_wire(&current)),
            degraded: self.orchestrator.degraded(),
        }))
    }

    async fn update_config(
        &self,
        request: Request<control::UpdateConfigRequest>,
    ) -> std::result::Result<Response<control::UpdateConfigResponse>, Status> {
        if !self.lifecycle.accepts_updates() {
            return Err(Status::failed_precondition(format!(
                "service is {}, not accepting configuration updates",
                self.lifecycle.state()
            )));
        }

        let message = request.into_inner();
        let request_id = message
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let document = message.config.unwrap_or_default();

        let (config, conversion_error) = match wire::from_wire(&document) {
            Ok(config) => (Arc::new(config), None),
            // No domain config exists for a rejected document; an
            // empty one keeps the transaction trail addressable.
            Err(e) => (Arc::new(Config::default()), Some(e)),
        };
        let tx = Arc::new(Transaction::from_api(request_id, config));

        let outcome = match conversion_error {
            Some(e) => {
                let error = Error::Conversion(e);
                let _ = tx.reject(&error);
                Err(error)
            }
            None => self.run_saga(tx.clone()).await,
        };

        match outcome {
            Ok(committed) => Ok(Response::new(control::UpdateConfigResponse {
                success: Some(true),
                config: Some(wire::to_wire(&committed)),
                transaction_id: Some(tx.id().to_string()),
                error: None,
            })),
            Err(error) => {
                tracing::warn!(
                    transaction_id = %tx.id(),
                    kind = error.kind_name(),
                    "configuration update rejected: {}",
                    error
                );
                Ok(Response::new(self.failure_response(&tx, &error)))
            }
        }
    }
}
