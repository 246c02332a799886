//! Control service lifecycle and wiring
//!
//! The control service owns the saga orchestrator, the lifecycle state
//! machine, and the control-plane transport. It boots from an optional
//! configuration file, serves `ConfigService` on an optional listen
//! address, reloads on SIGHUP, and shuts down gracefully when the
//! supervisor cancels its token.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::{loader, wire, Config};
use crate::error::{Error, Result};
use crate::proto::control::config_service_server::ConfigServiceServer;
use crate::saga::{ConfigUpdate, Participant, SagaOrchestrator};
use crate::transaction::Transaction;

pub mod client;
pub mod lifecycle;
pub mod service;

pub use client::{ConfigServiceClient, ControlClient};
pub use lifecycle::{Lifecycle, ServiceState};
pub use service::ConfigServiceHandler;

const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`ControlService`].
pub struct ControlServiceBuilder {
    config_path: Option<PathBuf>,
    listen_addr: Option<SocketAddr>,
    participants: Vec<Arc<dyn Participant>>,
    update_timeout: Duration,
}

impl ControlServiceBuilder {
    pub fn new() -> Self {
        Self {
            config_path: None,
            listen_addr: None,
            participants: Vec::new(),
            update_timeout: DEFAULT_UPDATE_TIMEOUT,
        }
    }

    /// Enable the file source: load this path at boot and on reload.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Enable the control-plane RPC transport on this address.
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = Some(addr);
        self
    }

    /// Register a saga participant. Order matters: staging runs in
    /// registration order, compensation in reverse.
    pub fn participant(mut self, participant: Arc<dyn Participant>) -> Self {
        self.participants.push(participant);
        self
    }

    /// Wall-clock budget for one `UpdateConfig` call.
    pub fn update_timeout(mut self, timeout: Duration) -> Self {
        self.update_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ControlService> {
        if self.config_path.is_none() && self.listen_addr.is_none() {
            return Err(Error::Internal(
                "a configuration file or a control listen address is required".to_string(),
            ));
        }
        Ok(ControlService {
            orchestrator: Arc::new(SagaOrchestrator::new(self.participants)),
            lifecycle: Arc::new(Lifecycle::new()),
            config_path: self.config_path,
            listen_addr: self.listen_addr,
            update_timeout: self.update_timeout,
        })
    }
}

impl Default for ControlServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Long-running control service.
pub struct ControlService {
    orchestrator: Arc<SagaOrchestrator>,
    lifecycle: Arc<Lifecycle>,
    config_path: Option<PathBuf>,
    listen_addr: Option<SocketAddr>,
    update_timeout: Duration,
}

impl ControlService {
    pub fn builder() -> ControlServiceBuilder {
        ControlServiceBuilder::new()
    }

    /// The orchestrator holding the current configuration.
    pub fn orchestrator(&self) -> &Arc<SagaOrchestrator> {
        &self.orchestrator
    }

    /// Current committed configuration.
    pub fn current_config(&self) -> Arc<Config> {
        self.orchestrator.current()
    }

    /// Observe lifecycle state changes (startup failure detection).
    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.lifecycle.subscribe()
    }

    /// Observe configuration commits on the coalescing channel.
    pub fn subscribe_updates(&self) -> watch::Receiver<ConfigUpdate> {
        self.orchestrator.subscribe()
    }

    /// Run until the supervisor cancels `shutdown`.
    ///
    /// Boot order: apply the file configuration (when configured),
    /// bind the control-plane transport (when configured), then enter
    /// the signal loop. Teardown runs in reverse.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        if let Some(path) = self.config_path.clone() {
            tracing::info!(path = %path.display(), "loading initial configuration");
            if let Err(e) = self.load_and_apply(path).await {
                let _ = self
                    .lifecycle
                    .transition(ServiceState::Error(e.to_string()));
                return Err(e);
            }
        }

        let mut transport = None;
        if let Some(addr) = self.listen_addr {
            let handler = ConfigServiceHandler::new(
                self.orchestrator.clone(),
                self.lifecycle.clone(),
                self.update_timeout,
            );
            let cancel = shutdown.clone();
            transport = Some(tokio::spawn(async move {
                tonic::transport::Server::builder()
                    .add_service(ConfigServiceServer::new(handler))
                    .serve_with_shutdown(addr, cancel.cancelled_owned())
                    .await
            }));
            tracing::info!("control plane listening on {}", addr);
        }

        self.lifecycle.transition(ServiceState::Running)?;

        self.wait_for_signals(&shutdown).await?;

        self.lifecycle.transition(ServiceState::Stopping)?;
        if let Some(task) = transport {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let _ = self
                        .lifecycle
                        .transition(ServiceState::Error(e.to_string()));
                    return Err(e.into());
                }
                Err(e) => {
                    let _ = self
                        .lifecycle
                        .transition(ServiceState::Error(e.to_string()));
                    return Err(Error::Internal(format!("transport task failed: {}", e)));
                }
            }
        }
        self.lifecycle.transition(ServiceState::Stopped)?;
        tracing::info!("control service shutdown complete");
        Ok(())
    }

    /// Re-read the configured file and run it through the saga. Called
    /// by the signal handler; failure keeps the current configuration
    /// and the service alive.
    pub async fn reload(&self) -> Result<()> {
        let Some(path) = self.config_path.clone() else {
            tracing::warn!("reload requested but no configuration file is configured");
            return Ok(());
        };

        self.lifecycle.transition(ServiceState::Reloading)?;
        let outcome = self.load_and_apply(path.clone()).await;
        match &outcome {
            Ok(_) => tracing::info!(path = %path.display(), "configuration reloaded"),
            Err(e) => tracing::error!(
                path = %path.display(),
                "configuration reload failed, keeping current configuration: {}",
                e
            ),
        }
        self.lifecycle.transition(ServiceState::Running)?;
        outcome.map(|_| ())
    }

    async fn load_and_apply(&self, path: PathBuf) -> Result<Arc<Config>> {
        let document = loader::load_file(&path)?;
        let config = wire::from_wire(&document)?;
        let tx = Arc::new(Transaction::from_file(
            path.display().to_string(),
            Arc::new(config),
        ));
        self.orchestrator
            .apply(tx, CancellationToken::new())
            .await
    }

    #[cfg(unix)]
    async fn wait_for_signals(&self, shutdown: &CancellationToken) -> Result<()> {
        let mut hangup =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested, draining");
                    return Ok(());
                }
                _ = hangup.recv() => {
                    tracing::info!("received SIGHUP, reloading configuration");
                    if let Err(e) = self.reload().await {
                        tracing::error!("reload failed: {}", e);
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_signals(&self, shutdown: &CancellationToken) -> Result<()> {
        shutdown.cancelled().await;
        tracing::info!("shutdown requested, draining");
        Ok(())
    }
}
