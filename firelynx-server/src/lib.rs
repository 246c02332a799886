//! # firelynx-server
//!
//! Configuration core of the firelynx application server: a
//! long-running process that binds network listeners, routes requests
//! to pluggable apps (echo, embedded scripts, MCP tool servers), and
//! accepts live configuration updates through a gRPC control plane or
//! a SIGHUP-triggered file reload.
//!
//! This crate holds the domain model, the TOML loader and validator,
//! the schema bridge to the protobuf wire form, the transaction
//! lifecycle, and the saga that applies a new configuration atomically
//! across all runtime participants with rollback on failure. Listener
//! runtimes and app internals live in their own crates and observe
//! configuration through the [`saga::Participant`] contract.
//!
//! ## Example
//!
//! ```rust,no_run
//! use firelynx_server::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let service = ControlService::builder()
//!         .config_path("/etc/firelynx/firelynx.toml")
//!         .listen_addr("127.0.0.1:9999".parse().unwrap())
//!         .build()?;
//!
//!     init_tracing(&service.current_config().logging)?;
//!
//!     let shutdown = CancellationToken::new();
//!     service.run(shutdown).await
//! }
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod observability;
pub mod proto;
pub mod saga;
pub mod transaction;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        builtin, loader, validate, wire, App, AppConfig, Config, Endpoint, EvaluatorKind,
        Listener, ListenerKind, ListenerOptions, LogConfig, LogFormat, LogLevel, Route,
        RouteCondition, StaticData, ValidationError, ValidationErrors, ValidationKind,
    };
    pub use crate::control::{
        client, ConfigServiceClient, ConfigServiceHandler, ControlClient, ControlService,
        ControlServiceBuilder, Lifecycle, ServiceState,
    };
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;
    pub use crate::saga::{ConfigUpdate, Participant, SagaContext, SagaOrchestrator};
    pub use crate::transaction::{Source, Transaction, TransactionState};

    // Re-export the async building blocks participants are written
    // against.
    pub use async_trait::async_trait;
    pub use tokio_util::sync::CancellationToken;
    pub use uuid::Uuid;
}
