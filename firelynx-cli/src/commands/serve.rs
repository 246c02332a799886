//! `firelynx serve`: run the server until a shutdown signal arrives

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::Args;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use firelynx_server::config::{loader, wire};
use firelynx_server::control::ControlService;
use firelynx_server::observability::init_tracing;

#[derive(Args)]
pub struct ServeArgs {
    /// Path to the TOML configuration file (enables the file source
    /// and SIGHUP reload)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bind address for the control-plane gRPC listener
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Wall-clock budget for one UpdateConfig call, in seconds
    #[arg(long, default_value_t = 30)]
    pub update_timeout_secs: u64,
}

pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    if args.config.is_none() && args.listen.is_none() {
        bail!("at least one of --config or --listen is required");
    }

    // The logging section lives inside the configuration file, so peek
    // at it before boot; load errors surface properly once the service
    // applies the file through the saga.
    let logging = args
        .config
        .as_deref()
        .and_then(|path| loader::load_file(path).ok())
        .and_then(|document| wire::from_wire(&document).ok())
        .map(|config| config.logging)
        .unwrap_or_default();
    init_tracing(&logging)?;

    let mut builder = ControlService::builder()
        .update_timeout(Duration::from_secs(args.update_timeout_secs));
    if let Some(path) = &args.config {
        builder = builder.config_path(path);
    }
    if let Some(addr) = args.listen {
        builder = builder.listen_addr(addr);
    }
    let service = Arc::new(builder.build()?);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    service.run(shutdown).await?;
    Ok(())
}

/// Resolve once the process is asked to stop (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .expect("SIGINT handler could not be installed");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler could not be installed")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {
            tracing::info!("SIGINT received, shutting the server down");
        },
        _ = terminate => {
            tracing::info!("SIGTERM received, shutting the server down");
        },
    }
}
