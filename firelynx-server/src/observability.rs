//! Tracing initialization driven by the domain logging section

use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat, LogLevel};
use crate::error::Result;

/// Initialize the global tracing subscriber from a logging config.
///
/// `RUST_LOG` overrides the configured level when set. Safe to call
/// more than once; later calls are no-ops.
pub fn init_tracing(logging: &LogConfig) -> Result<()> {
    let default_level = match logging.level {
        LogLevel::Debug => "debug",
        LogLevel::Info | LogLevel::Unspecified => "info",
        LogLevel::Warn => "warn",
        // Fatal maps to error: tracing has no fatal level.
        LogLevel::Error | LogLevel::Fatal => "error",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let initialized = match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Txt | LogFormat::Unspecified => {
            tracing_subscriber::fmt().with_env_filter(filter).try_init()
        }
    };

    if initialized.is_ok() {
        tracing::info!(
            format = logging.format.as_str(),
            level = logging.level.as_str(),
            "tracing initialized"
        );
    }

    Ok(())
}
