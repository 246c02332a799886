//! `firelynx validate`: load and validate a configuration file

use std::path::PathBuf;

use anyhow::bail;
use clap::Args;

use firelynx_server::config::{loader, wire};

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the TOML configuration file
    #[arg(long)]
    pub config: PathBuf,
}

pub async fn execute(args: ValidateArgs) -> anyhow::Result<()> {
    let document = loader::load_file(&args.config)?;
    let config = wire::from_wire(&document)?;

    match config.validate() {
        Ok(()) => {
            println!(
                "{}: OK ({} listeners, {} endpoints, {} apps)",
                args.config.display(),
                config.listeners.len(),
                config.endpoints.len(),
                config.apps.len()
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("{}: {} validation error(s)", args.config.display(), errors.len());
            for error in errors.iter() {
                eprintln!("  - {}", error);
            }
            bail!("configuration is invalid");
        }
    }
}
