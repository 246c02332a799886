use clap::{Parser, Subcommand};

mod commands;

/// firelynx - configuration-driven application server
#[derive(Parser)]
#[command(name = "firelynx")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server
    Serve(commands::serve::ServeArgs),

    /// Validate a configuration file and exit
    Validate(commands::validate::ValidateArgs),
}

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Execute command
    let result = match cli.command {
        Commands::Serve(args) => commands::serve::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
    };

    // Handle result
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("Caused by: {}", cause);
            }
            std::process::exit(1);
        }
    }
}
