//! Linkwise CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway
//! - `identify`: Reconcile one email/phone pair and print the cluster
//! - `contacts`: Dump every stored contact
//! - `init`: Write the default config file
//! - `doctor`: Diagnose config and store health

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use linkwise_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "linkwise",
    about = "Linkwise: identity reconciliation service",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.linkwise/config.toml)
    #[arg(short, long, global = true, env = "LINKWISE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Reconcile a single observation against the configured store
    Identify {
        #[arg(short, long)]
        email: Option<String>,

        #[arg(short, long)]
        phone: Option<String>,
    },

    /// Print every stored contact as JSON
    Contacts,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Diagnose configuration and store health
    Doctor,
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    // stdout is reserved for command output.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let config_path = cli.config_path();
    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(&config_path, port, host).await?,
        Commands::Identify { email, phone } => {
            commands::identify::run(&config_path, email, phone).await?
        }
        Commands::Contacts => commands::contacts::run(&config_path).await?,
        Commands::Init { force } => commands::init::run(&config_path, force)?,
        Commands::Doctor => commands::doctor::run(&config_path).await?,
    }

    Ok(())
}
