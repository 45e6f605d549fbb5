//! profsync CLI - Command-line interface for profsync
//!
//! Provides `profsync upload`, `profsync download`, `profsync profile` and
//! the other commands over the local editor installation.

mod commands;

use clap::{Parser, Subcommand};
use profsync_core::config::{default_storage_dir, CONFIG_FILE};
use profsync_core::{CodeEditor, Editor, Resource, SyncService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use commands::profile::ProfileCommands;

#[derive(Parser)]
#[command(name = "profsync")]
#[command(about = "profsync - Editor profile synchronization")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to <storage>/settings.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage directory for the configuration and working copies
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Editor user data directory holding settings.json
    #[arg(long, global = true)]
    user_data: Option<PathBuf>,

    /// Editor extensions directory
    #[arg(long, global = true)]
    extensions_dir: Option<PathBuf>,

    /// Editor command-line binary
    #[arg(long, global = true, default_value = "code")]
    editor_bin: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serialize the active profile and publish it to the repository
    Upload {
        /// Only these resources (comma-separated, e.g. settings,snippets)
        #[arg(long, value_delimiter = ',')]
        only: Vec<Resource>,
    },
    /// Fetch the repository and restore the active profile
    Download {
        /// Only these resources (comma-separated, e.g. settings,snippets)
        #[arg(long, value_delimiter = ',')]
        only: Vec<Resource>,
    },
    /// Serialize the active profile into the local tree only
    Serialize,
    /// Restore the active profile from the local tree only
    Restore,
    /// Show what an upload would change
    Diff,
    /// Show the repository backend and the active profile
    Status,
    /// Upload the active profile if the live state changed since the last save
    Review,
    /// List the profile's extensions that are not installed in that state
    ListMissingExtensions,
    /// Remove all local settings and extensions
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Reload the repository whenever the configuration file changes
    Watch {
        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval: u64,
        /// Debounce delay in milliseconds
        #[arg(long, default_value_t = 500)]
        delay: u64,
    },
    /// Manage profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let service = Arc::new(start_service(&cli).await);

    match cli.command {
        Commands::Upload { only } => commands::sync::upload(&service, only).await,
        Commands::Download { only } => commands::sync::download(&service, only).await,
        Commands::Serialize => commands::sync::serialize(&service).await,
        Commands::Restore => commands::sync::restore(&service).await,
        Commands::Diff => commands::sync::diff(&service).await,
        Commands::Status => commands::sync::status(&service).await,
        Commands::Review => commands::sync::review(&service).await,
        Commands::ListMissingExtensions => commands::editor::list_missing_extensions(&service).await,
        Commands::Reset { force } => commands::editor::reset(&service, force).await,
        Commands::Watch { interval, delay } => commands::sync::watch(service, interval, delay).await,
        Commands::Profile { action } => commands::profile::execute(&service, action).await,
    }
}

async fn start_service(cli: &Cli) -> SyncService {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let storage = cli.storage.clone().unwrap_or_else(default_storage_dir);
    let config = cli.config.clone().unwrap_or_else(|| storage.join(CONFIG_FILE));
    let user_data = cli.user_data.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| home.join(".config"))
            .join("Code")
            .join("User")
    });
    let extensions = cli
        .extensions_dir
        .clone()
        .unwrap_or_else(|| home.join(".vscode").join("extensions"));

    let editor: Arc<dyn Editor> =
        Arc::new(CodeEditor::detect(cli.editor_bin.clone(), user_data, extensions, home).await);

    SyncService::start(config, storage, editor).await
}
