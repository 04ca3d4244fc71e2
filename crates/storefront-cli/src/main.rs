//! Storefront CLI - sign in and call the storefront API with a managed session.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storefront_config::{init_logging_for_service, Config, Paths};
use tracing::debug;

/// Storefront CLI - manage your session and call the storefront API.
#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Storefront CLI for authentication and authenticated API calls")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config, credentials and logs (default: ~/.storefront)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// API base URL
    #[arg(long, env = "STOREFRONT_API_URL", global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with username or email and password
    Login {
        /// Username or email (prompted if omitted)
        #[arg(short, long)]
        identifier: Option<String>,

        /// Password (prompted if omitted)
        #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Logout and clear the stored session
    Logout,

    /// Show the stored session
    Status,

    /// Fetch your profile from the server
    Whoami,

    /// Signed GET of an API path
    Get {
        /// API path, e.g. /api/cart
        path: String,
    },
}

fn load_settings(cli: &Cli) -> anyhow::Result<(Paths, Config)> {
    let paths = match &cli.base_dir {
        Some(base_dir) => Paths::with_base_dir(base_dir.clone()),
        None => Paths::new()?,
    };

    let mut config = Config::load(&paths)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(api_url) = &cli.api_url {
        config.api_base_url = api_url.clone();
    }

    Ok((paths, config))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (paths, config) = load_settings(&cli)?;

    init_logging_for_service("cli", &config.log_level, Some(paths.log_file()));
    debug!(api_url = %config.api_base_url, "Configuration loaded");

    let manager = commands::open_session(&paths, &config)?;
    let navigator = commands::spawn_navigator(manager.subscribe(), cli.format);

    let format = &cli.format;
    let result = match cli.command {
        Commands::Login {
            identifier,
            password,
        } => commands::login(&manager, identifier, password, format).await,
        Commands::Logout => commands::logout(&manager, format).await,
        Commands::Status => commands::status(&manager, format).await,
        Commands::Whoami => commands::whoami(&manager, format).await,
        Commands::Get { path } => commands::get(&manager, &path, format).await,
    };

    // Closing the session lets the navigator drain and exit.
    drop(manager);
    let _ = navigator.await;

    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&e.to_string(), &format);
        std::process::exit(1);
    }
}
