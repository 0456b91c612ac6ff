//! rider-link CLI
//!
//! Terminal client for the delivery dispatch server:
//! - Credentials (login, logout)
//! - Delivery search and tracking
//! - Connection status and configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rider_link::client::ClientContext;
use rider_link::commands;
use rl_client::SearchStatus;
use rl_protocol::Location;

#[derive(Parser)]
#[command(name = "rider-link")]
#[command(author, version, about = "Find a rider for a delivery from the terminal")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the credentials file (overrides config)
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Dispatch server URL (overrides config)
    #[arg(short, long, global = true, env = "RIDER_LINK_SERVER")]
    server: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a delivery and search for a rider until there is an outcome
    Search {
        /// JSON file describing the delivery (must include "_id")
        #[arg(short, long)]
        delivery: PathBuf,
        /// Pickup latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Pickup longitude
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Pickup address
        #[arg(long)]
        address: Option<String>,
        /// Extra connection attempts before giving up
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },

    /// Subscribe to live updates for a delivery
    Track {
        /// Delivery ID
        delivery_id: String,
        /// Extra connection attempts before giving up
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },

    /// Connect once and show the connection state
    Status,

    /// Store credentials for the dispatch server
    Login {
        /// Bearer token
        #[arg(long, env = "RIDER_LINK_TOKEN", hide_env_values = true)]
        token: String,
        /// User ID the token belongs to
        #[arg(long)]
        user_id: String,
    },

    /// Remove stored credentials
    Logout,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Get specific config value
    Get { key: String },
    /// Set config value
    Set { key: String, value: String },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Commands::Config { action } = &cli.command {
        let config = cli.config.as_ref();
        return match action {
            ConfigAction::Show => commands::config_show(config),
            ConfigAction::Init { force } => commands::config_init(config, *force),
            ConfigAction::Get { key } => commands::config_get(config, key),
            ConfigAction::Set { key, value } => commands::config_set(config, key, value),
            ConfigAction::Path => commands::config_path(config),
        };
    }

    let context = ClientContext::load(
        cli.config.as_ref(),
        cli.credentials.as_ref(),
        cli.server.as_deref(),
    )?;

    match cli.command {
        Commands::Search {
            delivery,
            lat,
            lng,
            address,
            retries,
        } => {
            let mut pickup = Location::new(lat, lng);
            if let Some(address) = address {
                pickup = pickup.with_address(address);
            }
            let status = commands::search_command(&context, &delivery, pickup, retries).await?;
            if status != SearchStatus::Assigned {
                std::process::exit(2);
            }
        }

        Commands::Track {
            delivery_id,
            retries,
        } => {
            commands::track_command(&context, &delivery_id, retries).await?;
        }

        Commands::Status => {
            commands::status_command(&context).await?;
        }

        Commands::Login { token, user_id } => {
            commands::login_command(&context, &token, &user_id)?;
        }

        Commands::Logout => {
            commands::logout_command(&context)?;
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}
