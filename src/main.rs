mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use s7_admin::log_format::CliLogFormat;
use s7_admin::{
    ApiClient, ClientConfig, ConfirmationService, CookieStore, DualSessionStore, FileStorage,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use commands::TerminalPrompt;

#[derive(Parser)]
#[command(name = "s7-admin")]
#[command(about = "Command-line client for the S7 Robotics admin backend")]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides S7_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory holding the saved session (overrides S7_STATE_DIR)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Answer every confirmation with yes
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and save the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "S7_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and save the session
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "S7_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Send a request to any backend path and print the JSON response
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,
        /// Backend-relative path or absolute URL
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
    /// Delete a resource (asks for confirmation)
    Delete { path: String },
    /// Ban a user (asks for confirmation and a reason)
    Ban {
        user_id: String,
        /// Reason used when confirming with --yes
        #[arg(long)]
        reason: Option<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let ansi = std::io::stderr().is_terminal();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(CliLogFormat::new(ansi))
                .with_writer(std::io::stderr),
        )
        .init();
}

fn build_client(cli: &Cli) -> Result<ApiClient> {
    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(state_dir) = &cli.state_dir {
        config.state_dir = state_dir.clone();
    }
    debug!("Using backend {} with state in {}", config.api_url, config.state_dir.display());

    let storage = FileStorage::in_dir(&config.state_dir);
    // An unreadable cookie file only loses the fallback copy of the session
    let cookies = CookieStore::open_in_dir(&config.state_dir).unwrap_or_else(|e| {
        warn!("Ignoring saved cookies: {}", e);
        CookieStore::new()
    });
    let session = Arc::new(DualSessionStore::new(Arc::new(storage), Arc::new(cookies)));

    ApiClient::new(config, session).context("Failed to create API client")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging();
    s7_admin::metrics::initialize_client_metrics();

    let client = build_client(&cli)?;
    let confirmations = ConfirmationService::new();

    let default_reason = match &cli.command {
        Commands::Ban { reason, .. } => reason.clone(),
        _ => None,
    };
    if cli.yes && default_reason.is_none() && matches!(cli.command, Commands::Ban { .. }) {
        anyhow::bail!("--yes with ban requires --reason");
    }

    let prompt = TerminalPrompt::new(confirmations.clone(), cli.yes)
        .with_default_reason(default_reason)
        .spawn();

    let command = async {
        match cli.command {
            Commands::Login { email, password } => {
                commands::handle_login(&client, &email, &password).await
            }
            Commands::Register {
                email,
                password,
                full_name,
            } => commands::handle_register(&client, email, password, full_name).await,
            Commands::Logout => commands::handle_logout(&client, &confirmations).await,
            Commands::Whoami => commands::handle_whoami(&client).await,
            Commands::Request { method, path, body } => {
                commands::handle_request(&client, &method, &path, body).await
            }
            Commands::Delete { path } => {
                commands::handle_delete(&client, &confirmations, &path).await
            }
            Commands::Ban { user_id, .. } => {
                commands::handle_ban(&client, &confirmations, &user_id).await
            }
        }
    };

    let result = tokio::select! {
        result = command => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for interrupt")?;
            warn!("Interrupted, abandoning pending confirmations");
            Err(anyhow::anyhow!("Interrupted"))
        }
    };

    confirmations.cancel_all();
    prompt.abort();
    result
}
