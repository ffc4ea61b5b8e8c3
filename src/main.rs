// ABOUTME: Main entry point for SmartHomeBot with CLI subcommands
// ABOUTME: Initializes logging, config and state, then runs the Telegram event loop

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smarthomebot::bot::{App, Collaborators, Settings};
use smarthomebot::config::Config;
use smarthomebot::platform::TelegramPlatform;
use smarthomebot::system::{CommandRebooter, GithubReleases, SysinfoStats};
use smarthomebot::traits::{MessagingPlatform, UserId};
use smarthomebot::{metrics, paths};
use smarthomebot_core::system::VersionSource;
use smarthomebot_core::{SharedState, StateStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "smarthomebot", version, about = "Telegram bot for a private smart home")]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log to stderr as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bot (default)
    Run,
    /// Create the state file with its owner
    Init {
        /// Telegram user id of the owner
        #[arg(long)]
        owner: UserId,
        /// Bot token to store in BOT_DATA
        #[arg(long)]
        token: Option<String>,
    },
    /// Validate config and state, then print a summary
    Check,
}

fn init_tracing(json: bool) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,reqwest=warn,hyper=warn".into());

    let log_dir = paths::log_dir();
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "smarthomebot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Cannot create log directory {}: {}", log_dir.display(), e);
            (None, None)
        }
    };

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log panics before the process dies
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("SmartHomeBot panicked: {}", panic_info);
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _guard = init_tracing(cli.json);

    let config = Config::load(cli.config.as_deref())?;
    tracing::info!(
        state = %config.state.path,
        timezone = %config.scheduler.timezone,
        metrics = config.metrics.listen.as_deref().unwrap_or("disabled"),
        updates_repo = %config.updates.repo,
        "Configuration loaded"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Init { owner, token } => init(&config, owner, token),
        Commands::Check => check(&config).await,
    }
}

fn init(config: &Config, owner: UserId, token: Option<String>) -> Result<()> {
    let token = token
        .or_else(|| config.telegram.bot_token.clone())
        .unwrap_or_default();
    let store = StateStore::new(config.state_path());
    store
        .init(owner, &token, VERSION)
        .with_context(|| format!("Failed to initialize {}", store.path().display()))?;
    println!("Created {} with owner {}", store.path().display(), owner);
    if token.is_empty() {
        println!("No bot token stored; set TELEGRAM_BOT_TOKEN or [telegram] bot_token.");
    }
    Ok(())
}

async fn check(config: &Config) -> Result<()> {
    let store = StateStore::new(config.state_path());
    let (snapshot, repairs) = store
        .inspect()
        .with_context(|| format!("Failed to load state from {}", store.path().display()))?;
    let has_token = config.telegram.bot_token.is_some() || !snapshot.bot_data.bot_token.is_empty();

    println!("State file:     {}", store.path().display());
    println!("Owner:          {}", snapshot.users.owner);
    println!("Admins:         {}", snapshot.users.admins.len());
    println!("Allowed users:  {}", snapshot.users.allowed.len());
    println!("Banned users:   {}", snapshot.users.banned.len());
    println!("Join requests:  {}", snapshot.users.pending_requests.len());
    println!("Pending timers: {}", snapshot.timers.len());
    println!("Timezone:       {}", config.timezone());
    println!("Bot token:      {}", if has_token { "configured" } else { "missing" });
    for repair in &repairs {
        println!("Needs repair:   {} (applied on next run)", repair);
    }
    if !has_token {
        anyhow::bail!("No bot token configured");
    }
    Ok(())
}

/// Configured token, or the one stored in BOT_DATA
async fn resolve_token(config: &Config, state: &SharedState) -> Result<String> {
    if let Some(token) = &config.telegram.bot_token {
        return Ok(token.clone());
    }
    let stored = state.read(|s| s.bot_data.bot_token.clone()).await;
    if stored.trim().is_empty() {
        anyhow::bail!(
            "No bot token: set TELEGRAM_BOT_TOKEN, [telegram] bot_token, \
             or run `smarthomebot init --token`"
        );
    }
    Ok(stored)
}

async fn run(config: Config) -> Result<()> {
    tracing::info!(version = VERSION, "Starting SmartHomeBot");

    let state = SharedState::open(StateStore::new(config.state_path()))?;
    let token = resolve_token(&config, &state).await?;

    if let Some(listen) = &config.metrics.listen {
        metrics::install_prometheus(listen)?;
    }

    let telegram = Arc::new(TelegramPlatform::new(&token).await?);
    state
        .record_bot_identity(telegram.bot_user_id(), VERSION)
        .await?;
    let platform: Arc<dyn MessagingPlatform> = telegram;

    let versions: Option<Arc<dyn VersionSource>> = if config.updates.repo.is_empty() {
        tracing::info!("No release repository configured, /version only reports the running build");
        None
    } else {
        Some(Arc::new(GithubReleases::new(
            &config.updates.api_base,
            &config.updates.repo,
        )?))
    };
    let collaborators = Collaborators {
        stats: Arc::new(SysinfoStats::new()),
        versions,
        rebooter: Arc::new(CommandRebooter::from_command_line(
            &config.system.reboot_command,
        )?),
    };

    let app = App::new(
        state,
        Arc::clone(&platform),
        collaborators,
        Settings::from_config(&config),
    );
    app.scheduler.reconcile().await?;

    let events = platform.event_stream().await?;
    tracing::info!("Bot ready");
    app.run(events, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await;

    platform.shutdown().await?;
    tracing::info!("SmartHomeBot stopped");
    Ok(())
}
