use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use drive_core::chat::DiscordIo;
use drive_core::config::BotConfig;
use drive_core::connection::{self, GatewayEvent};
use drive_core::definitions;
use drive_core::dispatcher::{DriveCommands, Settings};
use drive_core::pager::PageStore;
use drive_core::rest::DiscordRest;
use drive_core::state::DriveState;
use drive_google::{GoogleDrive, GoogleDriveConfig};

mod interactions;

use interactions::Bot;

#[derive(Parser, Debug)]
#[command(name = "drive-bot")]
#[command(about = "Browse a Google Drive folder from Discord slash commands")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long, env = "DRIVE_BOT_CONFIG")]
    config_path: Option<String>,

    /// Bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: Option<String>,

    /// Register commands in this guild only
    #[arg(long, env = "DD_GUILD_ID")]
    guild_id: Option<u64>,

    /// Share link or id of the Drive folder to expose
    #[arg(long, env = "DRIVE_ROOT_FOLDER")]
    root_folder: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DRIVE_BOT_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!("drive-bot v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = cli
        .config_path
        .map(PathBuf::from)
        .unwrap_or_else(BotConfig::default_path);

    let mut config = if config_path.exists() {
        info!("loading config from {}", config_path.display());
        BotConfig::load(&config_path)?
    } else {
        info!("no config at {}, using defaults", config_path.display());
        BotConfig::default()
    };

    // CLI args override config file
    if let Some(token) = cli.discord_token {
        config.discord_token = token;
    }
    if let Some(guild) = cli.guild_id {
        config.guild_id = Some(guild);
    }
    if let Some(root) = cli.root_folder {
        config.root_folder = root;
    }
    config.validate()?;

    run_bot(config).await
}

async fn run_bot(config: BotConfig) -> Result<()> {
    let drive = Arc::new(
        GoogleDrive::new(GoogleDriveConfig {
            root_folder: config.root_folder.clone(),
            credentials_path: config.credentials_path.clone(),
            token_path: config.token_path.clone(),
        })
        .context("invalid drive settings")?,
    );

    let commands = DriveCommands::new(
        drive.clone(),
        drive.clone(),
        Arc::new(DriveState::new()),
        Settings::from(&config),
    );

    if drive.connect().await {
        match commands.navigator().initialize_root().await {
            Ok(root) => info!("serving drive folder {}", root),
            Err(e) => warn!("could not load the root folder: {}", e),
        }
    } else {
        warn!("drive not authenticated, waiting for /authenticate");
    }

    let rest = DiscordRest::new(&config.discord_token)?;
    let bot = Arc::new(Bot {
        commands,
        io: DiscordIo::new(rest),
        pages: PageStore::default(),
        config: config.clone(),
    });

    let (event_tx, mut event_rx) = mpsc::channel::<GatewayEvent>(64);
    connection::run_gateway(config.clone(), event_tx);

    info!("bot running, press Ctrl+C to stop");

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(GatewayEvent::Ready { application_id, .. }) => {
                        let result = bot
                            .io
                            .rest()
                            .register_commands(application_id, config.guild_id, &definitions::slash_commands())
                            .await;
                        match result {
                            Ok(()) => info!("slash commands registered"),
                            Err(e) => error!("failed to register slash commands: {:#}", e),
                        }
                    }
                    Some(GatewayEvent::Interaction(interaction)) => {
                        let bot = bot.clone();
                        tokio::spawn(async move {
                            interactions::handle(bot, *interaction).await;
                        });
                    }
                    Some(GatewayEvent::DirectMessage(message)) => {
                        if !bot.io.deliver_direct(&message) {
                            info!("ignoring DM from user {}", message.author.id);
                        }
                    }
                    Some(GatewayEvent::Disconnected) => {
                        warn!("disconnected from gateway, will reconnect...");
                    }
                    None => {
                        info!("event channel closed, shutting down");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down");
                break;
            }
        }
    }

    Ok(())
}
