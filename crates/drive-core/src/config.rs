use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Chat platform bot token
    #[serde(default)]
    pub discord_token: String,

    /// Register commands for this guild only (global registration otherwise)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,

    /// Share link or id of the Drive folder used as the virtual root
    #[serde(default)]
    pub root_folder: String,

    /// OAuth client secret file
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Persisted OAuth tokens
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Audit entries kept per user
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Rows per `ls` page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Expiry of download/share links and messages in seconds
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,

    /// Inline attachment limit used when the platform reports none
    #[serde(default = "default_upload_size_limit")]
    pub upload_size_limit: u64,

    /// How long `authenticate` waits for the authorization code
    #[serde(default = "default_auth_code_timeout")]
    pub auth_code_timeout_secs: u64,

    /// Reconnect base delay in seconds
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_secs: u64,

    /// Reconnect max delay in seconds
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_secs: u64,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}
fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}
fn default_history_capacity() -> usize {
    15
}
fn default_page_size() -> usize {
    10
}
fn default_timeout() -> u64 {
    60
}
fn default_upload_size_limit() -> u64 {
    8 * 1024 * 1024
}
fn default_auth_code_timeout() -> u64 {
    300
}
fn default_reconnect_base_delay() -> u64 {
    1
}
fn default_reconnect_max_delay() -> u64 {
    60
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,
            root_folder: String::new(),
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            history_capacity: default_history_capacity(),
            page_size: default_page_size(),
            default_timeout_secs: default_timeout(),
            upload_size_limit: default_upload_size_limit(),
            auth_code_timeout_secs: default_auth_code_timeout(),
            reconnect_base_delay_secs: default_reconnect_base_delay(),
            reconnect_max_delay_secs: default_reconnect_max_delay(),
        }
    }
}

impl BotConfig {
    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "discord-drive", "drive-bot") {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("drive-bot-config.json")
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Reject configs the bot cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            bail!("a bot token is required (--discord-token or config file)");
        }
        if self.root_folder.trim().is_empty() {
            bail!("a root folder is required (--root-folder or config file)");
        }
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.history_capacity == 0 {
            bail!("history_capacity must be at least 1");
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn auth_code_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_code_timeout_secs)
    }
}
