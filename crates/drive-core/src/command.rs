use std::time::Duration;

use crate::error::CommandError;
use crate::protocol::{Attachment, InteractionData, User};
use crate::transfer::ShareTimeout;

pub const HELP_COMMAND: &str = "discord_drive_commands";
pub const HISTORY_COMMAND: &str = "getn";

/// A parsed slash command
#[derive(Debug, Clone, PartialEq)]
pub enum DriveCommand {
    Pwd,
    Cd { path: String },
    Ls,
    Mkdir { name: String },
    Upload(Attachment),
    Download {
        name: String,
        timeout: ShareTimeout,
        public: bool,
    },
    Share {
        name: String,
        recipient: User,
        timeout: ShareTimeout,
    },
    Authenticate,
    History { count: usize },
    Help,
}

fn required(data: &InteractionData, option: &str) -> Result<String, CommandError> {
    data.option(option)
        .and_then(|o| o.text())
        .ok_or_else(|| CommandError::InvalidArgument(format!("`{}` is required.", option)))
}

fn timeout(data: &InteractionData, default: Duration) -> Result<ShareTimeout, CommandError> {
    match data.option("timeout").and_then(|o| o.text()) {
        Some(raw) => ShareTimeout::parse(&raw),
        None => Ok(ShareTimeout::After(default)),
    }
}

impl DriveCommand {
    /// `default_timeout` applies when download/share omit a timeout
    pub fn from_interaction(
        data: &InteractionData,
        default_timeout: Duration,
    ) -> Result<Self, CommandError> {
        let name = data.name.as_deref().unwrap_or_default();
        let command = match name {
            "pwd" => DriveCommand::Pwd,
            "cd" => DriveCommand::Cd {
                path: data
                    .option("path")
                    .and_then(|o| o.text())
                    .unwrap_or_default(),
            },
            "ls" => DriveCommand::Ls,
            "mkdir" => DriveCommand::Mkdir {
                name: required(data, "folder_name")?,
            },
            "upload" => DriveCommand::Upload(
                data.attachment("file")
                    .cloned()
                    .ok_or_else(|| CommandError::InvalidArgument("An attachment is required.".into()))?,
            ),
            "download" => DriveCommand::Download {
                name: required(data, "name")?,
                timeout: timeout(data, default_timeout)?,
                public: data
                    .option("public")
                    .and_then(|o| o.value.as_ref())
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            },
            "share" => DriveCommand::Share {
                name: required(data, "name")?,
                recipient: data
                    .user("user")
                    .cloned()
                    .ok_or_else(|| CommandError::InvalidArgument("A recipient is required.".into()))?,
                timeout: timeout(data, default_timeout)?,
            },
            "authenticate" => DriveCommand::Authenticate,
            HISTORY_COMMAND => {
                let raw = required(data, "n")?;
                let count = raw.parse().map_err(|_| {
                    CommandError::InvalidArgument(format!("`{}` is not a valid count.", raw))
                })?;
                DriveCommand::History { count }
            }
            HELP_COMMAND => DriveCommand::Help,
            other => {
                return Err(CommandError::InvalidArgument(format!(
                    "Unknown command `{}`.",
                    other
                )))
            }
        };
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DriveCommand::Pwd => "pwd",
            DriveCommand::Cd { .. } => "cd",
            DriveCommand::Ls => "ls",
            DriveCommand::Mkdir { .. } => "mkdir",
            DriveCommand::Upload(_) => "upload",
            DriveCommand::Download { .. } => "download",
            DriveCommand::Share { .. } => "share",
            DriveCommand::Authenticate => "authenticate",
            DriveCommand::History { .. } => HISTORY_COMMAND,
            DriveCommand::Help => HELP_COMMAND,
        }
    }

    /// Arguments as recorded in the command history
    pub fn params(&self) -> Vec<(String, String)> {
        fn timeout_text(t: &ShareTimeout) -> String {
            match t {
                ShareTimeout::After(d) => format!("{}", d.as_secs_f64()),
                ShareTimeout::Never => "inf".to_string(),
            }
        }
        match self {
            DriveCommand::Cd { path } => vec![("path".into(), path.clone())],
            DriveCommand::Mkdir { name } => vec![("folder_name".into(), name.clone())],
            DriveCommand::Upload(a) => vec![("file".into(), a.filename.clone())],
            DriveCommand::Download {
                name,
                timeout,
                public,
            } => vec![
                ("name".into(), name.clone()),
                ("timeout".into(), timeout_text(timeout)),
                ("public".into(), public.to_string()),
            ],
            DriveCommand::Share {
                name,
                recipient,
                timeout,
            } => vec![
                ("name".into(), name.clone()),
                ("user".into(), recipient.id.to_string()),
                ("timeout".into(), timeout_text(timeout)),
            ],
            DriveCommand::History { count } => vec![("n".into(), count.to_string())],
            DriveCommand::Pwd | DriveCommand::Ls | DriveCommand::Authenticate | DriveCommand::Help => {
                Vec::new()
            }
        }
    }

    /// Embed title for the reply
    pub fn title(&self) -> String {
        match self {
            DriveCommand::Pwd => "Current Working Directory".into(),
            DriveCommand::Cd { .. } => "Change Directory".into(),
            DriveCommand::Ls => "Directory Listing".into(),
            DriveCommand::Mkdir { .. } => "Make Directory".into(),
            DriveCommand::Upload(_) => "Upload Files".into(),
            DriveCommand::Download { name, .. } => format!("{} download", name),
            DriveCommand::Share { name, .. } => format!("Sharing {}", name),
            DriveCommand::Authenticate => "Check your DMs!".into(),
            DriveCommand::History { .. } => "Command History".into(),
            DriveCommand::Help => "Commands List".into(),
        }
    }

    /// Whether the reply is visible to the invoking user only
    pub fn is_ephemeral(&self) -> bool {
        match self {
            DriveCommand::Pwd
            | DriveCommand::Cd { .. }
            | DriveCommand::Ls
            | DriveCommand::Share { .. }
            | DriveCommand::History { .. } => true,
            DriveCommand::Download { public, .. } => !public,
            DriveCommand::Mkdir { .. }
            | DriveCommand::Upload(_)
            | DriveCommand::Authenticate
            | DriveCommand::Help => false,
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            DriveCommand::Mkdir { .. } | DriveCommand::Authenticate | DriveCommand::History { .. }
        )
    }

    /// False for the commands usable before the drive is authenticated
    pub fn needs_drive(&self) -> bool {
        !matches!(self, DriveCommand::Authenticate | DriveCommand::Help)
    }
}
