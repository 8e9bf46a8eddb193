use drive_remote::RemoteError;
use thiserror::Error;

use crate::embed::{Embed, Reply};
use crate::history::HistoryError;
use crate::resolver::NavError;

pub const AUTHENTICATE_PROMPT: &str =
    "Please use `/authenticate` to validate your Google Account's credentials before using any commands!";

/// Failures a command reports back to the invoking user
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("drive is not authenticated")]
    NotAuthenticated,
    #[error("already at the root directory")]
    AtRoot,
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("requested {requested} history entries, {available} available")]
    InsufficientHistory { requested: usize, available: usize },
    #[error("missing administrator permission")]
    MissingPermission,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("folder creation failed: {0}")]
    CreateFolder(RemoteError),
    #[error("could not deliver to {0}")]
    Delivery(String),
    #[error("remote drive failure: {0}")]
    Remote(RemoteError),
}

impl From<RemoteError> for CommandError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::NotAuthenticated => CommandError::NotAuthenticated,
            other => CommandError::Remote(other),
        }
    }
}

impl From<NavError> for CommandError {
    fn from(e: NavError) -> Self {
        match e {
            NavError::NotAuthenticated => CommandError::NotAuthenticated,
            NavError::AtRoot => CommandError::AtRoot,
            NavError::PathNotFound(p) => CommandError::PathNotFound(p),
            NavError::Remote(e) => e.into(),
        }
    }
}

impl From<HistoryError> for CommandError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::Insufficient {
                requested,
                available,
            } => CommandError::InsufficientHistory {
                requested,
                available,
            },
        }
    }
}

impl CommandError {
    /// Text shown to the user
    pub fn user_message(&self) -> String {
        match self {
            CommandError::NotAuthenticated => AUTHENTICATE_PROMPT.to_string(),
            CommandError::AtRoot => "You are in the root directory.".to_string(),
            CommandError::PathNotFound(p) => {
                format!("{} is not reachable from your current directory.", p)
            }
            CommandError::FileNotFound(name) => {
                format!("{} was not found in your current directory.", name)
            }
            CommandError::InsufficientHistory {
                requested,
                available,
            } => format!(
                "Error retrieving commands: asked for {} but only {} are recorded.",
                requested, available
            ),
            CommandError::MissingPermission => {
                "You are missing permission(s) to run this command.".to_string()
            }
            CommandError::InvalidArgument(msg) => msg.clone(),
            CommandError::CreateFolder(_) => "Could not create folder.".to_string(),
            CommandError::Delivery(who) => format!("Could not send the file to {}.", who),
            CommandError::Remote(_) => {
                "Something went wrong talking to Google Drive. Please try again.".to_string()
            }
        }
    }

    /// Render as a reply. Navigation errors go into the command's embed;
    /// everything else is plain text.
    ///
    /// Only a failed `mkdir` is shown to the channel.
    pub fn to_reply(&self, embed: Embed) -> Reply {
        match self {
            CommandError::AtRoot | CommandError::PathNotFound(_) | CommandError::FileNotFound(_) => {
                Reply::embed(embed.note(self.user_message())).ephemeral(true)
            }
            CommandError::CreateFolder(_) => Reply::embed(embed.note(self.user_message())),
            _ => Reply::text(self.user_message()).ephemeral(true),
        }
    }
}
