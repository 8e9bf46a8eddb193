use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// --- Gateway opcodes ---

pub const DISPATCH: u8 = 0;
pub const HEARTBEAT: u8 = 1;
pub const IDENTIFY: u8 = 2;
pub const RECONNECT: u8 = 7;
pub const INVALID_SESSION: u8 = 9;
pub const HELLO: u8 = 10;
pub const HEARTBEAT_ACK: u8 = 11;

// --- Gateway intents ---

pub const INTENT_GUILDS: u64 = 1 << 0;
pub const INTENT_DIRECT_MESSAGES: u64 = 1 << 12;
pub const INTENT_MESSAGE_CONTENT: u64 = 1 << 15;

// --- Interaction types ---

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_COMMAND: u8 = 2;
pub const INTERACTION_COMPONENT: u8 = 3;
pub const INTERACTION_AUTOCOMPLETE: u8 = 4;

// --- Interaction callback types ---

pub const CALLBACK_MESSAGE: u8 = 4;
pub const CALLBACK_DEFERRED_MESSAGE: u8 = 5;
pub const CALLBACK_DEFERRED_UPDATE: u8 = 6;
pub const CALLBACK_UPDATE_MESSAGE: u8 = 7;
pub const CALLBACK_AUTOCOMPLETE: u8 = 8;

/// Message flag: only the invoking user sees the message
pub const FLAG_EPHEMERAL: u64 = 1 << 6;

/// Member permission bit for administrators
pub const PERMISSION_ADMINISTRATOR: u64 = 1 << 3;

const CDN: &str = "https://cdn.discordapp.com";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("payload for op {0} has no data")]
    MissingData(u8),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ids arrive as decimal strings
pub mod snowflake {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(d)? {
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
            Raw::Number(n) => Ok(n),
        }
    }

    pub mod option {
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super")] u64);
            Ok(Option::<Wrapper>::deserialize(d)?.map(|w| w.0))
        }
    }
}

/// Envelope of every gateway frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    pub fn new<T: Serialize>(op: u8, data: &T) -> Result<Self, ProtocolError> {
        Ok(Self {
            op,
            d: Some(serde_json::to_value(data)?),
            s: None,
            t: None,
        })
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the `d` field
    pub fn data<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ProtocolError> {
        let d = self.d.clone().ok_or(ProtocolError::MissingData(self.op))?;
        Ok(serde_json::from_value(d)?)
    }
}

/// Heartbeat carrying the last sequence number seen
pub fn heartbeat(sequence: Option<u64>) -> GatewayPayload {
    GatewayPayload {
        op: HEARTBEAT,
        d: Some(sequence.map_or(Value::Null, Value::from)),
        s: None,
        t: None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identify {
    pub token: String,
    pub intents: u64,
    pub properties: IdentifyProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Identify {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            intents: INTENT_GUILDS | INTENT_DIRECT_MESSAGES | INTENT_MESSAGE_CONTENT,
            properties: IdentifyProperties {
                os: std::env::consts::OS.to_string(),
                browser: env!("CARGO_PKG_NAME").to_string(),
                device: env!("CARGO_PKG_NAME").to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub user: User,
    pub application: ReadyApplication,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyApplication {
    #[serde(with = "snowflake")]
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(with = "snowflake")]
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) => format!("{}/avatars/{}/{}.png", CDN, self.id, hash),
            None => format!("{}/embed/avatars/{}.png", CDN, (self.id >> 22) % 6),
        }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    /// Permission bitset as a decimal string
    #[serde(default)]
    pub permissions: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    #[serde(with = "snowflake")]
    pub id: u64,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub url: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resolved {
    #[serde(default)]
    pub attachments: std::collections::HashMap<String, Attachment>,
    #[serde(default)]
    pub users: std::collections::HashMap<String, User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub focused: bool,
}

impl CommandOption {
    /// Value as text; numbers and booleans are stringified
    pub fn text(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub resolved: Resolved,
    /// Set for component interactions
    #[serde(default)]
    pub custom_id: Option<String>,
}

impl InteractionData {
    pub fn option(&self, name: &str) -> Option<&CommandOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn focused(&self) -> Option<&CommandOption> {
        self.options.iter().find(|o| o.focused)
    }

    pub fn attachment(&self, option: &str) -> Option<&Attachment> {
        let id = self.option(option)?.text()?;
        self.resolved.attachments.get(&id)
    }

    pub fn user(&self, option: &str) -> Option<&User> {
        let id = self.option(option)?.text()?;
        self.resolved.users.get(&id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionMessage {
    #[serde(with = "snowflake")]
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    #[serde(with = "snowflake")]
    pub id: u64,
    #[serde(with = "snowflake")]
    pub application_id: u64,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default, deserialize_with = "snowflake::option::deserialize")]
    pub guild_id: Option<u64>,
    #[serde(default, deserialize_with = "snowflake::option::deserialize")]
    pub channel_id: Option<u64>,
    #[serde(default)]
    pub member: Option<Member>,
    /// Set instead of `member` outside guilds
    #[serde(default)]
    pub user: Option<User>,
    pub token: String,
    #[serde(default)]
    pub message: Option<InteractionMessage>,
    /// Largest attachment the bot may send here, in bytes
    #[serde(default)]
    pub attachment_size_limit: Option<u64>,
}

impl Interaction {
    /// The invoking user
    pub fn invoker(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }

    pub fn is_admin(&self) -> bool {
        self.member
            .as_ref()
            .and_then(|m| m.permissions.as_deref())
            .and_then(|p| p.parse::<u64>().ok())
            .is_some_and(|bits| bits & PERMISSION_ADMINISTRATOR != 0)
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref()?.name.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreate {
    #[serde(with = "snowflake")]
    pub id: u64,
    #[serde(with = "snowflake")]
    pub channel_id: u64,
    #[serde(default, deserialize_with = "snowflake::option::deserialize")]
    pub guild_id: Option<u64>,
    pub author: User,
    #[serde(default)]
    pub content: String,
}

impl MessageCreate {
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }
}
