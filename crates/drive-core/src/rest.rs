use anyhow::{bail, Context, Result};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tracing::debug;

use crate::embed::{Embed, Reply};
use crate::protocol::{
    Interaction, CALLBACK_AUTOCOMPLETE, CALLBACK_DEFERRED_MESSAGE, CALLBACK_MESSAGE,
    CALLBACK_UPDATE_MESSAGE, FLAG_EPHEMERAL,
};

const API_BASE: &str = "https://discord.com/api/v10";

/// Most choices an autocomplete response may carry
pub const MAX_CHOICES: usize = 25;

/// Thin client for the chat platform's HTTP API
#[derive(Clone)]
pub struct DiscordRest {
    http: reqwest::Client,
    token: String,
    base: String,
}

impl DiscordRest {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base(token, API_BASE)
    }

    pub fn with_base(token: &str, base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("DiscordBot (drive-bot, ", env!("CARGO_PKG_VERSION"), ")"))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            token: token.to_string(),
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    /// Replace the bot's slash commands, for one guild or globally
    pub async fn register_commands(
        &self,
        application_id: u64,
        guild_id: Option<u64>,
        commands: &Value,
    ) -> Result<()> {
        let path = match guild_id {
            Some(guild) => format!("/applications/{}/guilds/{}/commands", application_id, guild),
            None => format!("/applications/{}/commands", application_id),
        };
        let resp = self
            .auth(self.http.put(self.url(&path)))
            .json(commands)
            .send()
            .await
            .context("failed to register commands")?;
        check(resp, "register commands").await?;
        Ok(())
    }

    async fn callback(&self, interaction: &Interaction, body: Value) -> Result<()> {
        let path = format!(
            "/interactions/{}/{}/callback",
            interaction.id, interaction.token
        );
        let resp = self
            .http
            .post(self.url(&path))
            .json(&body)
            .send()
            .await
            .context("interaction callback failed")?;
        check(resp, "interaction callback").await?;
        Ok(())
    }

    /// Answer immediately with a message
    pub async fn respond(&self, interaction: &Interaction, reply: &Reply) -> Result<()> {
        let mut data = reply.to_message_json();
        if reply.ephemeral {
            data["flags"] = json!(FLAG_EPHEMERAL);
        }
        self.callback(interaction, json!({ "type": CALLBACK_MESSAGE, "data": data }))
            .await
    }

    /// Acknowledge now, answer later with [`DiscordRest::edit_original`]
    pub async fn defer(&self, interaction: &Interaction, ephemeral: bool) -> Result<()> {
        let flags = if ephemeral { FLAG_EPHEMERAL } else { 0 };
        self.callback(
            interaction,
            json!({ "type": CALLBACK_DEFERRED_MESSAGE, "data": { "flags": flags } }),
        )
        .await
    }

    pub async fn autocomplete(&self, interaction: &Interaction, choices: &[String]) -> Result<()> {
        let choices: Vec<Value> = choices
            .iter()
            .take(MAX_CHOICES)
            .map(|c| json!({ "name": c, "value": c }))
            .collect();
        self.callback(
            interaction,
            json!({ "type": CALLBACK_AUTOCOMPLETE, "data": { "choices": choices } }),
        )
        .await
    }

    /// Replace the message a component belongs to
    pub async fn update_message(
        &self,
        interaction: &Interaction,
        embed: &Embed,
        components: Value,
    ) -> Result<()> {
        self.callback(
            interaction,
            json!({
                "type": CALLBACK_UPDATE_MESSAGE,
                "data": { "embeds": [embed], "components": components },
            }),
        )
        .await
    }

    /// Fill in a deferred response. Returns the message id.
    pub async fn edit_original(
        &self,
        application_id: u64,
        token: &str,
        reply: &Reply,
        components: Option<Value>,
    ) -> Result<u64> {
        let path = format!("/webhooks/{}/{}/messages/@original", application_id, token);
        let mut body = reply.to_message_json();
        if let Some(components) = components {
            body["components"] = components;
        }
        let req = self.http.patch(self.url(&path));
        let resp = with_body(req, body, reply)?
            .send()
            .await
            .context("failed to edit interaction response")?;
        let resp = check(resp, "edit interaction response").await?;
        snowflake_id(resp).await
    }

    pub async fn delete_original(&self, application_id: u64, token: &str) -> Result<()> {
        let path = format!("/webhooks/{}/{}/messages/@original", application_id, token);
        let resp = self
            .http
            .delete(self.url(&path))
            .send()
            .await
            .context("failed to delete interaction response")?;
        check(resp, "delete interaction response").await?;
        Ok(())
    }

    /// Open (or reuse) the DM channel with a user
    pub async fn create_dm(&self, user_id: u64) -> Result<u64> {
        let resp = self
            .auth(self.http.post(self.url("/users/@me/channels")))
            .json(&json!({ "recipient_id": user_id.to_string() }))
            .send()
            .await
            .context("failed to open DM channel")?;
        let resp = check(resp, "open DM channel").await?;
        snowflake_id(resp).await
    }

    pub async fn send_message(&self, channel_id: u64, reply: &Reply) -> Result<u64> {
        let path = format!("/channels/{}/messages", channel_id);
        let req = self.auth(self.http.post(self.url(&path)));
        let resp = with_body(req, reply.to_message_json(), reply)?
            .send()
            .await
            .context("failed to send message")?;
        let resp = check(resp, "send message").await?;
        snowflake_id(resp).await
    }

    pub async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()> {
        let path = format!("/channels/{}/messages/{}", channel_id, message_id);
        let resp = self
            .auth(self.http.delete(self.url(&path)))
            .send()
            .await
            .context("failed to delete message")?;
        check(resp, "delete message").await?;
        Ok(())
    }

    /// Download an attachment or avatar
    pub async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch {}", url))?;
        let resp = check(resp, "fetch").await?;
        let data = resp.bytes().await.context("failed to read body")?;
        debug!("fetched {} bytes from {}", data.len(), url);
        Ok(data)
    }
}

/// JSON body, or multipart when the reply carries files
fn with_body(
    req: reqwest::RequestBuilder,
    body: Value,
    reply: &Reply,
) -> Result<reqwest::RequestBuilder> {
    if reply.files.is_empty() {
        return Ok(req.json(&body));
    }
    let mut form = Form::new().text("payload_json", serde_json::to_string(&body)?);
    for (i, file) in reply.files.iter().enumerate() {
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.name.clone())
            .mime_str(mime_guess::from_path(&file.name).first_or_octet_stream().as_ref())?;
        form = form.part(format!("files[{}]", i), part);
    }
    Ok(req.multipart(form))
}

async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!("{} failed: {} - {}", what, status, body)
}

async fn snowflake_id(resp: reqwest::Response) -> Result<u64> {
    let value: Value = resp.json().await.context("invalid JSON response")?;
    value["id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .context("response has no id")
}
