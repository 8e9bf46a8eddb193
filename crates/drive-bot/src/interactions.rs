use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, error, warn};

use drive_core::chat::DiscordIo;
use drive_core::colour::{average_colour, DEFAULT_COLOUR};
use drive_core::command::DriveCommand;
use drive_core::config::BotConfig;
use drive_core::dispatcher::{DriveCommands, Invocation};
use drive_core::embed::{Embed, Reply};
use drive_core::pager::{self, PageStore};
use drive_core::protocol::{
    Interaction, User, INTERACTION_AUTOCOMPLETE, INTERACTION_COMMAND, INTERACTION_COMPONENT,
};
use drive_core::state::UserId;

/// Everything an interaction handler needs
pub struct Bot {
    pub commands: DriveCommands,
    pub io: DiscordIo,
    pub pages: PageStore,
    pub config: BotConfig,
}

pub async fn handle(bot: Arc<Bot>, interaction: Interaction) {
    let result = match interaction.kind {
        INTERACTION_COMMAND => run_command(&bot, &interaction).await,
        INTERACTION_AUTOCOMPLETE => autocomplete(&bot, &interaction).await,
        INTERACTION_COMPONENT => turn_page(&bot, &interaction).await,
        other => {
            debug!("ignoring interaction type {}", other);
            Ok(())
        }
    };
    if let Err(e) = result {
        error!("interaction {} failed: {:#}", interaction.id, e);
    }
}

async fn run_command(bot: &Bot, interaction: &Interaction) -> Result<()> {
    let data = interaction.data.as_ref().context("command without data")?;
    let rest = bot.io.rest();

    let command = match DriveCommand::from_interaction(data, bot.config.default_timeout()) {
        Ok(c) => c,
        Err(e) => {
            return rest
                .respond(interaction, &e.to_reply(Embed::default()))
                .await;
        }
    };

    rest.defer(interaction, command.is_ephemeral()).await?;

    let invoker = interaction.invoker().context("interaction without user")?;
    let colour = avatar_colour(bot, invoker).await;
    let invocation = Invocation::from_interaction(interaction, colour, bot.config.upload_size_limit)
        .context("interaction without user")?;

    let reply = bot.commands.execute(&invocation, command, &bot.io).await;
    let components = paginate(&bot.pages, invocation.user_id, &reply);
    rest.edit_original(interaction.application_id, &interaction.token, &reply, components)
        .await?;

    if let Some(after) = reply.delete_after {
        let rest = rest.clone();
        let application_id = interaction.application_id;
        let token = interaction.token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(e) = rest.delete_original(application_id, &token).await {
                warn!("failed to delete expired reply: {:#}", e);
            }
        });
    }
    Ok(())
}

/// Embed colour from the user's avatar
async fn avatar_colour(bot: &Bot, user: &User) -> u32 {
    let data = match bot.io.rest().fetch_bytes(&user.avatar_url()).await {
        Ok(d) => d,
        Err(e) => {
            debug!("avatar fetch failed: {:#}", e);
            return DEFAULT_COLOUR;
        }
    };
    match tokio::task::spawn_blocking(move || average_colour(&data)).await {
        Ok(Ok(colour)) => colour,
        Ok(Err(e)) => {
            debug!("avatar decode failed: {}", e);
            DEFAULT_COLOUR
        }
        Err(e) => {
            warn!("avatar task failed: {}", e);
            DEFAULT_COLOUR
        }
    }
}

/// Keep a multi-page reply for the buttons and return the button row
fn paginate(pages: &PageStore, owner: UserId, reply: &Reply) -> Option<Value> {
    if reply.pages.is_empty() {
        return None;
    }
    let all: Vec<Embed> = reply.embeds.iter().chain(&reply.pages).cloned().collect();
    let total = all.len();
    let key = pages.insert(owner, all);
    Some(pager::buttons(&key, 0, total))
}

async fn autocomplete(bot: &Bot, interaction: &Interaction) -> Result<()> {
    let data = interaction.data.as_ref().context("autocomplete without data")?;
    let user = interaction.invoker().context("interaction without user")?;
    let command = data.name.as_deref().unwrap_or_default();
    let typed = data.focused().and_then(|o| o.text()).unwrap_or_default();
    let choices = bot.commands.suggestions(user.id, command, &typed);
    bot.io.rest().autocomplete(interaction, &choices).await
}

async fn turn_page(bot: &Bot, interaction: &Interaction) -> Result<()> {
    let custom_id = interaction
        .data
        .as_ref()
        .and_then(|d| d.custom_id.as_deref())
        .context("component without custom id")?;
    let user = interaction.invoker().context("interaction without user")?;
    let rest = bot.io.rest();

    let Some((key, index)) = pager::parse_custom_id(custom_id) else {
        debug!("unknown component {}", custom_id);
        return Ok(());
    };
    match bot.pages.page(&key, index, user.id) {
        Some((embed, total)) => {
            rest.update_message(interaction, &embed, pager::buttons(&key, index, total))
                .await
        }
        None => {
            let reply = Reply::text("This listing has expired, run `/ls` again.").ephemeral(true);
            rest.respond(interaction, &reply).await
        }
    }
}
