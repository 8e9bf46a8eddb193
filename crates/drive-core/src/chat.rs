use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::embed::Reply;
use crate::protocol::MessageCreate;
use crate::rest::DiscordRest;
use crate::state::UserId;

/// Side channels a command needs beyond its own reply
#[async_trait]
pub trait ChatIo: Send + Sync {
    /// Download an uploaded attachment
    async fn fetch_attachment(&self, url: &str) -> Result<Bytes>;

    /// DM `message` to a user and wait for their next DM. `None` on timeout.
    async fn prompt_direct(&self, user: UserId, message: &str, timeout: Duration)
        -> Result<Option<String>>;

    /// DM a reply; honours `Reply::delete_after`
    async fn send_direct(&self, user: UserId, reply: Reply) -> Result<()>;
}

/// [`ChatIo`] over the platform's HTTP API. Direct messages reach it from
/// the gateway through [`DiscordIo::deliver_direct`].
pub struct DiscordIo {
    rest: DiscordRest,
    waiting: Mutex<HashMap<UserId, oneshot::Sender<String>>>,
}

impl DiscordIo {
    pub fn new(rest: DiscordRest) -> Self {
        Self {
            rest,
            waiting: Mutex::new(HashMap::new()),
        }
    }

    pub fn rest(&self) -> &DiscordRest {
        &self.rest
    }

    /// Hand a DM to whoever is waiting on its author. Returns whether
    /// anyone was.
    pub fn deliver_direct(&self, message: &MessageCreate) -> bool {
        if !message.is_direct() || message.author.bot {
            return false;
        }
        let waiter = self
            .waiting
            .lock()
            .ok()
            .and_then(|mut w| w.remove(&message.author.id));
        match waiter {
            Some(tx) => tx.send(message.content.clone()).is_ok(),
            None => false,
        }
    }

    fn register(&self, user: UserId) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut waiting) = self.waiting.lock() {
            if waiting.insert(user, tx).is_some() {
                debug!("replaced pending DM wait for user {}", user);
            }
        }
        rx
    }

    fn unregister(&self, user: UserId) {
        if let Ok(mut waiting) = self.waiting.lock() {
            waiting.remove(&user);
        }
    }
}

#[async_trait]
impl ChatIo for DiscordIo {
    async fn fetch_attachment(&self, url: &str) -> Result<Bytes> {
        self.rest.fetch_bytes(url).await
    }

    async fn prompt_direct(
        &self,
        user: UserId,
        message: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let rx = self.register(user);
        let channel = self.rest.create_dm(user).await?;
        if let Err(e) = self.rest.send_message(channel, &Reply::text(message)).await {
            self.unregister(user);
            return Err(e);
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(answer)) => Ok(Some(answer)),
            Ok(Err(_)) => Ok(None),
            Err(_) => {
                self.unregister(user);
                Ok(None)
            }
        }
    }

    async fn send_direct(&self, user: UserId, reply: Reply) -> Result<()> {
        let channel = self.rest.create_dm(user).await?;
        let message = self.rest.send_message(channel, &reply).await?;
        if let Some(after) = reply.delete_after {
            let rest = self.rest.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                if let Err(e) = rest.delete_message(channel, message).await {
                    warn!("failed to delete expired DM: {:#}", e);
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::User;

    fn dm(author: u64, guild: Option<u64>, bot: bool) -> MessageCreate {
        MessageCreate {
            id: 1,
            channel_id: 2,
            guild_id: guild,
            author: User {
                id: author,
                username: "u".into(),
                global_name: None,
                avatar: None,
                bot,
            },
            content: "code-123".into(),
        }
    }

    #[tokio::test]
    async fn test_direct_message_reaches_waiter() {
        let io = DiscordIo::new(DiscordRest::new("t").unwrap());
        let rx = io.register(9);
        assert!(!io.deliver_direct(&dm(8, None, false)));
        assert!(!io.deliver_direct(&dm(9, Some(1), false)));
        assert!(!io.deliver_direct(&dm(9, None, true)));
        assert!(io.deliver_direct(&dm(9, None, false)));
        assert_eq!(rx.await.unwrap(), "code-123");
        assert!(!io.deliver_direct(&dm(9, None, false)));
    }
}
