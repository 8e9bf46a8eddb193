use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use drive_remote::{DriveAuth, RemoteDrive, RemoteError, Retrieved};
use tracing::{debug, error, info, warn};

use crate::chat::ChatIo;
use crate::command::DriveCommand;
use crate::config::BotConfig;
use crate::definitions::HELP_LINES;
use crate::embed::{Embed, Reply};
use crate::error::CommandError;
use crate::format::{expiry_text, listing_row};
use crate::history::{CommandHistory, CommandRecord};
use crate::protocol::{Interaction, User};
use crate::resolver::{Navigator, Transition};
use crate::rest::MAX_CHOICES;
use crate::state::{DriveState, UserId, UserSession};
use crate::transfer::{schedule_revoke, upload_attachment, ShareTimeout};

const QUICKSTART_URL: &str = "https://developers.google.com/drive/api/quickstart/python";

const MISSING_CREDENTIALS: &str = "credentials.json was not found or could not be processed, please ensure that you have generated the file correctly with Google Cloud and that it is in the working directory.";

/// Who ran a command and how their replies should look
#[derive(Debug, Clone)]
pub struct Invocation {
    pub user_id: UserId,
    pub user_name: String,
    pub avatar_url: Option<String>,
    /// Embed colour sampled from the avatar
    pub colour: u32,
    pub is_admin: bool,
    /// Largest file that may be attached to a reply
    pub upload_limit: u64,
}

impl Invocation {
    pub fn from_interaction(interaction: &Interaction, colour: u32, default_limit: u64) -> Option<Self> {
        let user: &User = interaction.invoker()?;
        Some(Self {
            user_id: user.id,
            user_name: user.display_name().to_string(),
            avatar_url: Some(user.avatar_url()),
            colour,
            is_admin: interaction.is_admin(),
            upload_limit: interaction.attachment_size_limit.unwrap_or(default_limit),
        })
    }

    fn embed(&self, title: impl Into<String>) -> Embed {
        Embed::titled(title)
            .colour(self.colour)
            .author(&self.user_name, self.avatar_url.clone())
    }
}

/// Dispatcher knobs taken from [`BotConfig`]
#[derive(Debug, Clone)]
pub struct Settings {
    pub page_size: usize,
    pub history_capacity: usize,
    pub auth_code_timeout: Duration,
}

impl From<&BotConfig> for Settings {
    fn from(config: &BotConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            history_capacity: config.history_capacity,
            auth_code_timeout: config.auth_code_timeout(),
        }
    }
}

/// Runs slash commands against the drive and the navigation state
pub struct DriveCommands {
    drive: Arc<dyn RemoteDrive>,
    auth: Arc<dyn DriveAuth>,
    navigator: Navigator,
    history: Mutex<CommandHistory>,
    settings: Settings,
}

impl DriveCommands {
    pub fn new(
        drive: Arc<dyn RemoteDrive>,
        auth: Arc<dyn DriveAuth>,
        state: Arc<DriveState>,
        settings: Settings,
    ) -> Self {
        Self {
            navigator: Navigator::new(drive.clone(), state),
            drive,
            auth,
            history: Mutex::new(CommandHistory::new(settings.history_capacity)),
            settings,
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Run one command to completion and render the outcome
    pub async fn execute(&self, inv: &Invocation, cmd: DriveCommand, io: &dyn ChatIo) -> Reply {
        debug!("user {} runs /{}", inv.user_id, cmd.name());
        match self.run(inv, &cmd, io).await {
            Ok(reply) => {
                if let Ok(mut history) = self.history.lock() {
                    history.record(inv.user_id, CommandRecord::new(cmd.name(), cmd.params()));
                }
                reply
            }
            Err(e) => {
                match &e {
                    CommandError::Remote(_) | CommandError::CreateFolder(_) | CommandError::Delivery(_) => {
                        error!("/{} for user {} failed: {:#}", cmd.name(), inv.user_id, e)
                    }
                    _ => debug!("/{} for user {} rejected: {}", cmd.name(), inv.user_id, e),
                }
                e.to_reply(inv.embed(cmd.title()))
            }
        }
    }

    async fn run(&self, inv: &Invocation, cmd: &DriveCommand, io: &dyn ChatIo) -> Result<Reply, CommandError> {
        if cmd.requires_admin() && !inv.is_admin {
            return Err(CommandError::MissingPermission);
        }
        if cmd.needs_drive() && !self.drive.is_authenticated() {
            return Err(CommandError::NotAuthenticated);
        }

        match cmd {
            DriveCommand::Help => return Ok(self.help(inv)),
            DriveCommand::Authenticate => return self.authenticate(inv, io).await,
            DriveCommand::History { count } => return self.show_history(inv, *count),
            _ => {}
        }

        self.navigator.ensure_root().await?;
        let mut session = self
            .navigator
            .state()
            .lock_session(inv.user_id)
            .await
            .ok_or(CommandError::NotAuthenticated)?;

        match cmd {
            DriveCommand::Pwd => self.pwd(inv, &session).await,
            DriveCommand::Cd { path } => self.cd(inv, &mut session, path).await,
            DriveCommand::Ls => self.ls(inv, &session).await,
            DriveCommand::Mkdir { name } => self.mkdir(inv, &session, name).await,
            DriveCommand::Upload(attachment) => {
                let data = io
                    .fetch_attachment(&attachment.url)
                    .await
                    .map_err(|e| RemoteError::Transport(format!("{:#}", e)))?;
                self.upload(inv, &session, &attachment.filename, attachment.content_type.as_deref(), data)
                    .await
            }
            DriveCommand::Download {
                name,
                timeout,
                public,
            } => self.download(inv, &session, name, *timeout, *public).await,
            DriveCommand::Share {
                name,
                recipient,
                timeout,
            } => self.share(inv, &session, name, recipient, *timeout, io).await,
            DriveCommand::Help | DriveCommand::Authenticate | DriveCommand::History { .. } => {
                Ok(Reply::default())
            }
        }
    }

    async fn pwd(&self, inv: &Invocation, session: &UserSession) -> Result<Reply, CommandError> {
        self.navigator.refresh(&session.current).await?;
        let entry = self
            .navigator
            .state()
            .entry(&session.current)
            .unwrap_or_default();
        let embed = inv
            .embed("Current Working Directory")
            .description(session.current.to_string())
            .field("Folders", entry.folders.len().to_string(), true)
            .field("Files", entry.files.len().to_string(), true);
        Ok(Reply::embed(embed).ephemeral(true))
    }

    async fn cd(&self, inv: &Invocation, session: &mut UserSession, path: &str) -> Result<Reply, CommandError> {
        let transition = self.navigator.change_directory(session, path).await?;
        let note = match &transition {
            Transition::Moved { to, .. } => format!("Directory changed to `{}`", to),
            Transition::Unchanged(at) => format!("Directory unchanged: `{}`", at),
        };
        Ok(Reply::embed(inv.embed("Change Directory").note(note)).ephemeral(true))
    }

    async fn ls(&self, inv: &Invocation, session: &UserSession) -> Result<Reply, CommandError> {
        let items = self.navigator.refresh(&session.current).await?;
        let rows: Vec<_> = items.iter().map(listing_row).collect();
        let pages = listing_pages(inv, session, &rows, self.settings.page_size);
        Ok(Reply::paged(pages).ephemeral(true))
    }

    async fn mkdir(&self, inv: &Invocation, session: &UserSession, name: &str) -> Result<Reply, CommandError> {
        let parent_id = self.navigator.remote_id(&session.current).await?;
        self.drive
            .create_folder(name, &parent_id)
            .await
            .map_err(CommandError::CreateFolder)?;
        info!("user {} created folder {}/{}", inv.user_id, session.current, name);
        if let Err(e) = self.navigator.refresh(&session.current).await {
            warn!("failed to refresh {} after mkdir: {}", session.current, e);
        }
        let note = format!("Folder {} created at `{}/{}`", name, session.current, name);
        Ok(Reply::embed(inv.embed("Make Directory").note(note)))
    }

    async fn upload(
        &self,
        inv: &Invocation,
        session: &UserSession,
        filename: &str,
        content_type: Option<&str>,
        data: bytes::Bytes,
    ) -> Result<Reply, CommandError> {
        let parent_id = self.navigator.remote_id(&session.current).await?;
        let report = upload_attachment(self.drive.as_ref(), &parent_id, filename, content_type, data).await?;
        if let Err(e) = self.navigator.refresh(&session.current).await {
            warn!("failed to refresh {} after upload: {}", session.current, e);
        }
        let embed = inv
            .embed("Upload Files")
            .note(report.message())
            .footer(session.current.to_string());
        Ok(Reply::embed(embed))
    }

    /// Fetch a file for delivery. Large files become a public link that is
    /// revoked once the timeout passes.
    async fn retrieve(
        &self,
        inv: &Invocation,
        session: &UserSession,
        name: &str,
        timeout: ShareTimeout,
        embed: Embed,
    ) -> Result<Reply, CommandError> {
        let parent_id = self.navigator.remote_id(&session.current).await?;
        let retrieved = self
            .drive
            .download_or_link(name, &parent_id, inv.upload_limit, timeout.duration())
            .await?;
        let expiry = expiry_text(Utc::now(), timeout.duration());
        let reply = match retrieved {
            Retrieved::NotFound => return Err(CommandError::FileNotFound(name.to_string())),
            Retrieved::Link { file_id, url, .. } => {
                if let Some(after) = timeout.duration() {
                    schedule_revoke(self.drive.clone(), file_id, after);
                }
                Reply::embed(embed.field(
                    "Click below for your file!",
                    format!("{}\nLink expires {}.", url, expiry),
                    true,
                ))
            }
            Retrieved::Inline { name, data } => Reply::embed(embed.field(
                "Download the attached file!",
                format!("File expires {}.", expiry),
                true,
            ))
            .attach(name, data),
        };
        Ok(reply.delete_after(timeout.duration()))
    }

    async fn download(
        &self,
        inv: &Invocation,
        session: &UserSession,
        name: &str,
        timeout: ShareTimeout,
        public: bool,
    ) -> Result<Reply, CommandError> {
        let embed = inv
            .embed(format!("{} download", name))
            .description(session.current.to_string());
        let reply = self.retrieve(inv, session, name, timeout, embed).await?;
        Ok(reply.ephemeral(!public))
    }

    async fn share(
        &self,
        inv: &Invocation,
        session: &UserSession,
        name: &str,
        recipient: &User,
        timeout: ShareTimeout,
        io: &dyn ChatIo,
    ) -> Result<Reply, CommandError> {
        let gift = inv
            .embed(format!("{} has been shared with you!", name))
            .description(format!("From: {}", session.current));
        let delivery = self.retrieve(inv, session, name, timeout, gift).await?;
        io.send_direct(recipient.id, delivery).await.map_err(|e| {
            warn!("DM to {} failed: {:#}", recipient.id, e);
            CommandError::Delivery(recipient.mention())
        })?;
        info!("user {} shared {} with {}", inv.user_id, name, recipient.id);

        let ack = inv
            .embed(format!("Sharing {}", name))
            .description(session.current.to_string())
            .note(format!("File shared with {}!", recipient.mention()));
        Ok(Reply::embed(ack).ephemeral(true))
    }

    async fn authenticate(&self, inv: &Invocation, io: &dyn ChatIo) -> Result<Reply, CommandError> {
        if self.drive.is_authenticated() {
            return Ok(Reply::embed(inv.embed("You are already authenticated!")));
        }

        let challenge = match self.auth.begin() {
            Ok(c) => c,
            Err(e) => {
                warn!("cannot start authorisation: {}", e);
                let embed = inv.embed(MISSING_CREDENTIALS).note(format!(
                    "[Google Drive Developer quick-start instructions]({})",
                    QUICKSTART_URL
                ));
                return Ok(Reply::embed(embed));
            }
        };

        let prompt = format!(
            "Please go to [this URL]({}) and respond with the authorization code.",
            challenge.url
        );
        let answer = io
            .prompt_direct(inv.user_id, &prompt, self.settings.auth_code_timeout)
            .await
            .map_err(|e| {
                warn!("could not DM user {}: {:#}", inv.user_id, e);
                CommandError::Delivery(format!("<@{}>", inv.user_id))
            })?;
        let Some(answer) = answer else {
            info!("authorisation by user {} timed out", inv.user_id);
            return Ok(Reply::embed(inv.embed("Authentication timed out, please try again.")));
        };

        self.auth.complete(&challenge, &answer).await?;
        self.navigator.initialize_root().await?;
        info!("drive authenticated by user {}", inv.user_id);

        let done = inv.embed("Authentication Complete!");
        if let Err(e) = io.send_direct(inv.user_id, Reply::embed(done.clone())).await {
            warn!("could not confirm authentication by DM: {:#}", e);
        }
        Ok(Reply::embed(done))
    }

    fn show_history(&self, inv: &Invocation, count: usize) -> Result<Reply, CommandError> {
        let records = self
            .history
            .lock()
            .map_err(|_| CommandError::InvalidArgument("Error retrieving commands".into()))?
            .recent(inv.user_id, count)?;
        let mut embed = inv.embed("Command History");
        for record in &records {
            info!("history for user {}: {}", inv.user_id, record);
            embed = embed.field("", format!("`{}`", record), false);
        }
        Ok(Reply::embed(embed.footer("Commands printed")).ephemeral(true))
    }

    fn help(&self, inv: &Invocation) -> Reply {
        let embed = HELP_LINES
            .iter()
            .fold(inv.embed("Commands List"), |e, line| e.field("", *line, false));
        Reply::embed(embed)
    }

    /// Autocomplete choices for `command` from the user's cached listing
    pub fn suggestions(&self, user: UserId, command: &str, typed: &str) -> Vec<String> {
        let state = self.navigator.state();
        let Some(path) = state.current_path(user) else {
            return Vec::new();
        };
        let entry = state.entry(&path).unwrap_or_default();
        let candidates: Vec<String> = match command {
            "cd" => ["~".to_string(), "..".to_string()]
                .into_iter()
                .chain(entry.folders)
                .collect(),
            "download" | "share" => entry.files,
            _ => return Vec::new(),
        };
        filter_choices(candidates, typed)
    }
}

/// Prefix matches first, then substring matches, case-insensitively
pub fn filter_choices(candidates: Vec<String>, typed: &str) -> Vec<String> {
    let needle = typed.to_lowercase();
    let (mut prefix, mut rest): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .filter(|c| c.to_lowercase().contains(&needle))
        .partition(|c| c.to_lowercase().starts_with(&needle));
    prefix.append(&mut rest);
    prefix.truncate(MAX_CHOICES);
    prefix
}

type Row = (String, String, String);

fn listing_pages(inv: &Invocation, session: &UserSession, rows: &[Row], page_size: usize) -> Vec<Embed> {
    if rows.is_empty() {
        return vec![listing_page(inv, session, rows)];
    }
    rows.chunks(page_size)
        .map(|chunk| listing_page(inv, session, chunk))
        .collect()
}

fn listing_page(inv: &Invocation, session: &UserSession, rows: &[Row]) -> Embed {
    let mut names = Vec::with_capacity(rows.len());
    let mut sizes = Vec::with_capacity(rows.len());
    let mut kinds = Vec::with_capacity(rows.len());
    for (name, size, kind) in rows {
        names.push(name.as_str());
        sizes.push(size.as_str());
        kinds.push(kind.as_str());
    }
    inv.embed(session.current.name())
        .description(format!("Path: {}", session.current))
        .field("Name", names.join("\n"), true)
        .field("Size", sizes.join("\n"), true)
        .field("Kind", kinds.join("\n"), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Attachment;
    use crate::testing::{FakeAuth, FakeDrive, FakeIo};
    use bytes::Bytes;
    use std::sync::atomic::Ordering;

    struct Harness {
        drive: Arc<FakeDrive>,
        auth: Arc<FakeAuth>,
        commands: DriveCommands,
        io: FakeIo,
    }

    fn harness(drive: FakeDrive) -> Harness {
        let drive = Arc::new(drive);
        let auth = Arc::new(FakeAuth::new(drive.clone()));
        let commands = DriveCommands::new(
            drive.clone(),
            auth.clone(),
            Arc::new(DriveState::new()),
            Settings::from(&BotConfig::default()),
        );
        Harness {
            drive,
            auth,
            commands,
            io: FakeIo::default(),
        }
    }

    fn user(id: UserId, admin: bool) -> Invocation {
        Invocation {
            user_id: id,
            user_name: format!("user{}", id),
            avatar_url: None,
            colour: 0x112233,
            is_admin: admin,
            upload_limit: 1024,
        }
    }

    fn cd(path: &str) -> DriveCommand {
        DriveCommand::Cd { path: path.into() }
    }

    impl Harness {
        async fn run(&self, inv: &Invocation, cmd: DriveCommand) -> Reply {
            self.commands.execute(inv, cmd, &self.io).await
        }

        fn current(&self, user: UserId) -> String {
            self.commands
                .navigator()
                .state()
                .peek_session(user)
                .unwrap()
                .current
                .to_string()
        }
    }

    #[tokio::test]
    async fn test_navigation_scenario() {
        let h = harness(FakeDrive::sample());
        let u = user(1, false);

        let reply = h.run(&u, cd("A")).await;
        assert_eq!(reply.embeds[0].field_values(), vec!["Directory changed to `R/A`"]);
        h.run(&u, cd("..")).await;
        assert_eq!(h.current(1), "R");
        h.run(&u, cd("-")).await;
        assert_eq!(h.current(1), "R/A");

        let reply = h.run(&u, cd(".")).await;
        assert_eq!(reply.embeds[0].field_values(), vec!["Directory unchanged: `R/A`"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_commands_from_one_user_serialise() {
        let h = harness(FakeDrive::sample());
        let u = user(1, false);
        h.run(&u, cd("A")).await;
        h.run(&u, cd("Deep")).await;
        assert_eq!(h.current(1), "R/A/Deep");

        h.drive.list_delay_ms.store(50, Ordering::SeqCst);
        let (first, second) = tokio::join!(h.run(&u, cd("..")), h.run(&u, cd("..")));
        assert_eq!(first.embeds[0].field_values(), vec!["Directory changed to `R/A`"]);
        assert_eq!(second.embeds[0].field_values(), vec!["Directory changed to `R`"]);

        let session = h.commands.navigator().state().peek_session(1).unwrap();
        assert_eq!(session.current.to_string(), "R");
        assert_eq!(session.previous.to_string(), "R/A");
    }

    #[tokio::test]
    async fn test_users_navigate_independently() {
        let h = harness(FakeDrive::sample());
        h.run(&user(1, false), cd("A")).await;
        h.run(&user(2, false), cd("B")).await;
        assert_eq!(h.current(1), "R/A");
        assert_eq!(h.current(2), "R/B");
    }

    #[tokio::test]
    async fn test_cd_errors_are_rendered() {
        let h = harness(FakeDrive::sample());
        let u = user(1, false);
        let reply = h.run(&u, cd("..")).await;
        assert_eq!(reply.embeds[0].title.as_deref(), Some("Change Directory"));
        assert_eq!(reply.embeds[0].field_values(), vec!["You are in the root directory."]);

        let reply = h.run(&u, cd("nonexistent")).await;
        assert_eq!(
            reply.embeds[0].field_values(),
            vec!["nonexistent is not reachable from your current directory."]
        );
        assert_eq!(h.current(1), "R");
    }

    #[tokio::test]
    async fn test_unauthenticated_commands_prompt() {
        let drive = FakeDrive::sample();
        drive.authenticated.store(false, Ordering::SeqCst);
        let h = harness(drive);
        let reply = h.run(&user(1, false), DriveCommand::Ls).await;
        assert_eq!(reply.content.as_deref(), Some(crate::error::AUTHENTICATE_PROMPT));

        let help = h.run(&user(1, false), DriveCommand::Help).await;
        assert_eq!(help.embeds[0].fields.len(), HELP_LINES.len());
    }

    #[tokio::test]
    async fn test_pwd_counts() {
        let h = harness(FakeDrive::sample());
        let u = user(1, false);
        h.run(&u, cd("A")).await;
        let reply = h.run(&u, DriveCommand::Pwd).await;
        let embed = &reply.embeds[0];
        assert_eq!(embed.description.as_deref(), Some("R/A"));
        assert_eq!(embed.field_values(), vec!["1", "1"]);
        assert!(reply.ephemeral);
    }

    #[tokio::test]
    async fn test_ls_paginates() {
        let drive = FakeDrive::new();
        for i in 0..23 {
            drive.add_file("root", &format!("f{:02}.txt", i), "text/plain", b"abc");
        }
        let h = harness(drive);
        let reply = h.run(&user(1, false), DriveCommand::Ls).await;
        assert_eq!(reply.page_count(), 3);
        let first = &reply.embeds[0];
        assert_eq!(first.title.as_deref(), Some("R"));
        assert_eq!(first.description.as_deref(), Some("Path: R"));
        assert_eq!(first.fields[0].value.lines().count(), 10);
        assert!(first.fields[0].value.starts_with("\u{1F4C4} f00"));
        assert_eq!(first.fields[1].value.lines().next(), Some("3.0 B"));
        assert_eq!(reply.pages[1].fields[0].value.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_mkdir_requires_admin_and_refreshes() {
        let h = harness(FakeDrive::sample());
        let reply = h
            .run(&user(1, false), DriveCommand::Mkdir { name: "New".into() })
            .await;
        assert_eq!(
            reply.content.as_deref(),
            Some("You are missing permission(s) to run this command.")
        );

        let reply = h
            .run(&user(1, true), DriveCommand::Mkdir { name: "New".into() })
            .await;
        assert_eq!(reply.embeds[0].field_values(), vec!["Folder New created at `R/New`"]);
        assert_eq!(h.commands.suggestions(1, "cd", "n"), vec!["New"]);
        h.run(&user(1, true), cd("New")).await;
        assert_eq!(h.current(1), "R/New");
    }

    #[tokio::test]
    async fn test_upload_into_current_directory() {
        let h = harness(FakeDrive::sample());
        let u = user(1, false);
        h.run(&u, cd("B")).await;
        h.io.attachments
            .lock()
            .unwrap()
            .insert("https://cdn.test/a.pdf".into(), Bytes::from_static(b"%PDF"));
        let reply = h
            .run(
                &u,
                DriveCommand::Upload(Attachment {
                    id: 1,
                    filename: "a.pdf".into(),
                    content_type: Some("application/pdf".into()),
                    url: "https://cdn.test/a.pdf".into(),
                    size: 4,
                }),
            )
            .await;
        assert_eq!(reply.embeds[0].field_values(), vec!["File `a.pdf` uploaded!"]);
        assert_eq!(reply.embeds[0].footer.as_ref().unwrap().text, "R/B");
        let b = h.drive.id_of("root", "B").unwrap();
        assert_eq!(h.drive.names_in(&b), vec!["a.pdf"]);
        assert_eq!(h.commands.suggestions(1, "download", ""), vec!["a.pdf"]);
    }

    #[tokio::test]
    async fn test_download_small_file_inline() {
        let h = harness(FakeDrive::sample());
        let u = user(1, false);
        h.run(&u, cd("A")).await;
        let reply = h
            .run(
                &u,
                DriveCommand::Download {
                    name: "notes.txt".into(),
                    timeout: ShareTimeout::After(Duration::from_secs(60)),
                    public: false,
                },
            )
            .await;
        assert!(reply.ephemeral);
        assert_eq!(reply.files[0].data, Bytes::from_static(b"hello"));
        assert_eq!(reply.delete_after, Some(Duration::from_secs(60)));
        assert_eq!(reply.embeds[0].fields[0].name, "Download the attached file!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_large_file_links_and_revokes() {
        let drive = FakeDrive::sample();
        drive.add_file("root", "big.bin", "application/octet-stream", &[0u8; 2048]);
        let h = harness(drive);
        let reply = h
            .run(
                &user(1, false),
                DriveCommand::Download {
                    name: "big.bin".into(),
                    timeout: ShareTimeout::After(Duration::from_secs(30)),
                    public: true,
                },
            )
            .await;
        assert!(!reply.ephemeral);
        assert!(reply.files.is_empty());
        assert!(reply.embeds[0].fields[0].value.contains("https://drive.test/file/"));
        assert_eq!(h.drive.shared.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(h.drive.revoked.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_never_expiring_link_is_kept() {
        let drive = FakeDrive::sample();
        drive.add_file("root", "big.bin", "application/octet-stream", &[0u8; 2048]);
        let h = harness(drive);
        let reply = h
            .run(
                &user(1, false),
                DriveCommand::Download {
                    name: "big.bin".into(),
                    timeout: ShareTimeout::Never,
                    public: false,
                },
            )
            .await;
        assert!(reply.embeds[0].fields[0].value.ends_with("Link expires never."));
        assert_eq!(reply.delete_after, None);
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let h = harness(FakeDrive::sample());
        let reply = h
            .run(
                &user(1, false),
                DriveCommand::Download {
                    name: "ghost.txt".into(),
                    timeout: ShareTimeout::Never,
                    public: false,
                },
            )
            .await;
        assert_eq!(
            reply.embeds[0].field_values(),
            vec!["ghost.txt was not found in your current directory."]
        );
    }

    #[tokio::test]
    async fn test_share_sends_dm_and_acknowledges() {
        let h = harness(FakeDrive::sample());
        let u = user(1, false);
        h.run(&u, cd("A")).await;
        let recipient = User {
            id: 42,
            username: "bob".into(),
            global_name: None,
            avatar: None,
            bot: false,
        };
        let reply = h
            .run(
                &u,
                DriveCommand::Share {
                    name: "notes.txt".into(),
                    recipient,
                    timeout: ShareTimeout::After(Duration::from_secs(60)),
                },
            )
            .await;
        assert_eq!(reply.embeds[0].title.as_deref(), Some("Sharing notes.txt"));
        assert_eq!(reply.embeds[0].field_values(), vec!["File shared with <@42>!"]);

        let sent = h.io.sent.lock().unwrap();
        let (to, dm) = &sent[0];
        assert_eq!(*to, 42);
        assert_eq!(
            dm.embeds[0].title.as_deref(),
            Some("notes.txt has been shared with you!")
        );
        assert_eq!(dm.embeds[0].description.as_deref(), Some("From: R/A"));
        assert_eq!(dm.files.len(), 1);
    }

    #[tokio::test]
    async fn test_history_records_successes_only() {
        let h = harness(FakeDrive::sample());
        let admin = user(1, true);
        h.run(&admin, cd("A")).await;
        h.run(&admin, cd("nowhere")).await;
        h.run(&admin, DriveCommand::Pwd).await;

        let reply = h.run(&admin, DriveCommand::History { count: 2 }).await;
        let values = reply.embeds[0].field_values();
        assert_eq!(values.len(), 2);
        assert!(values[0].contains("/pwd"));
        assert!(values[1].contains("/cd path=A"));

        let reply = h.run(&admin, DriveCommand::History { count: 16 }).await;
        assert!(reply.content.unwrap().starts_with("Error retrieving commands"));
    }

    #[tokio::test]
    async fn test_authenticate_flow() {
        let drive = FakeDrive::sample();
        drive.authenticated.store(false, Ordering::SeqCst);
        let h = harness(drive);
        h.io.answers.lock().unwrap().push("4/code".into());

        let reply = h.run(&user(1, true), DriveCommand::Authenticate).await;
        assert_eq!(reply.embeds[0].title.as_deref(), Some("Authentication Complete!"));
        assert_eq!(*h.auth.completed.lock().unwrap(), vec!["4/code".to_string()]);
        assert!(h.io.prompts.lock().unwrap()[0].starts_with("Please go to [this URL]("));
        assert!(h.drive.is_authenticated());
        assert!(h.commands.navigator().state().root().is_some());

        let again = h.run(&user(1, true), DriveCommand::Authenticate).await;
        assert_eq!(again.embeds[0].title.as_deref(), Some("You are already authenticated!"));
    }

    #[tokio::test]
    async fn test_authenticate_without_client_secret() {
        let drive = FakeDrive::sample();
        drive.authenticated.store(false, Ordering::SeqCst);
        let h = harness(drive);
        h.auth.missing_secret.store(true, Ordering::SeqCst);
        let reply = h.run(&user(1, true), DriveCommand::Authenticate).await;
        assert_eq!(reply.embeds[0].title.as_deref(), Some(MISSING_CREDENTIALS));
        assert!(h.io.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_generic() {
        let h = harness(FakeDrive::sample());
        let u = user(1, false);
        h.run(&u, DriveCommand::Pwd).await;
        h.drive.fail_listing.store(true, Ordering::SeqCst);
        let reply = h.run(&u, DriveCommand::Ls).await;
        let text = reply.content.unwrap();
        assert!(text.starts_with("Something went wrong"));
        assert!(!text.contains("backend unavailable"));
    }

    #[test]
    fn test_filter_choices() {
        let names = vec!["Beta".to_string(), "alpha".into(), "Alphabet".into(), "gamma".into()];
        assert_eq!(filter_choices(names.clone(), "AL"), vec!["alpha", "Alphabet"]);
        assert_eq!(filter_choices(names.clone(), "ta"), vec!["Beta"]);
        assert_eq!(filter_choices(names, "").len(), 4);
        let many: Vec<String> = (0..40).map(|i| format!("f{}", i)).collect();
        assert_eq!(filter_choices(many, "f").len(), MAX_CHOICES);
    }

    #[tokio::test]
    async fn test_suggestions_follow_current_directory() {
        let h = harness(FakeDrive::sample());
        let u = user(1, false);
        h.run(&u, DriveCommand::Pwd).await;
        assert_eq!(h.commands.suggestions(1, "cd", ""), vec!["~", "..", "A", "B"]);
        h.run(&u, cd("A")).await;
        assert_eq!(h.commands.suggestions(1, "cd", "d"), vec!["Deep"]);
        assert_eq!(h.commands.suggestions(1, "share", "NO"), vec!["notes.txt"]);
        assert!(h.commands.suggestions(1, "ls", "").is_empty());
    }
}
