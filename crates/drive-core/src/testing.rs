// In-memory drive used by unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use drive_remote::{AuthChallenge, DriveAuth, ListQuery, RemoteDrive, RemoteError, RemoteItem};

use crate::chat::ChatIo;
use crate::embed::Reply;
use crate::state::UserId;

struct Node {
    item: RemoteItem,
    parent: Option<String>,
    data: Bytes,
}

pub struct FakeDrive {
    nodes: Mutex<Vec<Node>>,
    next_id: AtomicU64,
    pub authenticated: AtomicBool,
    /// Every listing call fails while set
    pub fail_listing: AtomicBool,
    /// Milliseconds every listing call sleeps before answering
    pub list_delay_ms: AtomicU64,
    pub shared: Mutex<Vec<String>>,
    pub revoked: Mutex<Vec<String>>,
    pub uploads: Mutex<HashMap<String, String>>,
}

impl FakeDrive {
    /// A root folder `R` (id `root`) with no children
    pub fn new() -> Self {
        let drive = Self {
            nodes: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            authenticated: AtomicBool::new(true),
            fail_listing: AtomicBool::new(false),
            list_delay_ms: AtomicU64::new(0),
            shared: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            uploads: Mutex::new(HashMap::new()),
        };
        drive.nodes.lock().unwrap().push(Node {
            item: RemoteItem::folder("root", "R"),
            parent: None,
            data: Bytes::new(),
        });
        drive
    }

    /// `R` containing folders `A` and `B`; `A` holds `notes.txt` and folder `Deep`
    pub fn sample() -> Self {
        let drive = Self::new();
        let a = drive.add_folder("root", "A");
        drive.add_folder("root", "B");
        drive.add_folder(&a, "Deep");
        drive.add_file(&a, "notes.txt", "text/plain", b"hello");
        drive
    }

    fn fresh_id(&self) -> String {
        format!("id{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_folder(&self, parent: &str, name: &str) -> String {
        let id = self.fresh_id();
        self.nodes.lock().unwrap().push(Node {
            item: RemoteItem::folder(id.clone(), name),
            parent: Some(parent.to_string()),
            data: Bytes::new(),
        });
        id
    }

    pub fn add_file(&self, parent: &str, name: &str, mime: &str, data: &[u8]) -> String {
        let id = self.fresh_id();
        self.nodes.lock().unwrap().push(Node {
            item: RemoteItem::file(id.clone(), name, mime, data.len() as u64),
            parent: Some(parent.to_string()),
            data: Bytes::copy_from_slice(data),
        });
        id
    }

    pub fn names_in(&self, parent: &str) -> Vec<String> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.parent.as_deref() == Some(parent))
            .map(|n| n.item.name.clone())
            .collect()
    }

    pub fn id_of(&self, parent: &str, name: &str) -> Option<String> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.parent.as_deref() == Some(parent) && n.item.name == name)
            .map(|n| n.item.id.clone())
    }

    fn ensure_auth(&self) -> Result<(), RemoteError> {
        if self.authenticated.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::NotAuthenticated)
        }
    }
}

#[async_trait]
impl RemoteDrive for FakeDrive {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn root(&self) -> Result<RemoteItem, RemoteError> {
        self.ensure_auth()?;
        Ok(self.nodes.lock().unwrap()[0].item.clone())
    }

    async fn list_children(&self, query: &ListQuery) -> Result<Vec<RemoteItem>, RemoteError> {
        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.ensure_auth()?;
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(RemoteError::status(500, "backend unavailable"));
        }
        let nodes = self.nodes.lock().unwrap();
        let mut out: Vec<RemoteItem> = nodes
            .iter()
            .filter(|n| query.parent_id.is_none() || n.parent == query.parent_id)
            .filter(|n| query.name.as_ref().map_or(true, |name| &n.item.name == name))
            .filter(|n| {
                if n.item.is_folder() {
                    query.include_folders
                } else {
                    query.include_files
                }
            })
            .map(|n| n.item.clone())
            .collect();
        out.sort_by(|a, b| {
            b.is_folder()
                .cmp(&a.is_folder())
                .then_with(|| a.name.cmp(&b.name))
        });
        if !query.recursive {
            out.truncate(query.page_size as usize);
        }
        Ok(out)
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String, RemoteError> {
        self.ensure_auth()?;
        Ok(self.add_folder(parent_id, name))
    }

    async fn upload_file(
        &self,
        data: Bytes,
        name: &str,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<String, RemoteError> {
        self.ensure_auth()?;
        self.add_file(parent_id, name, mime_type, &data);
        self.uploads
            .lock()
            .unwrap()
            .insert(name.to_string(), mime_type.to_string());
        Ok(name.to_string())
    }

    async fn download_file(&self, file_id: &str) -> Result<Bytes, RemoteError> {
        self.ensure_auth()?;
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.item.id == file_id)
            .map(|n| n.data.clone())
            .ok_or_else(|| RemoteError::status(404, "File not found"))
    }

    async fn grant_public_read(
        &self,
        file_id: &str,
        _expires_in: Option<Duration>,
    ) -> Result<String, RemoteError> {
        self.ensure_auth()?;
        self.shared.lock().unwrap().push(file_id.to_string());
        Ok(format!("https://drive.test/file/{}", file_id))
    }

    async fn revoke_link(&self, file_id: &str) -> Result<(), RemoteError> {
        self.revoked.lock().unwrap().push(file_id.to_string());
        Ok(())
    }
}

/// Accepts any code and flips the drive to authenticated
pub struct FakeAuth {
    drive: Arc<FakeDrive>,
    pub missing_secret: AtomicBool,
    pub completed: Mutex<Vec<String>>,
}

impl FakeAuth {
    pub fn new(drive: Arc<FakeDrive>) -> Self {
        Self {
            drive,
            missing_secret: AtomicBool::new(false),
            completed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DriveAuth for FakeAuth {
    fn begin(&self) -> Result<AuthChallenge, RemoteError> {
        if self.missing_secret.load(Ordering::SeqCst) {
            return Err(RemoteError::Credentials("credentials.json not found".into()));
        }
        Ok(AuthChallenge {
            url: "https://accounts.test/auth?state=x".into(),
            verifier: "verifier".into(),
        })
    }

    async fn complete(&self, _challenge: &AuthChallenge, reply: &str) -> Result<(), RemoteError> {
        self.completed.lock().unwrap().push(reply.to_string());
        self.drive.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Records DMs; answers prompts from a queue
#[derive(Default)]
pub struct FakeIo {
    pub attachments: Mutex<HashMap<String, Bytes>>,
    pub answers: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(UserId, Reply)>>,
}

#[async_trait]
impl ChatIo for FakeIo {
    async fn fetch_attachment(&self, url: &str) -> anyhow::Result<Bytes> {
        self.attachments
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .with_context(|| format!("no attachment at {}", url))
    }

    async fn prompt_direct(
        &self,
        _user: UserId,
        message: &str,
        _timeout: Duration,
    ) -> anyhow::Result<Option<String>> {
        self.prompts.lock().unwrap().push(message.to_string());
        Ok(self.answers.lock().unwrap().pop())
    }

    async fn send_direct(&self, user: UserId, reply: Reply) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((user, reply));
        Ok(())
    }
}
