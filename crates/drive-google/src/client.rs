use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use drive_remote::{AuthChallenge, DriveAuth, ListQuery, RemoteDrive, RemoteError, RemoteItem};

use crate::oauth::{self, ClientSecret, OAuthError, TokenSet};
use crate::query::{build_query, parse_folder_id};

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size)";

/// Longest file name the bot will create
const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct GoogleDriveConfig {
    /// Share link or bare id of the folder used as the virtual root
    pub root_folder: String,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

/// Drive v3 client implementing the remote facade
pub struct GoogleDrive {
    http: reqwest::Client,
    root_id: String,
    credentials_path: PathBuf,
    token_path: PathBuf,
    token: RwLock<Option<TokenSet>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<WireFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    id: String,
    name: String,
    mime_type: String,
    #[serde(default)]
    size: Option<String>,
}

impl From<WireFile> for RemoteItem {
    fn from(f: WireFile) -> Self {
        RemoteItem {
            id: f.id,
            name: f.name,
            mime_type: f.mime_type,
            size: f.size.and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl GoogleDrive {
    pub fn new(config: GoogleDriveConfig) -> Result<Self, RemoteError> {
        let root_id = parse_folder_id(&config.root_folder)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            root_id,
            credentials_path: config.credentials_path,
            token_path: config.token_path,
            token: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Bring the session up from the persisted token file, refreshing it if
    /// it has expired. Failures leave the client unauthenticated.
    pub async fn connect(&self) -> bool {
        let token = match TokenSet::load(&self.token_path) {
            Ok(t) => t,
            Err(OAuthError::TokenFile(_)) => {
                info!("no token file at {}, authentication required", self.token_path.display());
                return false;
            }
            Err(e) => {
                warn!("ignoring unreadable token file: {}", e);
                return false;
            }
        };

        let token = if token.is_expired(Utc::now()) {
            match self.refresh_token(&token).await {
                Ok(t) => t,
                Err(e) => {
                    warn!("stored token could not be refreshed: {}", e);
                    return false;
                }
            }
        } else {
            token
        };

        self.set_token(Some(token));
        match self.root().await {
            Ok(root) => {
                info!("found folder '{}' with id '{}'", root.name, root.id);
                true
            }
            Err(e) => {
                error!("root folder lookup failed: {:#}", e);
                self.set_token(None);
                false
            }
        }
    }

    fn set_token(&self, token: Option<TokenSet>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    fn current_token(&self) -> Option<TokenSet> {
        self.token.read().ok().and_then(|t| (*t).clone())
    }

    async fn refresh_token(&self, current: &TokenSet) -> Result<TokenSet, RemoteError> {
        let secret = self.client_secret()?;
        let fresh = oauth::refresh(&self.http, &secret, current)
            .await
            .map_err(oauth_error)?;
        if let Err(e) = fresh.save(&self.token_path) {
            warn!("failed to persist refreshed token: {}", e);
        }
        Ok(fresh)
    }

    fn client_secret(&self) -> Result<ClientSecret, RemoteError> {
        ClientSecret::load(&self.credentials_path).map_err(oauth_error)
    }

    /// A valid bearer token, refreshing under a lock when stale
    async fn access_token(&self) -> Result<String, RemoteError> {
        let token = self.current_token().ok_or(RemoteError::NotAuthenticated)?;
        if !token.is_expired(Utc::now()) {
            return Ok(token.access_token);
        }

        let _guard = self.refresh_lock.lock().await;
        // another task may have refreshed while we waited
        if let Some(t) = self.current_token() {
            if !t.is_expired(Utc::now()) {
                return Ok(t.access_token);
            }
        }
        let fresh = self.refresh_token(&token).await?;
        let access = fresh.access_token.clone();
        self.set_token(Some(fresh));
        Ok(access)
    }

    async fn list_page(
        &self,
        q: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList, RemoteError> {
        let token = self.access_token().await?;
        let page_size = page_size.to_string();
        let mut params = vec![
            ("q", q),
            ("pageSize", page_size.as_str()),
            ("orderBy", "folder, name"),
            ("fields", LIST_FIELDS),
        ];
        if let Some(t) = page_token {
            params.push(("pageToken", t));
        }

        let resp = self
            .http
            .get(format!("{}/files", API_BASE))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(transport)?;
        let resp = check(resp).await?;
        resp.json().await.map_err(decode)
    }
}

#[async_trait]
impl RemoteDrive for GoogleDrive {
    fn is_authenticated(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    async fn root(&self) -> Result<RemoteItem, RemoteError> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/files/{}", API_BASE, self.root_id))
            .bearer_auth(token)
            .query(&[("fields", "id, name, mimeType")])
            .send()
            .await
            .map_err(transport)?;
        let file: WireFile = check(resp).await?.json().await.map_err(decode)?;
        Ok(file.into())
    }

    async fn list_children(&self, query: &ListQuery) -> Result<Vec<RemoteItem>, RemoteError> {
        let q = build_query(query)?;
        debug!("files.list q={}", q);

        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_page(&q, query.page_size, page_token.as_deref())
                .await?;
            items.extend(page.files.into_iter().map(RemoteItem::from));

            match page.next_page_token {
                Some(next) if query.recursive && !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(items)
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String, RemoteError> {
        let token = self.access_token().await?;
        let body = serde_json::json!({
            "name": name,
            "mimeType": drive_remote::item::FOLDER_MIME,
            "parents": [parent_id],
        });
        let resp = self
            .http
            .post(format!("{}/files", API_BASE))
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let created: CreatedFile = check(resp).await?.json().await.map_err(decode)?;
        let id = created
            .id
            .ok_or_else(|| RemoteError::Decode("folder created without id".into()))?;
        info!("created folder {} ({}) under {}", name, id, parent_id);
        Ok(id)
    }

    async fn upload_file(
        &self,
        data: Bytes,
        name: &str,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<String, RemoteError> {
        let token = self.access_token().await?;
        let name: String = name.chars().take(MAX_NAME_CHARS).collect();
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": mime_type,
            "parents": [parent_id],
        });

        let boundary = format!("drive-bot-{}", Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, mime_type, &data);
        let size = data.len();

        let resp = self
            .http
            .post(format!("{}/files", UPLOAD_BASE))
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", "name")])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        let created: CreatedFile = check(resp).await?.json().await.map_err(decode)?;
        let stored = created.name.unwrap_or(name);
        info!("uploaded {} ({} bytes) to {}", stored, size, parent_id);
        Ok(stored)
    }

    async fn download_file(&self, file_id: &str) -> Result<Bytes, RemoteError> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/files/{}", API_BASE, file_id))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?.bytes().await.map_err(transport)
    }

    async fn grant_public_read(
        &self,
        file_id: &str,
        expires_in: Option<Duration>,
    ) -> Result<String, RemoteError> {
        let token = self.access_token().await?;
        if let Some(d) = expires_in {
            // link permissions cannot carry an expiry; the caller revokes instead
            debug!("public link for {} should end in {}s", file_id, d.as_secs());
        }
        let body = serde_json::json!({ "type": "anyone", "role": "reader" });
        let resp = self
            .http
            .post(format!("{}/files/{}/permissions", API_BASE, file_id))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        info!("granted public read on {}", file_id);
        Ok(share_link(file_id))
    }

    async fn revoke_link(&self, file_id: &str) -> Result<(), RemoteError> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .delete(format!(
                "{}/files/{}/permissions/anyoneWithLink",
                API_BASE, file_id
            ))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        info!("revoked public link on {}", file_id);
        Ok(())
    }
}

#[async_trait]
impl DriveAuth for GoogleDrive {
    fn begin(&self) -> Result<AuthChallenge, RemoteError> {
        let secret = self.client_secret()?;
        let verifier = oauth::new_verifier();
        let url = secret.authorization_url(&verifier).map_err(oauth_error)?;
        Ok(AuthChallenge { url, verifier })
    }

    async fn complete(&self, challenge: &AuthChallenge, reply: &str) -> Result<(), RemoteError> {
        let secret = self.client_secret()?;
        let code = oauth::extract_code(reply).map_err(oauth_error)?;
        let token = oauth::exchange_code(&self.http, &secret, &code, &challenge.verifier)
            .await
            .map_err(oauth_error)?;
        if let Err(e) = token.save(&self.token_path) {
            warn!("failed to persist token to {}: {}", self.token_path.display(), e);
        }
        self.set_token(Some(token));

        let root = self.root().await?;
        info!("authenticated; root folder '{}' ({})", root.name, root.id);
        Ok(())
    }
}

pub fn share_link(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{}/view?usp=sharing", file_id)
}

fn multipart_related(
    boundary: &str,
    metadata: &serde_json::Value,
    mime_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(data.len() + 512);
    buf.put_slice(format!("--{}\r\n", boundary).as_bytes());
    buf.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    buf.put_slice(metadata.to_string().as_bytes());
    buf.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    buf.put_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    buf.put_slice(data);
    buf.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    buf.to_vec()
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RemoteError::status(status.as_u16(), api_message(&body)))
}

/// Pull `error.message` out of a Drive error body, falling back to the raw text
fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(300).collect())
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

fn decode(e: reqwest::Error) -> RemoteError {
    RemoteError::Decode(e.to_string())
}

fn oauth_error(e: OAuthError) -> RemoteError {
    match e {
        OAuthError::Transport(e) => RemoteError::Transport(e.to_string()),
        OAuthError::Rejected { status, body } => RemoteError::status(status, api_message(&body)),
        other => RemoteError::Credentials(other.to_string()),
    }
}
