//! OAuth installed-app flow: client secret file, PKCE, token persistence.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.activity",
    "https://www.googleapis.com/auth/drive.metadata",
];

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// Seconds of slack before expiry at which a token is already treated as stale
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("client secret file {0} was not found")]
    MissingClientSecret(String),
    #[error("client secret file is malformed: {0}")]
    MalformedClientSecret(String),
    #[error("token file I/O failed: {0}")]
    TokenFile(#[from] std::io::Error),
    #[error("token file is malformed: {0}")]
    MalformedToken(#[from] serde_json::Error),
    #[error("no authorization code in reply")]
    MissingCode,
    #[error("token endpoint rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("no refresh token available")]
    NoRefreshToken,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}
fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Parse the JSON downloaded from the cloud console (`installed` or `web` app)
    pub fn parse(data: &str) -> Result<Self, OAuthError> {
        let file: ClientSecretFile = serde_json::from_str(data)
            .map_err(|e| OAuthError::MalformedClientSecret(e.to_string()))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| OAuthError::MalformedClientSecret("no installed or web section".into()))
    }

    pub fn load(path: &Path) -> Result<Self, OAuthError> {
        let data = std::fs::read_to_string(path)
            .map_err(|_| OAuthError::MissingClientSecret(path.display().to_string()))?;
        Self::parse(&data)
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_REDIRECT_URI)
    }

    /// Consent URL requesting offline access, with a PKCE S256 challenge
    pub fn authorization_url(&self, verifier: &str) -> Result<String, OAuthError> {
        let scope = SCOPES.join(" ");
        let challenge = pkce_challenge(verifier);
        let url = Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| OAuthError::MalformedClientSecret(format!("bad auth_uri: {}", e)))?;
        Ok(url.into())
    }
}

/// Random PKCE verifier (64 unreserved characters)
pub fn new_verifier() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::encode_config(digest, base64::URL_SAFE_NO_PAD)
}

/// Accept either a bare authorization code or the whole redirect URL
pub fn extract_code(reply: &str) -> Result<String, OAuthError> {
    let reply = reply.trim().trim_matches('`');
    if reply.is_empty() {
        return Err(OAuthError::MissingCode);
    }
    if let Ok(url) = Url::parse(reply) {
        if matches!(url.scheme(), "http" | "https") {
            return url
                .query_pairs()
                .find(|(k, _)| k == "code")
                .map(|(_, v)| v.into_owned())
                .ok_or(OAuthError::MissingCode);
        }
    }
    Ok(reply.to_string())
}

/// Persisted credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

impl TokenSet {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_SLACK_SECS) <= now
    }

    pub fn load(path: &Path) -> Result<Self, OAuthError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), OAuthError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("token written to {}", path.display());
        Ok(())
    }

    fn from_response(resp: TokenResponse, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + Duration::seconds(resp.expires_in),
        }
    }
}

/// Exchange an authorization code for tokens
pub async fn exchange_code(
    http: &reqwest::Client,
    secret: &ClientSecret,
    code: &str,
    verifier: &str,
) -> Result<TokenSet, OAuthError> {
    let resp = http
        .post(&secret.token_uri)
        .form(&[
            ("code", code),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("redirect_uri", secret.redirect_uri()),
            ("grant_type", "authorization_code"),
            ("code_verifier", verifier),
        ])
        .send()
        .await?;
    let token = read_token_response(resp).await?;
    info!("authorization code exchanged for tokens");
    Ok(TokenSet::from_response(token, None))
}

/// Trade the refresh token for a fresh access token
pub async fn refresh(
    http: &reqwest::Client,
    secret: &ClientSecret,
    current: &TokenSet,
) -> Result<TokenSet, OAuthError> {
    let refresh_token = current
        .refresh_token
        .as_deref()
        .ok_or(OAuthError::NoRefreshToken)?;
    let resp = http
        .post(&secret.token_uri)
        .form(&[
            ("refresh_token", refresh_token),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;
    let token = read_token_response(resp).await?;
    debug!("access token refreshed");
    Ok(TokenSet::from_response(token, current.refresh_token.clone()))
}

async fn read_token_response(resp: reqwest::Response) -> Result<TokenResponse, OAuthError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(OAuthError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json().await?)
}
