use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    config,
    error::AuthError,
    types::{RefreshTokenResponse, Token},
};

/// Refresh the access token when it expires within this many seconds.
pub const REFRESH_BUFFER_SECS: u64 = 300;

/// Supplies a usable access token for upstream calls.
///
/// Implementations must never hand out a token they know to be expired.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn valid_access_token(&self) -> Result<String, AuthError>;
}

/// Static token, used by tests and for one-off tokens pasted by the user.
#[async_trait]
impl AccessTokenProvider for String {
    async fn valid_access_token(&self) -> Result<String, AuthError> {
        if self.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(self.clone())
    }
}

pub struct TokenManager {
    token: Mutex<Token>,
    token_url: String,
    client_id: String,
    path: Option<PathBuf>,
    http: Client,
}

impl TokenManager {
    /// Wraps a token that is kept in memory only.
    pub fn new(token: Token) -> Self {
        TokenManager {
            token: Mutex::new(token),
            token_url: config::spotify_apitoken_url(),
            client_id: config::spotify_client_id(),
            path: None,
            http: Client::new(),
        }
    }

    /// Loads the session token written by the login flow.
    ///
    /// Falls back to `SPOTIFY_ACCESS_TOKEN` / `SPOTIFY_REFRESH_TOKEN` when no
    /// token file exists.
    pub async fn load() -> Result<Self, AuthError> {
        let path = config::token_path();
        let token = match async_fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str::<Token>(&content)
                .map_err(|e| AuthError::RefreshFailed(format!("unreadable token file: {}", e)))?,
            Err(_) => Self::token_from_env()?,
        };

        let mut manager = Self::new(token);
        manager.path = Some(path);
        Ok(manager)
    }

    fn token_from_env() -> Result<Token, AuthError> {
        Self::token_from_parts(config::spotify_access_token(), config::spotify_refresh_token())
    }

    /// Builds a session token from loose credentials.
    ///
    /// The age of a pasted access token is unknown, so whenever a refresh token
    /// is present the token starts out expired and the first call refreshes it.
    pub fn token_from_parts(
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<Token, AuthError> {
        if access_token.is_none() && refresh_token.is_none() {
            return Err(AuthError::MissingToken);
        }

        let expires_in = if refresh_token.is_some() { 0 } else { 3600 };
        Ok(Token {
            access_token: access_token.unwrap_or_default(),
            refresh_token: refresh_token.unwrap_or_default(),
            scope: String::new(),
            expires_in,
            obtained_at: Utc::now().timestamp() as u64,
        })
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub async fn persist(&self) -> Result<(), String> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| e.to_string())?;
        }

        let json = {
            let token = self.token.lock().await;
            serde_json::to_string_pretty(&*token).map_err(|e| e.to_string())?
        };
        async_fs::write(path, json).await.map_err(|e| e.to_string())
    }

    pub async fn current_token(&self) -> Token {
        self.token.lock().await.clone()
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, AuthError> {
        let res = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
            ])
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        if !res.status().is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "token endpoint answered with status {}",
                res.status().as_u16()
            )));
        }

        let body: RefreshTokenResponse = res
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        Ok(Token {
            access_token: body.access_token,
            // Spotify does not always rotate the refresh token.
            refresh_token: body
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            scope: body.scope.unwrap_or_default(),
            expires_in: body.expires_in,
            obtained_at: Utc::now().timestamp() as u64,
        })
    }
}

#[async_trait]
impl AccessTokenProvider for TokenManager {
    async fn valid_access_token(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp() as u64;
        let mut token = self.token.lock().await;
        if !token.expires_within(REFRESH_BUFFER_SECS, now) {
            return Ok(token.access_token.clone());
        }
        if token.refresh_token.is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }

        // The lock stays held so concurrent callers wait for this refresh.
        debug!("access token expires soon, refreshing");
        let refresh = token.refresh_token.clone();
        *token = self.refresh_token(&refresh).await?;
        let access_token = token.access_token.clone();
        drop(token);

        if let Err(e) = self.persist().await {
            warn!(error = %e, "failed to persist refreshed token");
        }

        Ok(access_token)
    }
}
