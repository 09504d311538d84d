//! Auth provider client for the wardrobe
//!
//! Supports the sign-in flows the wardrobe offers: email and password,
//! sign-up, passwordless "magic link" mail with a PKCE code exchange, and
//! restoring a session from tokens handed back in a redirect fragment.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::{Arc, RwLock};
use thiserror::Error;

const PKCE_VERIFIER_LEN: usize = 64;

/// Error type
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// User record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Result of a sign-up: a session when the project does not require email
/// confirmation, otherwise only the newly created user
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub session: Option<Session>,
    pub user: Option<User>,
}

/// Client options
#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub persist_session: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            persist_session: true,
        }
    }
}

/// PKCE code verifier; keep it until the callback code is exchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceVerifier(pub String);

impl PkceVerifier {
    pub fn generate() -> Self {
        let verifier: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PKCE_VERIFIER_LEN)
            .map(char::from)
            .collect();
        Self(verifier)
    }

    /// S256 challenge sent with the initial request
    pub fn challenge(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.0.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Auth client
pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    options: AuthOptions,
    current_session: Arc<RwLock<Option<Session>>>,
}

impl Auth {
    pub fn new(url: &str, key: &str, http_client: Client, options: AuthOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            options,
            current_session: Arc::new(RwLock::new(None)),
        }
    }

    /// Register with email and password
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let url = with_redirect(format!("{}/auth/v1/signup", self.url), redirect_to);

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;
        let body: Value = check(response).await?.json().await?;

        // With confirmation enabled the provider answers with the bare user
        let outcome = if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            self.store_session(&session);
            SignUpOutcome {
                user: Some(session.user.clone()),
                session: Some(session),
            }
        } else {
            SignUpOutcome {
                session: None,
                user: serde_json::from_value(body).ok(),
            }
        };

        Ok(outcome)
    }

    /// Sign in with email and password
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.url);

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });

        self.request_session(&url, &payload).await
    }

    /// Send a magic-link email. The returned verifier must be kept to
    /// exchange the `code` the link redirects back with.
    pub async fn sign_in_with_otp(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<PkceVerifier, AuthError> {
        let url = with_redirect(format!("{}/auth/v1/otp", self.url), redirect_to);
        let verifier = PkceVerifier::generate();

        let payload = serde_json::json!({
            "email": email,
            "create_user": true,
            "code_challenge": verifier.challenge(),
            "code_challenge_method": "s256",
        });

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;
        check(response).await?;

        Ok(verifier)
    }

    /// Exchange the authorization code from a callback for a session
    pub async fn exchange_code_for_session(
        &self,
        code: &str,
        verifier: &PkceVerifier,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=pkce", self.url);

        let payload = serde_json::json!({
            "auth_code": code,
            "code_verifier": verifier.as_str(),
        });

        self.request_session(&url, &payload).await
    }

    /// Adopt tokens delivered in a redirect fragment. The access token is
    /// checked by fetching the user it belongs to.
    pub async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in: Option<i64>,
    ) -> Result<Session, AuthError> {
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(AuthError::InvalidToken(
                "access and refresh tokens are required".to_string(),
            ));
        }

        let user = self.fetch_user(access_token).await?;
        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in: expires_in.unwrap_or_default(),
            expires_at: None,
            token_type: default_token_type(),
            user,
        };
        self.store_session(&session);

        Ok(session)
    }

    /// Install a previously persisted session without contacting the provider
    pub fn restore_session(&self, session: Session) {
        let mut guard = self
            .current_session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(session);
    }

    /// Current session
    pub fn get_session(&self) -> Option<Session> {
        let guard = self
            .current_session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// Current user, fetched fresh from the provider
    pub async fn get_user(&self) -> Result<User, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;
        self.fetch_user(&session.access_token).await
    }

    /// Trade the refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.url);

        let payload = serde_json::json!({
            "refresh_token": session.refresh_token,
        });

        self.request_session(&url, &payload).await
    }

    /// Sign out and forget the session
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/logout", self.url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;
        check(response).await?;

        let mut guard = self
            .current_session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;

        Ok(())
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User, AuthError> {
        let url = format!("{}/auth/v1/user", self.url);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    async fn request_session(&self, url: &str, payload: &Value) -> Result<Session, AuthError> {
        log::debug!("POST {}", url);
        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        let session: Session = check(response).await?.json().await?;
        self.store_session(&session);

        Ok(session)
    }

    fn store_session(&self, session: &Session) {
        if self.options.persist_session {
            self.restore_session(session.clone());
        }
    }
}

fn with_redirect(url: String, redirect_to: Option<&str>) -> String {
    match redirect_to {
        Some(redirect_to) => format!("{}?redirect_to={}", url, urlencoding::encode(redirect_to)),
        None => url,
    }
}

// The provider is inconsistent about where it puts the human-readable text
async fn check(response: Response) -> Result<Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let error_text = response.text().await?;
    let message = serde_json::from_str::<Value>(&error_text)
        .ok()
        .and_then(|body| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or(error_text);
    Err(AuthError::ApiError(message))
}
