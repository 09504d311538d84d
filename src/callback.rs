//! Sign-in flows and the auth redirect callback

use url::Url;
use wardrobe_auth::{AuthError, PkceVerifier, Session};

use crate::error::{Error, Result};
use crate::session::{AuthContext, SessionStore};
use crate::Wardrobe;

pub const MIN_PASSWORD_LEN: usize = 6;

/// What an auth redirect brought back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackParams {
    /// Tokens in the fragment: `#access_token=..&refresh_token=..`
    Tokens {
        access_token: String,
        refresh_token: String,
        expires_in: Option<i64>,
    },
    /// Authorization code in the query, to exchange with the PKCE verifier
    Code(String),
    /// The provider reported a failure
    Error(String),
    /// Nothing usable; start over at sign-in
    None,
}

impl CallbackParams {
    /// Parse a callback URL. Fragment tokens win over a query `code`.
    pub fn parse(input: &str) -> Result<Self> {
        let url = match Url::parse(input.trim()) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost/auth/callback")?.join(input.trim())?
            }
            Err(e) => return Err(e.into()),
        };

        let fragment: Vec<(String, String)> = url
            .fragment()
            .map(|f| {
                url::form_urlencoded::parse(f.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        let lookup = |pairs: &[(String, String)], key: &str| {
            pairs
                .iter()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.clone())
        };

        if let (Some(access_token), Some(refresh_token)) = (
            lookup(&fragment, "access_token"),
            lookup(&fragment, "refresh_token"),
        ) {
            let expires_in = lookup(&fragment, "expires_in").and_then(|v| v.parse().ok());
            return Ok(CallbackParams::Tokens {
                access_token,
                refresh_token,
                expires_in,
            });
        }

        if let Some(code) = lookup(&query, "code") {
            return Ok(CallbackParams::Code(code));
        }

        for pairs in [&fragment, &query] {
            if let Some(message) =
                lookup(pairs, "error_description").or_else(|| lookup(pairs, "error"))
            {
                return Ok(CallbackParams::Error(message));
            }
        }

        Ok(CallbackParams::None)
    }
}

/// Reject passwords the provider would refuse anyway
pub fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Friendlier text for common sign-in failures
pub fn sign_in_hint(message: &str) -> String {
    if message.contains("Invalid login credentials") {
        "wrong email or password. If you just signed up, confirm your email first.".to_string()
    } else if message.contains("Email not confirmed") {
        "open the confirmation link in your email before signing in.".to_string()
    } else {
        message.to_string()
    }
}

pub fn sign_up_hint(message: &str) -> String {
    if message.contains("already registered") {
        "this email is already registered; sign in with your password, or use a magic link if you forgot it."
            .to_string()
    } else {
        message.to_string()
    }
}

fn friendly(hint: fn(&str) -> String) -> impl FnOnce(AuthError) -> Error {
    move |err| match err {
        AuthError::ApiError(message) => Error::Auth(AuthError::ApiError(hint(&message))),
        other => Error::Auth(other),
    }
}

impl Wardrobe {
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .auth()
            .sign_in_with_password(email, password)
            .await
            .map_err(friendly(sign_in_hint))?;
        tracing::info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    /// Register, then sign straight in when the project handed back only the
    /// user. `None` means the account exists but cannot be used yet.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        check_password(password)?;

        let outcome = self
            .auth()
            .sign_up(email, password, self.config().redirect_url.as_deref())
            .await
            .map_err(friendly(sign_up_hint))?;

        if let Some(session) = outcome.session {
            tracing::info!(user_id = %session.user.id, "signed up");
            return Ok(Some(session));
        }
        if outcome.user.is_none() {
            return Ok(None);
        }

        match self.auth().sign_in_with_password(email, password).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, "signed up");
                Ok(Some(session))
            }
            Err(e) => {
                tracing::warn!(error = %e, "signed up but could not sign in yet");
                Ok(None)
            }
        }
    }

    /// Email a magic link; keep the returned verifier for the callback
    pub async fn send_magic_link(&self, email: &str) -> Result<PkceVerifier> {
        let verifier = self
            .auth()
            .sign_in_with_otp(email, self.config().redirect_url.as_deref())
            .await?;
        tracing::info!("magic link sent");
        Ok(verifier)
    }

    /// Finish a redirect. `Ok(None)` means there was nothing to finish.
    pub async fn complete_callback(
        &self,
        params: CallbackParams,
        verifier: Option<&PkceVerifier>,
    ) -> Result<Option<Session>> {
        let session = match params {
            CallbackParams::Tokens {
                access_token,
                refresh_token,
                expires_in,
            } => {
                self.auth()
                    .set_session(&access_token, &refresh_token, expires_in)
                    .await?
            }
            CallbackParams::Code(code) => {
                let verifier = verifier.ok_or_else(|| {
                    Error::validation("no magic-link sign-in is pending; request a new link")
                })?;
                self.auth().exchange_code_for_session(&code, verifier).await?
            }
            CallbackParams::Error(message) => {
                return Err(Error::Auth(AuthError::ApiError(message)));
            }
            CallbackParams::None => return Ok(None),
        };

        tracing::info!(user_id = %session.user.id, "callback completed");
        Ok(Some(session))
    }

    /// Context for the stored session, refreshing it first when the access
    /// token has expired
    pub async fn resume(&self, store: &SessionStore) -> Result<AuthContext> {
        let session = store.load()?.ok_or(Error::NotAuthenticated)?;
        let ctx = AuthContext::from_session(&session)?;
        self.auth().restore_session(session);
        if !ctx.is_expired() {
            return Ok(ctx);
        }

        tracing::debug!("access token expired, refreshing");
        let session = match self.auth().refresh_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed");
                return Err(Error::NotAuthenticated);
            }
        };
        store.save(&session)?;
        AuthContext::from_session(&session)
    }
}
