//! Authenticated context and on-disk session persistence

use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use wardrobe_auth::{AuthError, PkceVerifier, Session};

use crate::error::{Error, Result};

/// Who is calling, passed explicitly into every data and storage operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub owner_id: Uuid,
    pub access_token: String,
    /// Unix seconds, from the token's `exp` claim
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    exp: Option<i64>,
}

impl AuthContext {
    pub fn new(owner_id: Uuid, access_token: &str) -> Self {
        Self {
            owner_id,
            access_token: access_token.to_string(),
            expires_at: None,
        }
    }

    /// Build from an access token. The signature is not checked here; the
    /// backend verifies it on every request.
    pub fn from_access_token(access_token: &str) -> Result<Self> {
        let claims = decode_claims(access_token)?;
        let owner_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| invalid_token(format!("subject is not a user id: {}", e)))?;

        Ok(Self {
            owner_id,
            access_token: access_token.to_string(),
            expires_at: claims.exp,
        })
    }

    pub fn from_session(session: &Session) -> Result<Self> {
        let context = Self::from_access_token(&session.access_token)?;
        if context.owner_id.to_string() != session.user.id {
            return Err(invalid_token("token subject does not match the session user"));
        }
        Ok(context)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| exp <= Utc::now().timestamp())
            .unwrap_or(false)
    }
}

fn decode_claims(token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| invalid_token(e.to_string()))
}

fn invalid_token<T: Into<String>>(msg: T) -> Error {
    Error::Auth(AuthError::InvalidToken(msg.into()))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pkce_verifier: Option<PkceVerifier>,
}

/// JSON file holding the signed-in session and any pending magic-link verifier
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        Ok(self.read()?.session)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let mut file = self.read()?;
        file.session = Some(session.clone());
        file.pkce_verifier = None;
        self.write(&file)
    }

    /// Forget the session; removes the file when nothing else is stored
    pub fn clear(&self) -> Result<()> {
        let mut file = self.read()?;
        file.session = None;
        if file.pkce_verifier.is_none() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        self.write(&file)
    }

    pub fn save_verifier(&self, verifier: &PkceVerifier) -> Result<()> {
        let mut file = self.read()?;
        file.pkce_verifier = Some(verifier.clone());
        self.write(&file)
    }

    pub fn take_verifier(&self) -> Result<Option<PkceVerifier>> {
        let mut file = self.read()?;
        let verifier = file.pkce_verifier.take();
        if verifier.is_some() {
            self.write(&file)?;
        }
        Ok(verifier)
    }

    fn read(&self) -> Result<SessionFile> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SessionFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, file: &SessionFile) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    pub(crate) const USER_ID: &str = "8d0fd2b3-9ca6-4a3b-9d8a-5a1b2c3d4e5f";

    pub(crate) fn token_for(sub: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({ "sub": sub, "exp": exp, "role": "authenticated" }),
            &EncodingKey::from_secret(b"not-the-project-secret"),
        )
        .unwrap()
    }

    pub(crate) fn session_for(sub: &str, exp: i64) -> Session {
        serde_json::from_value(json!({
            "access_token": token_for(sub, exp),
            "refresh_token": "refresh",
            "expires_in": 3600,
            "user": { "id": sub, "email": "me@example.com" }
        }))
        .unwrap()
    }

    #[test]
    fn context_from_session() {
        let exp = Utc::now().timestamp() + 3600;
        let session = session_for(USER_ID, exp);
        let ctx = AuthContext::from_session(&session).unwrap();

        assert_eq!(ctx.owner_id.to_string(), USER_ID);
        assert_eq!(ctx.expires_at, Some(exp));
        assert!(!ctx.is_expired());
    }

    #[test]
    fn expired_token_is_detected() {
        let session = session_for(USER_ID, Utc::now().timestamp() - 10);
        let ctx = AuthContext::from_session(&session).unwrap();
        assert!(ctx.is_expired());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(matches!(
            AuthContext::from_access_token("not-a-jwt"),
            Err(Error::Auth(AuthError::InvalidToken(_)))
        ));
        assert!(AuthContext::from_access_token(&token_for("anon", 0)).is_err());
    }

    #[test]
    fn mismatched_user_is_rejected() {
        let mut session = session_for(USER_ID, Utc::now().timestamp() + 60);
        session.user.id = "0f8e3f1c-8a6b-4c38-9a8e-2d9a4f1b7c11".to_string();
        assert!(AuthContext::from_session(&session).is_err());
    }

    #[test]
    fn store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.load().unwrap().is_none());
        assert!(store.take_verifier().unwrap().is_none());

        store.save_verifier(&PkceVerifier("v".repeat(64))).unwrap();
        let verifier = store.take_verifier().unwrap();
        assert_eq!(verifier.map(|v| v.0.len()), Some(64));
        assert!(store.take_verifier().unwrap().is_none());

        let session = session_for(USER_ID, 1);
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!store.path().exists());
        store.clear().unwrap();
    }
}
