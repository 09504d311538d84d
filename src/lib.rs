//! Personal digital wardrobe
//!
//! Catalog clothing items, compose them into outfits through fixed slots,
//! schedule outfits onto calendar dates and export the catalog. Rows, files
//! and sign-in all live in a hosted backend; this crate holds the typed data
//! access, the outfit-builder and calendar logic, and the export formats.
//!
//! Every data and storage call takes an explicit [`AuthContext`]:
//!
//! ```no_run
//! use wardrobe::{ItemFilter, Wardrobe};
//!
//! # async fn run() -> wardrobe::Result<()> {
//! let wardrobe = Wardrobe::from_env()?;
//! let session = wardrobe.auth().sign_in_with_password("me@example.com", "secret").await?;
//! let ctx = wardrobe::AuthContext::from_session(&session)?;
//! let items = wardrobe.items().list(&ctx, &ItemFilter::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod calendar;
pub mod callback;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod media;
pub mod models;
pub mod session;

use reqwest::Client;
use serde_json::Value;
use wardrobe_auth::{Auth, AuthOptions};
use wardrobe_postgrest::PostgrestClient;
use wardrobe_storage::StorageClient;

pub use crate::config::WardrobeConfig;
pub use crate::error::{Error, Result};
pub use crate::models::*;
pub use crate::session::{AuthContext, SessionStore};

use crate::db::{ItemStore, OutfitStore, PlanStore};
use crate::error::db_error;
use crate::media::Media;

/// The main entry point: one HTTP client shared by the auth, table and
/// storage clients of a single backend project
pub struct Wardrobe {
    config: WardrobeConfig,
    http_client: Client,
    auth: Auth,
}

impl Wardrobe {
    pub fn new(config: WardrobeConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {}", e)))?;

        let auth = Auth::new(
            config.base_url(),
            &config.anon_key,
            http_client.clone(),
            AuthOptions::default(),
        );

        Ok(Self {
            config,
            http_client,
            auth,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(WardrobeConfig::from_env()?)
    }

    pub fn config(&self) -> &WardrobeConfig {
        &self.config
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Table client acting as the context's user
    pub fn from(&self, table: &str, ctx: &AuthContext) -> Result<PostgrestClient> {
        ensure_live(ctx)?;
        PostgrestClient::new(
            self.config.base_url(),
            &self.config.anon_key,
            table,
            self.http_client.clone(),
        )
        .with_auth(&ctx.access_token)
        .map_err(db_error("invalid access token"))
    }

    /// RPC client acting as the context's user
    pub fn rpc(&self, function: &str, params: Value, ctx: &AuthContext) -> Result<PostgrestClient> {
        ensure_live(ctx)?;
        PostgrestClient::rpc(
            self.config.base_url(),
            &self.config.anon_key,
            function,
            params,
            self.http_client.clone(),
        )
        .with_auth(&ctx.access_token)
        .map_err(db_error("invalid access token"))
    }

    /// Object store client acting as the context's user
    pub fn storage(&self, ctx: &AuthContext) -> Result<StorageClient> {
        ensure_live(ctx)?;
        Ok(StorageClient::new(
            self.config.base_url(),
            &self.config.anon_key,
            self.http_client.clone(),
        )
        .with_auth(&ctx.access_token))
    }

    pub fn items(&self) -> ItemStore<'_> {
        ItemStore::new(self)
    }

    pub fn outfits(&self) -> OutfitStore<'_> {
        OutfitStore::new(self)
    }

    pub fn plans(&self) -> PlanStore<'_> {
        PlanStore::new(self)
    }

    pub fn media(&self) -> Media<'_> {
        Media::new(self)
    }
}

fn ensure_live(ctx: &AuthContext) -> Result<()> {
    if ctx.access_token.is_empty() || ctx.is_expired() {
        return Err(Error::NotAuthenticated);
    }
    Ok(())
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::builder::OutfitBuilder;
    pub use crate::calendar::WeekPlan;
    pub use crate::config::WardrobeConfig;
    pub use crate::error::{Error, Result};
    pub use crate::export::ExportFormat;
    pub use crate::models::*;
    pub use crate::session::AuthContext;
    pub use crate::Wardrobe;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use wiremock::MockServer;

    pub(crate) const OWNER: &str = "8d0fd2b3-9ca6-4a3b-9d8a-5a1b2c3d4e5f";
    pub(crate) const TOKEN: &str = "user-token";

    pub(crate) fn wardrobe(server: &MockServer) -> Wardrobe {
        let config = WardrobeConfig::new(&server.uri(), "anon-key").unwrap();
        Wardrobe::new(config).unwrap()
    }

    pub(crate) fn ctx() -> AuthContext {
        AuthContext::new(uuid::Uuid::parse_str(OWNER).unwrap(), TOKEN)
    }

    pub(crate) fn item_json(id: &str, category: &str, name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "owner_id": OWNER,
            "category": category,
            "name": name,
            "status": "clean",
            "care_tags": ["cold wash"],
            "created_at": "2024-06-01T08:00:00+00:00"
        })
    }
}
