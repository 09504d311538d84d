//! Configuration for the wardrobe client

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_BUCKET: &str = "wardrobe";
pub const DEFAULT_SIGNED_URL_TTL: u64 = 3600;
pub const DEFAULT_SESSION_FILE: &str = ".wardrobe-session.json";

/// Connection settings and client options
#[derive(Debug, Clone)]
pub struct WardrobeConfig {
    /// Base URL of the hosted backend project
    pub url: Url,

    /// Anonymous API key
    pub anon_key: String,

    /// Object store bucket holding images and detail documents
    pub bucket: String,

    /// Validity of signed URLs, in seconds
    pub signed_url_ttl: u64,

    pub request_timeout: Option<Duration>,

    /// Where the CLI keeps the signed-in session between runs
    pub session_file: PathBuf,

    /// Landing page for magic-link and confirmation emails
    pub redirect_url: Option<String>,
}

impl WardrobeConfig {
    /// Create a configuration with default options
    pub fn new(url: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        if anon_key.trim().is_empty() {
            return Err(Error::config("anon key must not be empty"));
        }

        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            signed_url_ttl: DEFAULT_SIGNED_URL_TTL,
            request_timeout: Some(Duration::from_secs(30)),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            redirect_url: None,
        })
    }

    /// Load from the environment, reading `.env` first if present
    ///
    /// `SUPABASE_URL` and `SUPABASE_ANON_KEY` are required; the `WARDROBE_*`
    /// variables override the defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let url = env::var("SUPABASE_URL")
            .map_err(|_| Error::config("SUPABASE_URL environment variable not set"))?;
        let anon_key = env::var("SUPABASE_ANON_KEY")
            .map_err(|_| Error::config("SUPABASE_ANON_KEY environment variable not set"))?;

        let mut config = Self::new(&url, &anon_key)?;

        if let Ok(bucket) = env::var("WARDROBE_BUCKET") {
            config = config.with_bucket(&bucket);
        }
        if let Ok(ttl) = env::var("WARDROBE_SIGNED_URL_TTL") {
            config = config.with_signed_url_ttl(parse_seconds("WARDROBE_SIGNED_URL_TTL", &ttl)?);
        }
        if let Ok(timeout) = env::var("WARDROBE_REQUEST_TIMEOUT") {
            let secs = parse_seconds("WARDROBE_REQUEST_TIMEOUT", &timeout)?;
            config = config.with_request_timeout(Some(Duration::from_secs(secs)));
        }
        if let Ok(path) = env::var("WARDROBE_SESSION_FILE") {
            config = config.with_session_file(path);
        }
        if let Ok(redirect) = env::var("WARDROBE_REDIRECT_URL") {
            config = config.with_redirect_url(&redirect);
        }

        Ok(config)
    }

    pub fn with_bucket(mut self, value: &str) -> Self {
        self.bucket = value.to_string();
        self
    }

    pub fn with_signed_url_ttl(mut self, value: u64) -> Self {
        self.signed_url_ttl = value;
        self
    }

    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_session_file<P: Into<PathBuf>>(mut self, value: P) -> Self {
        self.session_file = value.into();
        self
    }

    pub fn with_redirect_url(mut self, value: &str) -> Self {
        self.redirect_url = Some(value.to_string());
        self
    }

    /// Base URL without a trailing slash, as the service clients expect it
    pub fn base_url(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }
}

fn parse_seconds(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::config(format!("{} must be a number of seconds, got {:?}", name, value)))
}
