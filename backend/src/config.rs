//! Remote store configuration loaded via OrthoConfig.
//!
//! Values come from `REMOTE_STORE_*` environment variables, configuration
//! files, or command-line flags, with defaults supplied by the accessors.

use std::io;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::domain::DEFAULT_REGISTRY_TTL;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection and caching settings for the Baserow remote store.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "REMOTE_STORE")]
pub struct RemoteStoreSettings {
    /// Base URL of the Baserow instance, without the `/api` suffix.
    pub base_url: Option<String>,
    /// Database token sent as `Authorization: Token <token>`.
    pub token: Option<String>,
    /// Per-request deadline in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Lifetime of the cached table mapping in seconds.
    pub registry_ttl_secs: Option<u64>,
    /// Accept self-signed or otherwise invalid TLS certificates.
    #[ortho_config(default = false)]
    pub accept_invalid_certs: bool,
}

impl RemoteStoreSettings {
    /// Return the validated base URL, falling back to the local default.
    ///
    /// # Errors
    /// Returns [`io::ErrorKind::InvalidInput`] when the configured value is
    /// not an absolute URL.
    pub fn base_url(&self) -> io::Result<Url> {
        let raw = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Url::parse(raw).map_err(|error| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid REMOTE_STORE_BASE_URL {raw:?}: {error}"),
            )
        })
    }

    /// Return the API token.
    ///
    /// # Errors
    /// Returns [`io::ErrorKind::NotFound`] when no non-empty token is set.
    pub fn token(&self) -> io::Result<Zeroizing<String>> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| Zeroizing::new(token.to_owned()))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "REMOTE_STORE_TOKEN is not set"))
    }

    /// Return the per-request deadline, falling back to 30 seconds.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs)
    }

    /// Return the registry TTL, falling back to five minutes.
    pub fn registry_ttl(&self) -> Duration {
        self.registry_ttl_secs
            .map_or(DEFAULT_REGISTRY_TTL, Duration::from_secs)
    }
}
