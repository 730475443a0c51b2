//! Runtime configuration, read from the environment (and `.env` via dotenvy).
//!
//! | Variable | Default |
//! |---|---|
//! | `FILEDESK_API_URL` (falls back to `API_URL`) | `http://localhost:8000/api` |
//! | `FILEDESK_TOKEN_STORE` | `file` (`keychain`, `file`, `memory`) |
//! | `FILEDESK_CREDENTIALS_PATH` | `<config_dir>/filedesk/credentials.json` |
//! | `FILEDESK_TIMEOUT_SECS` | 120 |
//! | `FILEDESK_CONNECT_TIMEOUT_SECS` | 10 |

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::api::auth::{FileStore, MemoryStore, TokenStore};
use crate::api::client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
use crate::api::ApiError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Where the token pair is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Keychain,
    File,
    Memory,
}

impl FromStr for StoreKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keychain" => Ok(StoreKind::Keychain),
            "file" => Ok(StoreKind::File),
            "memory" => Ok(StoreKind::Memory),
            other => Err(ApiError::Config(format!(
                "unknown token store '{}' (expected keychain, file or memory)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub store: StoreKind,
    pub credentials_path: Option<PathBuf>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            store: StoreKind::File,
            credentials_path: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl Config {
    /// Build a config from process environment variables.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup("FILEDESK_API_URL").or_else(|| lookup("API_URL")) {
            config.api_url = url;
        }
        if let Some(store) = lookup("FILEDESK_TOKEN_STORE") {
            config.store = store.parse()?;
        }
        if let Some(path) = lookup("FILEDESK_CREDENTIALS_PATH") {
            config.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = lookup("FILEDESK_TIMEOUT_SECS") {
            config.timeout = parse_secs("FILEDESK_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("FILEDESK_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = parse_secs("FILEDESK_CONNECT_TIMEOUT_SECS", &secs)?;
        }

        Ok(config)
    }

    /// Instantiate the configured credential store.
    pub fn open_store(&self) -> Result<Arc<dyn TokenStore>, ApiError> {
        match self.store {
            StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreKind::File => {
                let path = match self.credentials_path.clone() {
                    Some(path) => path,
                    None => FileStore::default_path().ok_or_else(|| {
                        ApiError::Config(
                            "no config directory; set FILEDESK_CREDENTIALS_PATH".to_string(),
                        )
                    })?,
                };
                log::debug!("Using credential file {}", path.display());
                Ok(Arc::new(FileStore::new(path)))
            }
            #[cfg(feature = "keychain")]
            StoreKind::Keychain => Ok(Arc::new(crate::api::auth::KeychainStore)),
            #[cfg(not(feature = "keychain"))]
            StoreKind::Keychain => Err(ApiError::Config(
                "keychain support was not compiled in".to_string(),
            )),
        }
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, ApiError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ApiError::Config(format!("{} must be a number of seconds, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.store, StoreKind::File);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_prefixed_url_wins_over_fallback() {
        let config = Config::from_lookup(lookup_from(&[
            ("API_URL", "http://fallback/api"),
            ("FILEDESK_API_URL", "http://primary/api"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://primary/api");

        let config = Config::from_lookup(lookup_from(&[("API_URL", "http://fallback/api")])).unwrap();
        assert_eq!(config.api_url, "http://fallback/api");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("FILEDESK_TOKEN_STORE", "Memory"),
            ("FILEDESK_CREDENTIALS_PATH", "/tmp/creds.json"),
            ("FILEDESK_TIMEOUT_SECS", "5"),
            ("FILEDESK_CONNECT_TIMEOUT_SECS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.credentials_path, Some(PathBuf::from("/tmp/creds.json")));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("FILEDESK_TOKEN_STORE", "cookie")])),
            Err(ApiError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("FILEDESK_TIMEOUT_SECS", "soon")])),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn test_file_store_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        let config = Config {
            credentials_path: Some(path.clone()),
            ..Config::default()
        };

        let store = config.open_store().unwrap();
        store
            .save(crate::api::auth::TokenKey::Access, "A1")
            .unwrap();
        assert!(path.exists());
    }
}
