//! Credential storage for the access/refresh token pair.
//!
//! Tokens live under the keys `access_token` and `refresh_token` in one of
//! three backends: the OS keychain (`keyring` crate), a JSON file in the user's
//! config directory, or process memory. All three survive nothing more than
//! their medium does: memory is for tests, the other two persist across runs.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

/// Keychain service name for the console.
#[cfg(feature = "keychain")]
const SERVICE_NAME: &str = "com.filedesk.console";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Keychain operation failed: {0}")]
    Keychain(String),

    #[error("Credential file error: {0}")]
    File(#[from] std::io::Error),

    #[error("Credential file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[cfg(feature = "keychain")]
impl From<keyring::Error> for StoreError {
    fn from(err: keyring::Error) -> Self {
        StoreError::Keychain(err.to_string())
    }
}

/// The two persisted credential slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Access,
    Refresh,
}

impl TokenKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKey::Access => "access_token",
            TokenKey::Refresh => "refresh_token",
        }
    }
}

/// Persistent key/value storage for tokens.
///
/// Implementations must treat deleting a missing key as success.
pub trait TokenStore: Send + Sync {
    fn load(&self, key: TokenKey) -> Result<Option<String>, StoreError>;
    fn save(&self, key: TokenKey, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: TokenKey) -> Result<(), StoreError>;
}

/// OS keychain backend. One entry per token key under [`SERVICE_NAME`].
#[cfg(feature = "keychain")]
#[derive(Debug, Default)]
pub struct KeychainStore;

#[cfg(feature = "keychain")]
impl TokenStore for KeychainStore {
    fn load(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        let entry = keyring::Entry::new(SERVICE_NAME, key.as_str())?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn save(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        let entry = keyring::Entry::new(SERVICE_NAME, key.as_str())?;
        entry.set_password(value)?;
        Ok(())
    }

    fn delete(&self, key: TokenKey) -> Result<(), StoreError> {
        let entry = keyring::Entry::new(SERVICE_NAME, key.as_str())?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::from(e)),
        }
    }
}

/// JSON file backend: `{"access_token": "...", "refresh_token": "..."}`.
///
/// Every write rewrites the whole file through a temporary sibling and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<config_dir>/filedesk/credentials.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("filedesk").join("credentials.json"))
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, tokens: &HashMap<String, String>) -> Result<(), StoreError> {
        if tokens.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        // A leftover temp file would keep its old mode, so always start from a new one.
        match std::fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(tokens)?)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileStore {
    fn load(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_all()?.remove(key.as_str()))
    }

    fn save(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut tokens = self.read_all()?;
        tokens.insert(key.as_str().to_string(), value.to_string());
        self.write_all(&tokens)
    }

    fn delete(&self, key: TokenKey) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut tokens = self.read_all()?;
        if tokens.remove(key.as_str()).is_none() {
            return Ok(());
        }
        self.write_all(&tokens)
    }
}

/// In-process backend. Nothing outlives the store value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tokens: Mutex<HashMap<TokenKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store, handy for starting a client already "logged in".
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let store = Self::default();
        {
            let mut tokens = store.tokens.lock().unwrap_or_else(|e| e.into_inner());
            tokens.insert(TokenKey::Access, access.to_string());
            tokens.insert(TokenKey::Refresh, refresh.to_string());
        }
        store
    }
}

impl TokenStore for MemoryStore {
    fn load(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.get(&key).cloned())
    }

    fn save(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(key, value.to_string());
        Ok(())
    }

    fn delete(&self, key: TokenKey) -> Result<(), StoreError> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.remove(&key);
        Ok(())
    }
}

/// Claims carried in the backend's JWT access tokens.
///
/// Decoded without signature verification: the client only uses them for
/// display, the server remains the authority.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenClaims {
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Expiry as Unix seconds.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenClaims {
    /// Decode the payload segment of a `header.payload.signature` token.
    pub fn decode(token: &str) -> Result<Self, String> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err("Invalid JWT format".to_string());
        }

        let payload = parts[1].trim_end_matches('=');
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| format!("Failed to decode JWT payload: {}", e))?;

        serde_json::from_slice(&decoded).map_err(|e| format!("Failed to parse JWT payload: {}", e))
    }

    /// Seconds until expiry relative to `now` (Unix seconds); negative once expired.
    pub fn expires_in(&self, now: i64) -> Option<i64> {
        self.exp.map(|exp| exp - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_jwt(payload: serde_json::Value) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.sig",
            engine.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            engine.encode(payload.to_string())
        )
    }

    #[test]
    fn test_memory_store_roundtrip_and_idempotent_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.load(TokenKey::Access).unwrap(), None);

        store.save(TokenKey::Access, "A1").unwrap();
        store.save(TokenKey::Refresh, "R1").unwrap();
        assert_eq!(store.load(TokenKey::Access).unwrap().as_deref(), Some("A1"));

        store.delete(TokenKey::Access).unwrap();
        store.delete(TokenKey::Access).unwrap();
        assert_eq!(store.load(TokenKey::Access).unwrap(), None);
        assert_eq!(store.load(TokenKey::Refresh).unwrap().as_deref(), Some("R1"));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let store = FileStore::new(&path);
        store.save(TokenKey::Access, "A1").unwrap();
        store.save(TokenKey::Refresh, "R1").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.load(TokenKey::Access).unwrap().as_deref(), Some("A1"));
        assert_eq!(reopened.load(TokenKey::Refresh).unwrap().as_deref(), Some("R1"));

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["access_token"], "A1");
        assert_eq!(raw["refresh_token"], "R1");
    }

    #[test]
    fn test_file_store_removes_file_when_emptied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = FileStore::new(&path);

        store.save(TokenKey::Access, "A1").unwrap();
        store.delete(TokenKey::Access).unwrap();
        assert!(!path.exists());

        // Missing file and missing key both count as "deleted".
        store.delete(TokenKey::Refresh).unwrap();
        assert_eq!(store.load(TokenKey::Refresh).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only_even_over_stale_temp_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, "{}").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileStore::new(&path);
        store.save(TokenKey::Access, "A1").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert!(!tmp.exists());
        assert_eq!(store.load(TokenKey::Access).unwrap().as_deref(), Some("A1"));
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.load(TokenKey::Access),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_claims_decode() {
        let token = make_jwt(serde_json::json!({
            "token_type": "access",
            "exp": 1_700_000_300,
            "user_id": 7,
            "email": "ada@example.com",
            "username": "ada",
        }));

        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.user_id, Some(7));
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert_eq!(claims.username.as_deref(), Some("ada"));
        assert_eq!(claims.expires_in(1_700_000_000), Some(300));
    }

    #[test]
    fn test_claims_reject_opaque_token() {
        assert!(TokenClaims::decode("A1").is_err());
        assert!(TokenClaims::decode("a.!!!.c").is_err());
    }
}
