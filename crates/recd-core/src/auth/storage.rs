//! Key-value persistence for session tokens and unlock keys.
//!
//! Three backends share the [`TokenStorage`] interface:
//! - `FileTokenStorage`: encrypted JSON files in the cache directory
//! - `KeyringTokenStorage`: the OS keychain
//! - `MemoryTokenStorage`: process memory only (tests, `--ephemeral`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, bail, Context, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use keyring::Entry;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

const SERVICE_NAME: &str = "recd";

/// Name of the per-install encryption key inside the storage directory
const KEY_FILE: &str = "storage.key";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// File backend
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SealedValue {
    nonce: String,
    ciphertext: String,
}

/// Stores each key as `<key>.json` holding a ChaCha20-Poly1305 sealed value.
pub struct FileTokenStorage {
    dir: PathBuf,
    cipher: ChaCha20Poly1305,
}

impl FileTokenStorage {
    /// Open (or create) a storage directory, generating its key on first use.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;

        let key = load_or_create_key(&dir.join(KEY_FILE))?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));

        Ok(Self { dir, cipher })
    }

    fn value_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }

    fn seal(&self, value: &str) -> Result<SealedValue> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), value.as_bytes())
            .map_err(|_| anyhow!("Failed to encrypt stored value"))?;

        Ok(SealedValue {
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        })
    }

    fn open_sealed(&self, sealed: &SealedValue) -> Result<String> {
        let nonce = hex::decode(&sealed.nonce).context("Stored nonce is not valid hex")?;
        if nonce.len() != NONCE_LEN {
            bail!("Stored nonce has wrong length");
        }
        let ciphertext =
            hex::decode(&sealed.ciphertext).context("Stored ciphertext is not valid hex")?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| anyhow!("Failed to decrypt stored value (key changed?)"))?;

        String::from_utf8(plaintext).context("Stored value is not valid UTF-8")
    }
}

impl TokenStorage for FileTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read stored value: {}", key))?;
        let sealed: SealedValue = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse stored value: {}", key))?;

        self.open_sealed(&sealed).map(Some)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let sealed = self.seal(value)?;
        let contents = serde_json::to_string_pretty(&sealed)?;
        std::fs::write(self.value_path(key), contents)
            .with_context(|| format!("Failed to write stored value: {}", key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.value_path(key);
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stored value: {}", key))?;
        }
        Ok(())
    }
}

fn load_or_create_key(path: &Path) -> Result<[u8; KEY_LEN]> {
    if path.exists() {
        let bytes = std::fs::read(path).context("Failed to read storage key")?;
        return bytes
            .try_into()
            .map_err(|_| anyhow!("Storage key at {} is corrupt", path.display()));
    }

    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    std::fs::write(path, key).context("Failed to write storage key")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .context("Failed to restrict storage key permissions")?;
    }

    Ok(key)
}

// ============================================================================
// Keyring backend
// ============================================================================

/// Stores each key as a password entry in the OS keychain.
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    fn entry(key: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, key).context("Failed to create keyring entry")
    }
}

impl TokenStorage for KeyringTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve value from keychain"),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Self::entry(key)?
            .set_password(value)
            .context("Failed to store value in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete value from keychain"),
        }
    }
}

// ============================================================================
// Memory backend
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}
