//! Server-side credential persistence.
//!
//! Credentials live in memory behind a read/write lock and round-trip
//! through a line-oriented text file:
//!
//! ```text
//! # SRP user database
//! # Format: username:salt_hex:verifier_hex
//! alice:00112233445566778899aabbccddeeff:04fd50...
//! ```
//!
//! Blank lines and `#` comments are ignored. Hex is lowercase; verifier
//! bytes are stored exactly as parsed - leading zeros are never stripped.
//! Saves rewrite the whole file atomically (temp file + rename).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use parking_lot::RwLock;

use crate::crypto::{SecureRandom, SALT_SIZE};
use crate::error::{Error, Result};
use crate::srp;

/// One stored credential: everything the server keeps about a user.
///
/// The verifier `v = g^x mod N` lets the server run the handshake but
/// does not let anyone impersonate the client short of an offline
/// brute-force attack on the password.
#[derive(Clone)]
pub struct Credential {
    /// The username (case-sensitive, unique).
    pub username: String,
    /// The 16-byte random salt fed into `x`.
    pub salt: Vec<u8>,
    /// The verifier `v` as minimal big-endian bytes.
    pub verifier: Vec<u8>,
}

impl Credential {
    /// Generate a fresh credential from a username and password.
    ///
    /// Draws a random salt, then computes
    /// `v = g^H(salt ‖ H(username ‖ ":" ‖ password)) mod N`.
    pub fn generate(username: &str, password: &str) -> Self {
        let salt = SecureRandom::bytes::<SALT_SIZE>().to_vec();
        let x = srp::compute_x(&salt, username, password);
        let verifier = srp::compute_verifier(&x).to_bytes_be();

        Self {
            username: username.to_owned(),
            salt,
            verifier,
        }
    }
}

/// In-memory credential table with file load/save.
///
/// Concurrent reads, exclusive writes. The store itself never touches
/// the disk implicitly; callers decide when to [`CredentialStore::save`].
#[derive(Default)]
pub struct CredentialStore {
    users: RwLock<HashMap<String, Credential>>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from the given file.
    ///
    /// A missing file yields an empty store (first run); malformed lines
    /// are skipped with a warning rather than rejecting the whole file.
    pub fn load(path: &Path) -> Result<Self> {
        let store = Self::new();

        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => {
                tracing::warn!(
                    "cannot read {} ({}); starting with an empty store",
                    path.display(),
                    e
                );
                return Ok(store);
            }
        };

        let mut users = store.users.write();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.splitn(3, ':');
            let (username, salt_hex, verifier_hex) =
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(u), Some(s), Some(v)) if !u.is_empty() => (u, s, v),
                    _ => {
                        tracing::warn!("skipping malformed credential line");
                        continue;
                    }
                };

            let (salt, verifier) = match (hex::decode(salt_hex), hex::decode(verifier_hex)) {
                (Ok(s), Ok(v)) => (s, v),
                _ => {
                    tracing::warn!(username, "skipping credential with invalid hex");
                    continue;
                }
            };

            users.insert(
                username.to_owned(),
                Credential {
                    username: username.to_owned(),
                    salt,
                    verifier,
                },
            );
        }
        drop(users);

        Ok(store)
    }

    /// Persist the store to the given file.
    ///
    /// The file is rewritten atomically: contents go to a sibling temp
    /// file which is then renamed over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut contents = String::new();
        contents.push_str("# SRP user database\n");
        contents.push_str("# Format: username:salt_hex:verifier_hex\n");

        {
            let users = self.users.read();
            for cred in users.values() {
                contents.push_str(&format!(
                    "{}:{}:{}\n",
                    cred.username,
                    hex::encode(&cred.salt),
                    hex::encode(&cred.verifier)
                ));
            }
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| {
                Error::persistence(format!("failed to write {}: {}", path.display(), e))
            })
    }

    /// Add a credential. Fails if the username is already registered.
    pub fn register(&self, credential: Credential) -> Result<()> {
        let mut users = self.users.write();
        if users.contains_key(&credential.username) {
            return Err(Error::DuplicateUser(credential.username));
        }
        users.insert(credential.username.clone(), credential);
        Ok(())
    }

    /// Look up a credential by username.
    pub fn lookup(&self, username: &str) -> Option<Credential> {
        self.users.read().get(username).cloned()
    }

    /// Whether a credential exists for the username.
    pub fn contains(&self, username: &str) -> bool {
        self.users.read().contains_key(username)
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn temp_path(tag: &str) -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        std::env::temp_dir().join(format!(
            "srpchat-store-{}-{}-{}.db",
            std::process::id(),
            tag,
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ))
    }

    #[test]
    fn test_register_and_lookup() {
        let store = CredentialStore::new();
        store
            .register(Credential::generate("alice", "sesame"))
            .unwrap();

        let cred = store.lookup("alice").unwrap();
        assert_eq!(cred.username, "alice");
        assert_eq!(cred.salt.len(), SALT_SIZE);
        assert!(!cred.verifier.is_empty());

        assert!(store.lookup("Alice").is_none(), "usernames are case-sensitive");
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let store = CredentialStore::new();
        store
            .register(Credential::generate("alice", "sesame"))
            .unwrap();

        let err = store
            .register(Credential::generate("alice", "other"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateUser(u) if u == "alice"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = temp_path("roundtrip");
        let store = CredentialStore::new();
        store
            .register(Credential::generate("alice", "sesame"))
            .unwrap();
        store
            .register(Credential::generate("bob", "password"))
            .unwrap();
        store.save(&path).unwrap();

        let reloaded = CredentialStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);

        let original = store.lookup("alice").unwrap();
        let restored = reloaded.lookup("alice").unwrap();
        assert_eq!(original.salt, restored.salt);
        assert_eq!(original.verifier, restored.verifier);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_leading_zeros_survive_roundtrip() {
        let path = temp_path("zeros");
        let store = CredentialStore::new();
        store
            .register(Credential {
                username: "carol".into(),
                salt: vec![0x00, 0x01, 0x02, 0x03],
                verifier: vec![0x00, 0x00, 0xab, 0xcd],
            })
            .unwrap();
        store.save(&path).unwrap();

        let reloaded = CredentialStore::load(&path).unwrap();
        let cred = reloaded.lookup("carol").unwrap();
        assert_eq!(cred.verifier, vec![0x00, 0x00, 0xab, 0xcd]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_tolerates_comments_and_junk() {
        let path = temp_path("junk");
        std::fs::write(
            &path,
            "# header\n\nalice:00ff:aabb\nnot a record\nbob:zz:11\n:[bad]:\n",
        )
        .unwrap();

        let store = CredentialStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains("alice"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let store = CredentialStore::load(Path::new("/nonexistent/srpchat.db")).unwrap();
        assert!(store.is_empty());
    }
}
