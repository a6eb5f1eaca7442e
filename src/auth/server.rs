//! The server half of the SRP-6a handshake.
//!
//! Handshake sessions are transient, keyed by the server-issued
//! `user_id`, and exist only in memory. A session is destroyed on
//! verification failure, on explicit clearing (disconnect), or by the
//! TTL sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use num_bigint_dig::BigUint;
use parking_lot::Mutex;

use crate::auth::store::{Credential, CredentialStore};
use crate::crypto::{ct_eq, derive_session_key, AeadKey, SecureRandom, SALT_SIZE};
use crate::error::{Error, Result};
use crate::srp::{self, modulus, EPHEMERAL_SIZE, PROOF_SIZE};

/// How long an unfinished handshake may linger before the sweeper
/// removes it.
pub const HANDSHAKE_TTL: Duration = Duration::from_secs(60);

/// How often the sweeper runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// The server's answer to `SRP_INIT`.
#[derive(Debug)]
pub struct Challenge {
    /// Server-issued opaque session identifier.
    pub user_id: String,
    /// `B = (k·v + g^b) mod N` as wire-form bytes.
    pub b_pub: Vec<u8>,
    /// The user's credential salt.
    pub salt: Vec<u8>,
    /// The room salt (HKDF salt for the session key).
    pub room_salt: Vec<u8>,
}

/// The server's answer to a valid `SRP_RESPONSE`.
#[derive(Debug)]
pub struct Verification {
    /// `H_AMK = H(A ‖ M ‖ K)`, proving the server knew the verifier.
    pub server_proof: [u8; PROOF_SIZE],
    /// The AEAD session key, HKDF-derived from `K`.
    pub session_key: AeadKey,
}

/// One in-flight handshake.
struct HandshakeSession {
    username: String,
    a_pub: Vec<u8>,
    b: BigUint,
    b_pub: Vec<u8>,
    salt: Vec<u8>,
    verifier: Vec<u8>,
    authenticated: bool,
    created_at: Instant,
}

/// Server-side SRP authenticator.
///
/// Owns the transient handshake-session table and the room salt; shares
/// the credential store with whoever persists it.
pub struct Authenticator {
    store: Arc<CredentialStore>,
    sessions: Mutex<HashMap<String, HandshakeSession>>,
    room_salt: [u8; SALT_SIZE],
}

impl Authenticator {
    /// Create an authenticator over the given credential store,
    /// generating a fresh room salt.
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
            room_salt: SecureRandom::bytes(),
        }
    }

    /// The room salt handed out in every challenge.
    pub fn room_salt(&self) -> &[u8; SALT_SIZE] {
        &self.room_salt
    }

    /// Validate and store a registration credential.
    pub fn register(&self, credential: Credential) -> Result<()> {
        if credential.username.is_empty() {
            return Err(Error::protocol("username cannot be empty"));
        }
        if credential.salt.len() != SALT_SIZE {
            return Err(Error::protocol("registration salt has wrong length"));
        }
        if credential.verifier.is_empty() {
            return Err(Error::protocol("registration verifier is empty"));
        }
        self.store.register(credential)
    }

    /// Begin a handshake: look up the credential, generate `b`, compute
    /// `B`, and stash the session under a fresh `user_id`.
    ///
    /// Rejects `A ≡ 0 (mod N)`. Returns [`Error::UserNotFound`] (a
    /// distinct, non-fatal class) when no credential exists, so the
    /// caller can offer registration.
    pub fn init_authentication(&self, username: &str, a_pub: &[u8]) -> Result<Challenge> {
        let credential = self.store.lookup(username).ok_or(Error::UserNotFound)?;

        let a_pub_int = BigUint::from_bytes_be(a_pub);
        if &a_pub_int % modulus() == BigUint::default() {
            return Err(Error::Auth);
        }

        let b = BigUint::from_bytes_be(&SecureRandom::bytes::<EPHEMERAL_SIZE>());
        let v = BigUint::from_bytes_be(&credential.verifier);
        let b_pub = srp::compute_b_pub(&b, &v).to_bytes_be();

        let user_id = generate_user_id();
        let session = HandshakeSession {
            username: username.to_owned(),
            a_pub: a_pub.to_vec(),
            b,
            b_pub: b_pub.clone(),
            salt: credential.salt.clone(),
            verifier: credential.verifier,
            authenticated: false,
            created_at: Instant::now(),
        };
        self.sessions.lock().insert(user_id.clone(), session);

        Ok(Challenge {
            user_id,
            b_pub,
            salt: credential.salt,
            room_salt: self.room_salt.to_vec(),
        })
    }

    /// Verify the client proof for the session `user_id`.
    ///
    /// On success the session is marked authenticated and the caller
    /// receives the server proof plus the derived AEAD key. On failure
    /// the session is destroyed and only the opaque [`Error::Auth`]
    /// escapes.
    pub fn verify_authentication(&self, user_id: &str, proof: &[u8]) -> Result<Verification> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(user_id).ok_or(Error::Auth)?;

        let u = srp::compute_u(&session.a_pub, &session.b_pub);
        if srp::ensure_nonzero_u(&u).is_err() {
            sessions.remove(user_id);
            return Err(Error::Auth);
        }

        let a_pub_int = BigUint::from_bytes_be(&session.a_pub);
        let v = BigUint::from_bytes_be(&session.verifier);
        let s = srp::premaster_server(&a_pub_int, &v, &u, &session.b);
        let key = srp::session_hash(&s);

        let expected =
            srp::compute_m(&session.username, &session.salt, &session.a_pub, &session.b_pub, &key);
        if !ct_eq(proof, &expected) {
            sessions.remove(user_id);
            return Err(Error::Auth);
        }

        session.authenticated = true;
        let server_proof = srp::compute_server_proof(&session.a_pub, &expected, &key);
        let session_key = derive_session_key(&key, &self.room_salt);

        Ok(Verification {
            server_proof,
            session_key,
        })
    }

    /// Whether a session exists and has passed verification.
    pub fn is_session_valid(&self, user_id: &str) -> bool {
        self.sessions
            .lock()
            .get(user_id)
            .is_some_and(|s| s.authenticated)
    }

    /// Destroy a handshake session (disconnect, protocol violation).
    pub fn clear_session(&self, user_id: &str) {
        self.sessions.lock().remove(user_id);
    }

    /// Remove sessions older than `ttl`. Returns how many were removed.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.created_at.elapsed() <= ttl);
        before - sessions.len()
    }

    /// Number of in-flight handshake sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Run periodic cleanup of expired handshake sessions.
    pub async fn run_sweeper(&self, ttl: Duration, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            let swept = self.sweep_expired(ttl);
            if swept > 0 {
                tracing::debug!("swept {} expired handshake sessions", swept);
            }
        }
    }
}

/// Opaque server-issued identifier: `user_` plus 8 random hex chars.
fn generate_user_id() -> String {
    format!("user_{}", hex::encode(SecureRandom::bytes::<4>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::client::SrpClient;

    fn authenticator_with(username: &str, password: &str) -> Authenticator {
        let store = Arc::new(CredentialStore::new());
        store
            .register(Credential::generate(username, password))
            .unwrap();
        Authenticator::new(store)
    }

    #[test]
    fn test_unknown_user_is_distinct_class() {
        let auth = Authenticator::new(Arc::new(CredentialStore::new()));
        let err = auth.init_authentication("carol", &[1u8]).unwrap_err();
        assert!(matches!(err, Error::UserNotFound));
        assert!(err.keeps_connection_open());
    }

    #[test]
    fn test_zero_a_is_rejected() {
        let auth = authenticator_with("alice", "sesame");

        let err = auth.init_authentication("alice", &[0u8]).unwrap_err();
        assert!(matches!(err, Error::Auth));

        // A = N is ≡ 0 (mod N) as well.
        let err = auth
            .init_authentication("alice", &modulus().to_bytes_be())
            .unwrap_err();
        assert!(matches!(err, Error::Auth));
        assert_eq!(auth.session_count(), 0);
    }

    #[test]
    fn test_failed_verification_destroys_session() {
        let auth = authenticator_with("alice", "sesame");
        let mut client = SrpClient::new("alice", "sesame");

        let a_pub = client.start().unwrap();
        let challenge = auth.init_authentication("alice", &a_pub).unwrap();
        assert_eq!(auth.session_count(), 1);

        let err = auth
            .verify_authentication(&challenge.user_id, &[0u8; PROOF_SIZE])
            .unwrap_err();
        assert!(matches!(err, Error::Auth));
        assert_eq!(auth.session_count(), 0);

        // The session is gone, so even the right proof is now useless.
        let m = client
            .process_challenge(&challenge.b_pub, &challenge.salt, &challenge.room_salt)
            .unwrap();
        assert!(auth.verify_authentication(&challenge.user_id, &m).is_err());
    }

    #[test]
    fn test_session_lifecycle() {
        let auth = authenticator_with("alice", "sesame");
        let mut client = SrpClient::new("alice", "sesame");

        let a_pub = client.start().unwrap();
        let challenge = auth.init_authentication("alice", &a_pub).unwrap();
        assert!(!auth.is_session_valid(&challenge.user_id));

        let m = client
            .process_challenge(&challenge.b_pub, &challenge.salt, &challenge.room_salt)
            .unwrap();
        auth.verify_authentication(&challenge.user_id, &m).unwrap();
        assert!(auth.is_session_valid(&challenge.user_id));

        auth.clear_session(&challenge.user_id);
        assert!(!auth.is_session_valid(&challenge.user_id));
    }

    #[test]
    fn test_sweeper_removes_only_stale_sessions() {
        let auth = authenticator_with("alice", "sesame");
        let mut client = SrpClient::new("alice", "sesame");
        let a_pub = client.start().unwrap();
        auth.init_authentication("alice", &a_pub).unwrap();

        assert_eq!(auth.sweep_expired(Duration::from_secs(60)), 0);
        assert_eq!(auth.session_count(), 1);

        assert_eq!(auth.sweep_expired(Duration::ZERO), 1);
        assert_eq!(auth.session_count(), 0);
    }

    #[test]
    fn test_registration_validation() {
        let auth = Authenticator::new(Arc::new(CredentialStore::new()));

        let mut cred = Credential::generate("dave", "hunter2");
        cred.salt = vec![1, 2, 3];
        assert!(auth.register(cred).is_err());

        let mut cred = Credential::generate("dave", "hunter2");
        cred.username = String::new();
        assert!(auth.register(cred).is_err());

        auth.register(Credential::generate("dave", "hunter2"))
            .unwrap();
        let err = auth
            .register(Credential::generate("dave", "hunter2"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateUser(_)));
    }
}
