//! The client half of the SRP-6a handshake.

use num_bigint_dig::BigUint;
use zeroize::Zeroizing;

use crate::crypto::{ct_eq, derive_session_key, AeadKey, SecureRandom};
use crate::error::{Error, Result};
use crate::srp::{self, modulus, EPHEMERAL_SIZE, PROOF_SIZE};

/// Client handshake state.
///
/// `Authenticated` and `Failed` are terminal; any protocol violation or
/// verification failure lands in `Failed` and the session cannot be
/// restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No ephemeral generated yet.
    Init,
    /// `A` sent, waiting for the server's challenge.
    AwaitChallenge,
    /// Proof sent, waiting for the server's proof.
    AwaitSuccess,
    /// Mutual authentication complete.
    Authenticated,
    /// Handshake failed.
    Failed,
}

/// Client-side SRP session.
pub struct SrpClient {
    username: String,
    password: Zeroizing<String>,
    state: ClientState,
    a: Option<BigUint>,
    a_pub: Vec<u8>,
    shared_key: Option<[u8; PROOF_SIZE]>,
    proof: Option<[u8; PROOF_SIZE]>,
    session_key: Option<AeadKey>,
}

impl SrpClient {
    /// Create a new session for the given identity.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_owned(),
            password: Zeroizing::new(password.to_owned()),
            state: ClientState::Init,
            a: None,
            a_pub: Vec::new(),
            shared_key: None,
            proof: None,
            session_key: None,
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Generate the private ephemeral `a` and return `A = g^a mod N`
    /// as wire-form bytes.
    ///
    /// Fails unless the session is in [`ClientState::Init`].
    pub fn start(&mut self) -> Result<Vec<u8>> {
        if self.state != ClientState::Init {
            return Err(Error::protocol("handshake already started"));
        }

        let a = BigUint::from_bytes_be(&SecureRandom::bytes::<EPHEMERAL_SIZE>());
        self.a_pub = srp::compute_a_pub(&a).to_bytes_be();
        self.a = Some(a);
        self.state = ClientState::AwaitChallenge;

        Ok(self.a_pub.clone())
    }

    /// Process the server's challenge and produce the client proof `M`.
    ///
    /// Rejects `B ≡ 0 (mod N)` and `u = 0`. Also derives the AEAD session
    /// key, released later by [`SrpClient::verify_server`].
    pub fn process_challenge(
        &mut self,
        b_pub: &[u8],
        salt: &[u8],
        room_salt: &[u8],
    ) -> Result<[u8; PROOF_SIZE]> {
        if self.state != ClientState::AwaitChallenge {
            return Err(Error::protocol("not awaiting a challenge"));
        }
        let a = self
            .a
            .as_ref()
            .ok_or_else(|| Error::protocol("missing ephemeral"))?;

        let b_pub_int = BigUint::from_bytes_be(b_pub);
        if &b_pub_int % modulus() == BigUint::default() {
            self.state = ClientState::Failed;
            return Err(Error::Auth);
        }

        let u = srp::compute_u(&self.a_pub, b_pub);
        if srp::ensure_nonzero_u(&u).is_err() {
            self.state = ClientState::Failed;
            return Err(Error::Auth);
        }

        let x = srp::compute_x(salt, &self.username, &self.password);
        let s = srp::premaster_client(&b_pub_int, &x, a, &u);
        let key = srp::session_hash(&s);
        let proof = srp::compute_m(&self.username, salt, &self.a_pub, b_pub, &key);

        self.session_key = Some(derive_session_key(&key, room_salt));
        self.shared_key = Some(key);
        self.proof = Some(proof);
        self.state = ClientState::AwaitSuccess;

        Ok(proof)
    }

    /// Verify the server's proof `H_AMK` and release the session key.
    ///
    /// The comparison is constant-time; a mismatch reports only the
    /// opaque [`Error::Auth`] without revealing which byte differed.
    pub fn verify_server(&mut self, server_proof: &[u8]) -> Result<AeadKey> {
        if self.state != ClientState::AwaitSuccess {
            return Err(Error::protocol("not awaiting server proof"));
        }
        let (proof, key) = match (self.proof.as_ref(), self.shared_key.as_ref()) {
            (Some(p), Some(k)) => (p, k),
            _ => return Err(Error::protocol("challenge not processed")),
        };

        let expected = srp::compute_server_proof(&self.a_pub, proof, key);
        if !ct_eq(server_proof, &expected) {
            self.state = ClientState::Failed;
            return Err(Error::Auth);
        }

        self.state = ClientState::Authenticated;
        self.session_key
            .clone()
            .ok_or_else(|| Error::protocol("missing session key"))
    }
}
