//! Typed message schemas.
//!
//! Each struct mirrors one frame payload. Binary fields (ephemerals,
//! salts, proofs, AEAD envelopes) are held as raw bytes in the structs
//! and cross the wire base64-encoded (standard alphabet, no line
//! wrapping), matching the field layout in the protocol table.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::history::ChatMessage;
use crate::protocol::wire::{PayloadReader, PayloadWriter};

fn decode_b64(field: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(field)
        .map_err(|_| Error::frame("invalid base64 field"))
}

/// One entry of the active-user list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUser {
    /// The user's name.
    pub username: String,
    /// The server-issued session identifier.
    pub user_id: String,
}

/// `SRP_INIT`: client opens authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpInit {
    /// Who is authenticating.
    pub username: String,
    /// The client's public ephemeral `A`.
    pub a_pub: Vec<u8>,
}

impl SrpInit {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&self.username);
        w.put_string(&BASE64.encode(&self.a_pub));
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            username: r.get_string()?,
            a_pub: decode_b64(&r.get_string()?)?,
        })
    }
}

/// `SRP_CHALLENGE`: server's reply to `SRP_INIT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpChallenge {
    /// Server-issued session identifier.
    pub user_id: String,
    /// The server's public ephemeral `B`.
    pub b_pub: Vec<u8>,
    /// The user's credential salt.
    pub salt: Vec<u8>,
    /// The room salt (HKDF salt for the session key).
    pub room_salt: Vec<u8>,
}

impl SrpChallenge {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&self.user_id);
        w.put_string(&BASE64.encode(&self.b_pub));
        w.put_string(&BASE64.encode(&self.salt));
        w.put_string(&BASE64.encode(&self.room_salt));
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            user_id: r.get_string()?,
            b_pub: decode_b64(&r.get_string()?)?,
            salt: decode_b64(&r.get_string()?)?,
            room_salt: decode_b64(&r.get_string()?)?,
        })
    }
}

/// `SRP_RESPONSE`: client proof `M`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpResponse {
    /// Session identifier from the challenge.
    pub user_id: String,
    /// The client proof `M`.
    pub proof: Vec<u8>,
}

impl SrpResponse {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&self.user_id);
        w.put_string(&BASE64.encode(&self.proof));
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            user_id: r.get_string()?,
            proof: decode_b64(&r.get_string()?)?,
        })
    }
}

/// `SRP_SUCCESS`: server proof `H_AMK`.
///
/// Deliberately carries no key material: both sides derive the session
/// key locally from the SRP shared secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpSuccess {
    /// The server proof `H_AMK`.
    pub server_proof: Vec<u8>,
}

impl SrpSuccess {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&BASE64.encode(&self.server_proof));
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            server_proof: decode_b64(&r.get_string()?)?,
        })
    }
}

/// `SRP_REGISTER`: client submits a fresh credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpRegister {
    /// Username to register.
    pub username: String,
    /// The credential salt.
    pub salt: Vec<u8>,
    /// The verifier `v = g^x mod N`.
    pub verifier: Vec<u8>,
}

impl SrpRegister {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&self.username);
        w.put_string(&BASE64.encode(&self.salt));
        w.put_string(&BASE64.encode(&self.verifier));
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            username: r.get_string()?,
            salt: decode_b64(&r.get_string()?)?,
            verifier: decode_b64(&r.get_string()?)?,
        })
    }
}

/// `INIT`: history and active users for a freshly joined client.
///
/// History entries and user entries are nested composites with their own
/// byte-length prefix, so future fields can be appended without breaking
/// old readers. History text is plaintext: those messages predate the
/// joining user's session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Init {
    /// Room history, oldest first.
    pub history: Vec<ChatMessage>,
    /// Users active at snapshot time.
    pub users: Vec<ActiveUser>,
}

impl Init {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();

        w.put_u32(self.history.len() as u32);
        for entry in &self.history {
            w.put_block(|b| {
                b.put_string(&entry.username);
                b.put_string(&entry.text);
                b.put_i64(entry.timestamp_ms);
            });
        }

        w.put_u32(self.users.len() as u32);
        for user in &self.users {
            w.put_block(|b| {
                b.put_string(&user.username);
                b.put_string(&user.user_id);
            });
        }

        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);

        let history_count = r.get_count()?;
        let mut history = Vec::with_capacity(history_count.min(1024));
        for _ in 0..history_count {
            let mut block = r.get_block()?;
            history.push(ChatMessage {
                username: block.get_string()?,
                text: block.get_string()?,
                timestamp_ms: block.get_i64()?,
            });
        }

        let user_count = r.get_count()?;
        let mut users = Vec::with_capacity(user_count.min(1024));
        for _ in 0..user_count {
            let mut block = r.get_block()?;
            users.push(ActiveUser {
                username: block.get_string()?,
                user_id: block.get_string()?,
            });
        }

        Ok(Self { history, users })
    }
}

/// `MESSAGE`: client sends an encrypted chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// AEAD envelope of the message text.
    pub envelope: Vec<u8>,
}

impl Message {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&BASE64.encode(&self.envelope));
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            envelope: decode_b64(&r.get_string()?)?,
        })
    }
}

/// `BROADCAST`: server fans a chat line out, re-encrypted per recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    /// The sender's username.
    pub username: String,
    /// AEAD envelope under the recipient's session key.
    pub envelope: Vec<u8>,
    /// Server-assigned timestamp, milliseconds since the epoch.
    pub timestamp_ms: i64,
}

impl Broadcast {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&self.username);
        w.put_string(&BASE64.encode(&self.envelope));
        w.put_i64(self.timestamp_ms);
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            username: r.get_string()?,
            envelope: decode_b64(&r.get_string()?)?,
            timestamp_ms: r.get_i64()?,
        })
    }
}

/// `USER_JOINED`: a new user entered the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserJoined {
    /// The new user's name.
    pub username: String,
    /// The new user's session identifier.
    pub user_id: String,
}

impl UserJoined {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&self.username);
        w.put_string(&self.user_id);
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            username: r.get_string()?,
            user_id: r.get_string()?,
        })
    }
}

/// `USER_LEFT`: a user left the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLeft {
    /// The departing user's name.
    pub username: String,
}

impl UserLeft {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&self.username);
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            username: r.get_string()?,
        })
    }
}

/// `ERROR`: server-reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMsg {
    /// Human-readable error text. Never carries secrets.
    pub message: String,
}

impl ErrorMsg {
    /// Encode to a frame payload.
    pub fn encode(&self) -> Bytes {
        let mut w = PayloadWriter::new();
        w.put_string(&self.message);
        w.into_bytes()
    }

    /// Decode from a frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            message: r.get_string()?,
        })
    }
}
