//! Authentication: SRP state machines and the credential store.
//!
//! The server half owns the credential store and a table of transient
//! handshake sessions; the client half walks the mirror-image state
//! machine. Both converge on the same HKDF-derived AEAD session key
//! without any key material crossing the wire.

mod client;
mod server;
mod store;

pub use client::{ClientState, SrpClient};
pub use server::{Authenticator, Challenge, Verification, HANDSHAKE_TTL, SWEEP_INTERVAL};
pub use store::{Credential, CredentialStore};
