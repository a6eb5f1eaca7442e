//! # srpchat
//!
//! A multi-user chat server and client authenticated with SRP-6a
//! (RFC 5054, 2048-bit group 14) and encrypted per session with
//! AES-256-GCM.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Chat core (registry, history, fan-out broadcast)       │
//! ├─────────────────────────────────────────────────────────┤
//! │  Authenticator (SRP state machines, credential store)   │
//! ├─────────────────────────────────────────────────────────┤
//! │  Frame codec (typed messages, length-prefixed payloads) │
//! ├─────────────────────────────────────────────────────────┤
//! │  Crypto layer (SRP-6a math, AES-256-GCM, HKDF)          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! A TCP accept yields a connection; the server drives the SRP handshake
//! over the frame codec, registers the session key, and then fans every
//! inbound chat message out to all participants, re-encrypted under each
//! recipient's own session key. No password ever crosses the wire: the
//! server stores only a salted verifier, and both sides derive the AEAD
//! key from the SRP shared secret via HKDF.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod auth;
pub mod client;
pub mod crypto;
pub mod error;
pub mod history;
pub mod protocol;
pub mod server;
pub mod srp;

pub use error::{Error, Result};

/// Messages retained in the server-side room history.
pub const SERVER_HISTORY_CAPACITY: usize = 100;

/// Messages retained client-side between renders.
pub const CLIENT_HISTORY_CAPACITY: usize = 50;
