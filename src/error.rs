//! Error types for the chat protocol.

use thiserror::Error;

/// Result type alias for chat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during chat operations.
///
/// Each variant corresponds to one class of failure; handlers dispatch on
/// the class, never on the message text.
#[derive(Error, Debug)]
pub enum Error {
    /// Protocol framing error (oversize frame, short read, unknown type).
    /// Closes the connection.
    #[error("framing error: {0}")]
    Frame(String),

    /// Unexpected message or state-machine misuse. Closes the connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Authentication failed. Deliberately opaque: the failing byte, stage
    /// or credential is never revealed.
    #[error("authentication failed")]
    Auth,

    /// The requested user has no stored credential. Not a failure: the
    /// connection stays open so the client can register and retry.
    #[error("user not found")]
    UserNotFound,

    /// Registration for a username that already has a credential.
    /// The connection stays open so the client may log in instead.
    #[error("user '{0}' is already registered")]
    DuplicateUser(String),

    /// A second login for a username that is already active.
    #[error("user '{0}' is already logged in")]
    DuplicateLogin(String),

    /// AEAD or key-material failure (tag mismatch, bad envelope size).
    /// Treated as tampering: the connection is closed.
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// OS-level socket error.
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Credential store load/save failure.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl Error {
    /// Create a new framing error.
    pub fn frame(msg: impl Into<String>) -> Self {
        Error::Frame(msg.into())
    }

    /// Create a new protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a new cryptographic error.
    pub fn crypto(msg: impl Into<String>) -> Self {
        Error::Crypto(msg.into())
    }

    /// Create a new persistence error.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Error::Persistence(msg.into())
    }

    /// Errors that leave the connection usable: the peer may retry
    /// (register after `UserNotFound`, log in after `DuplicateUser`).
    pub fn keeps_connection_open(&self) -> bool {
        matches!(self, Error::UserNotFound | Error::DuplicateUser(_))
    }

    /// Errors that should be reported to the peer as an `ERROR` frame
    /// before the connection is closed.
    pub fn is_reportable(&self) -> bool {
        matches!(
            self,
            Error::Auth | Error::DuplicateLogin(_) | Error::Crypto(_)
        )
    }
}
