//! The chat client core.
//!
//! [`Connector`] owns a freshly dialed socket and drives registration
//! and the SRP handshake over it; both can run on the same socket, so an
//! unknown user can register and retry without reconnecting. A
//! successful handshake yields a [`ChatClient`], which splits into a
//! receive half ([`ChatEvents`]) and a send half ([`ChatSender`]) so a
//! UI can read and write concurrently.
//!
//! Rendering, line editing and command parsing stay in the binary; this
//! module only decodes frames into [`ChatEvent`]s and encrypts outbound
//! text.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::auth::{Credential, SrpClient};
use crate::crypto::{Aead, AeadKey};
use crate::error::{Error, Result};
use crate::history::{ChatMessage, MessageHistory};
use crate::protocol::messages::{
    ActiveUser, Broadcast, ErrorMsg, Init, Message, SrpChallenge, SrpInit, SrpRegister,
    SrpResponse, SrpSuccess, UserJoined, UserLeft,
};
use crate::protocol::{read_frame, write_frame, MsgType};
use crate::CLIENT_HISTORY_CAPACITY;

/// Something the server told us after login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A chat line, already decrypted under our session key.
    Message {
        /// The sender.
        username: String,
        /// The plaintext.
        text: String,
        /// Server-assigned timestamp (ms since the epoch).
        timestamp_ms: i64,
    },
    /// A user joined the room.
    UserJoined {
        /// The new user's name.
        username: String,
        /// The new user's session identifier.
        user_id: String,
    },
    /// A user left the room.
    UserLeft {
        /// The departing user's name.
        username: String,
    },
    /// The server reported an error.
    ServerError {
        /// Error text from the server.
        message: String,
    },
    /// The server closed the connection.
    Disconnected,
}

/// The state handed over by a successful handshake.
#[derive(Debug)]
pub struct Authenticated {
    user_id: String,
    session_key: AeadKey,
    init: Init,
    /// Chat frames that raced ahead of `INIT` on the wire; replayed
    /// before the socket is read again.
    pending: VecDeque<(MsgType, Bytes)>,
}

/// A dialed but not yet authenticated connection.
pub struct Connector {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl Connector {
    /// Connect to the server.
    pub async fn dial(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self { reader, writer })
    }

    /// Register a fresh credential for `username`.
    ///
    /// Generates the salt and verifier locally; the password itself
    /// never leaves this process.
    pub async fn register(&mut self, username: &str, password: &str) -> Result<()> {
        let credential = Credential::generate(username, password);
        let msg = SrpRegister {
            username: credential.username,
            salt: credential.salt,
            verifier: credential.verifier,
        };
        write_frame(&mut self.writer, MsgType::SrpRegister, &msg.encode()).await?;

        let (msg_type, payload) = read_frame(&mut self.reader).await?;
        match msg_type {
            MsgType::SrpRegisterAck => Ok(()),
            MsgType::Error => {
                let err = ErrorMsg::decode(&payload)?;
                Err(Error::DuplicateUser(err.message))
            }
            other => Err(Error::protocol(format!(
                "expected SRP_REGISTER_ACK, got {:?}",
                other
            ))),
        }
    }

    /// Run the SRP handshake.
    ///
    /// Returns [`Error::UserNotFound`] with the socket still usable, so
    /// the caller can [`Connector::register`] and try again.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<Authenticated> {
        let mut srp = SrpClient::new(username, password);

        let a_pub = srp.start()?;
        let init_msg = SrpInit {
            username: username.to_owned(),
            a_pub,
        };
        write_frame(&mut self.writer, MsgType::SrpInit, &init_msg.encode()).await?;

        let (msg_type, payload) = read_frame(&mut self.reader).await?;
        let challenge = match msg_type {
            MsgType::SrpChallenge => SrpChallenge::decode(&payload)?,
            MsgType::SrpUserNotFound => return Err(Error::UserNotFound),
            MsgType::Error => {
                let err = ErrorMsg::decode(&payload)?;
                return Err(Error::protocol(err.message));
            }
            other => {
                return Err(Error::protocol(format!(
                    "expected SRP_CHALLENGE, got {:?}",
                    other
                )))
            }
        };

        let proof = srp.process_challenge(&challenge.b_pub, &challenge.salt, &challenge.room_salt)?;
        let response = SrpResponse {
            user_id: challenge.user_id.clone(),
            proof: proof.to_vec(),
        };
        write_frame(&mut self.writer, MsgType::SrpResponse, &response.encode()).await?;

        let (msg_type, payload) = read_frame(&mut self.reader).await?;
        let success = match msg_type {
            MsgType::SrpSuccess => SrpSuccess::decode(&payload)?,
            MsgType::Error => return Err(Error::Auth),
            other => {
                return Err(Error::protocol(format!(
                    "expected SRP_SUCCESS, got {:?}",
                    other
                )))
            }
        };
        let session_key = srp.verify_server(&success.server_proof)?;

        // The server follows SRP_SUCCESS with the room snapshot. A
        // broadcast can land first if someone is chatting at the exact
        // moment we are promoted into the registry; hold such frames
        // aside for the event stream.
        let mut pending = VecDeque::new();
        let init = loop {
            let (msg_type, payload) = read_frame(&mut self.reader).await?;
            match msg_type {
                MsgType::Init => break Init::decode(&payload)?,
                MsgType::Broadcast | MsgType::UserJoined | MsgType::UserLeft => {
                    pending.push_back((msg_type, payload));
                }
                MsgType::Error => {
                    let err = ErrorMsg::decode(&payload)?;
                    return Err(Error::protocol(err.message));
                }
                other => {
                    return Err(Error::protocol(format!("expected INIT, got {:?}", other)))
                }
            }
        };

        Ok(Authenticated {
            user_id: challenge.user_id,
            session_key,
            init,
            pending,
        })
    }

    /// Combine the socket with a completed handshake.
    pub fn into_client(self, auth: Authenticated, username: &str) -> ChatClient {
        ChatClient {
            reader: self.reader,
            writer: self.writer,
            username: username.to_owned(),
            auth,
        }
    }
}

/// An authenticated connection, ready to split.
pub struct ChatClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    username: String,
    auth: Authenticated,
}

impl ChatClient {
    /// Our server-issued session identifier.
    pub fn user_id(&self) -> &str {
        &self.auth.user_id
    }

    /// Split into independent receive and send halves.
    pub fn split(self) -> (ChatEvents, ChatSender) {
        let history = MessageHistory::new(CLIENT_HISTORY_CAPACITY);
        for entry in &self.auth.init.history {
            history.push(entry.clone());
        }

        let events = ChatEvents {
            reader: self.reader,
            aead: Aead::new(&self.auth.session_key),
            history,
            users: self.auth.init.users,
            pending: self.auth.pending,
        };
        let sender = ChatSender {
            writer: self.writer,
            aead: Aead::new(&self.auth.session_key),
            username: self.username,
        };
        (events, sender)
    }
}

/// Receive half: decodes and decrypts inbound frames.
pub struct ChatEvents {
    reader: OwnedReadHalf,
    aead: Aead,
    history: MessageHistory,
    users: Vec<ActiveUser>,
    pending: VecDeque<(MsgType, Bytes)>,
}

impl ChatEvents {
    /// Await the next event from the server.
    ///
    /// Messages are decrypted under our session key and recorded in the
    /// bounded local history; the user list tracks joins and leaves. A
    /// failed envelope surfaces as [`Error::Crypto`] - the caller should
    /// drop the connection.
    pub async fn next_event(&mut self) -> Result<ChatEvent> {
        loop {
            let (msg_type, payload) = match self.pending.pop_front() {
                Some(frame) => frame,
                None => match read_frame(&mut self.reader).await {
                    Ok(frame) => frame,
                    Err(Error::Network(_)) => return Ok(ChatEvent::Disconnected),
                    Err(e) => return Err(e),
                },
            };

            match msg_type {
                MsgType::Broadcast => {
                    let msg = Broadcast::decode(&payload)?;
                    let plaintext = self.aead.decrypt(&msg.envelope, b"")?;
                    let text = String::from_utf8(plaintext)
                        .map_err(|_| Error::frame("broadcast text is not valid UTF-8"))?;
                    self.history.push(ChatMessage {
                        username: msg.username.clone(),
                        text: text.clone(),
                        timestamp_ms: msg.timestamp_ms,
                    });
                    return Ok(ChatEvent::Message {
                        username: msg.username,
                        text,
                        timestamp_ms: msg.timestamp_ms,
                    });
                }
                MsgType::UserJoined => {
                    let msg = UserJoined::decode(&payload)?;
                    self.users.push(ActiveUser {
                        username: msg.username.clone(),
                        user_id: msg.user_id.clone(),
                    });
                    return Ok(ChatEvent::UserJoined {
                        username: msg.username,
                        user_id: msg.user_id,
                    });
                }
                MsgType::UserLeft => {
                    let msg = UserLeft::decode(&payload)?;
                    self.users.retain(|u| u.username != msg.username);
                    return Ok(ChatEvent::UserLeft {
                        username: msg.username,
                    });
                }
                MsgType::Error => {
                    let msg = ErrorMsg::decode(&payload)?;
                    return Ok(ChatEvent::ServerError {
                        message: msg.message,
                    });
                }
                other => {
                    tracing::debug!("ignoring unexpected {:?} frame", other);
                }
            }
        }
    }

    /// The bounded local message history.
    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// The current user list.
    pub fn users(&self) -> &[ActiveUser] {
        &self.users
    }
}

/// Send half: encrypts and ships outbound text.
pub struct ChatSender {
    writer: OwnedWriteHalf,
    aead: Aead,
    username: String,
}

impl ChatSender {
    /// Our username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Encrypt a chat line under our session key and send it.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let envelope = self.aead.encrypt(text.as_bytes(), b"")?;
        let msg = Message { envelope };
        write_frame(&mut self.writer, MsgType::Message, &msg.encode()).await
    }

    /// Send a clean disconnect and shut the socket down.
    pub async fn disconnect(mut self) -> Result<()> {
        write_frame(&mut self.writer, MsgType::Disconnect, &[]).await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}
