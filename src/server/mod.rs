//! The chat server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Chat Server                              │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────┐  │
//! │  │   TCP Listener   │  │  SRP             │  │  Credential  │  │
//! │  │   (accept loop)  │  │  Authenticator   │  │  Store       │  │
//! │  └────────┬─────────┘  └────────┬─────────┘  └──────┬───────┘  │
//! │           │                     │                    │          │
//! │           ▼                     ▼                    ▼          │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │                 Connection Registry                       │  │
//! │  │  • user_id ↔ username ↔ transport ↔ session key          │  │
//! │  │  • atomic duplicate-login rejection                      │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! │                              │                                  │
//! │                              ▼                                  │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │                 Fan-out Broadcast                         │  │
//! │  │  • bounded history                                        │  │
//! │  │  • per-recipient AEAD re-encryption                      │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One task per accepted connection. Each worker drives the SRP
//! handshake to completion, promotes the connection into the registry,
//! then loops on inbound frames until disconnect or error. The accept
//! loop, the workers and the broadcast path never hold a registry lock
//! across socket I/O.

mod connection;
mod registry;

pub use connection::Connection;
pub use registry::{ConnectionRegistry, Member};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use crate::auth::{Authenticator, Credential, CredentialStore, HANDSHAKE_TTL, SWEEP_INTERVAL};
use crate::crypto::{Aead, AeadKey};
use crate::error::{Error, Result};
use crate::history::{ChatMessage, MessageHistory};
use crate::protocol::messages::{
    Broadcast, ErrorMsg, Init, Message, SrpChallenge, SrpInit, SrpRegister, SrpResponse,
    SrpSuccess, UserJoined, UserLeft,
};
use crate::protocol::{read_frame, MsgType};
use crate::SERVER_HISTORY_CAPACITY;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Port to listen on (0 lets the OS pick, for tests).
    pub port: u16,
    /// Credential store file.
    pub credential_path: PathBuf,
    /// Room history capacity.
    pub history_capacity: usize,
}

impl ServerConfig {
    /// Configuration with default capacities.
    pub fn new(port: u16, credential_path: impl Into<PathBuf>) -> Self {
        Self {
            port,
            credential_path: credential_path.into(),
            history_capacity: SERVER_HISTORY_CAPACITY,
        }
    }
}

/// Main server instance.
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    store: Arc<CredentialStore>,
    auth: Arc<Authenticator>,
    registry: Arc<ConnectionRegistry>,
    history: Arc<MessageHistory>,
    shutdown: Notify,
}

impl Server {
    /// Load the credential store and bind the listener.
    ///
    /// A missing credential file yields an empty store; a bind failure
    /// is fatal and surfaces immediately.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let store = Arc::new(CredentialStore::load(&config.credential_path)?);
        tracing::info!(
            "loaded {} credential(s) from {}",
            store.len(),
            config.credential_path.display()
        );

        let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
        let history = Arc::new(MessageHistory::new(config.history_capacity));

        Ok(Self {
            auth: Arc::new(Authenticator::new(Arc::clone(&store))),
            registry: Arc::new(ConnectionRegistry::new()),
            history,
            store,
            listener,
            config,
            shutdown: Notify::new(),
        })
    }

    /// The bound listen address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of authenticated connections.
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// The room history.
    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Persist the credential store to its configured path.
    pub fn save_credentials(&self) -> Result<()> {
        self.store.save(&self.config.credential_path)
    }

    /// Run the accept loop until [`Server::stop`] is called.
    ///
    /// Each accepted socket gets its own worker task; accept errors are
    /// logged and the loop continues.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        tracing::info!("chat server listening on {}", self.local_addr()?);

        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            sweeper.auth.run_sweeper(HANDSHAKE_TTL, SWEEP_INTERVAL).await;
        });

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let server = Arc::clone(self);
                        tokio::spawn(async move {
                            tracing::debug!("new connection from {}", peer_addr);
                            server.handle_connection(stream, peer_addr).await;
                        });
                    }
                    Err(e) => tracing::warn!("accept error: {}", e),
                }
            }
        }

        self.close_all().await;
        tracing::info!("server stopped");
        Ok(())
    }

    /// Stop the accept loop and close every active connection.
    ///
    /// Workers observe the closed sockets as read errors and exit;
    /// socket closure is the only cancellation signal.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    async fn close_all(&self) {
        for member in self.registry.drain() {
            member.connection.close().await;
        }
    }

    /// Drive one connection from accept to close.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("set_nodelay failed for {}: {}", peer_addr, e);
        }
        let (mut reader, writer) = stream.into_split();
        let conn = Arc::new(Connection::new(writer, peer_addr));

        let handshake = self.drive_handshake(&mut reader, &conn).await;
        let (user_id, username, session_key) = match handshake {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_reportable() {
                    self.report_error(&conn, &e).await;
                }
                tracing::debug!("handshake with {} failed: {}", peer_addr, e);
                conn.close().await;
                return;
            }
        };

        // Promote into the registry; a concurrent login for the same
        // username loses here, atomically.
        let member = Member {
            user_id: user_id.clone(),
            username: username.clone(),
            connection: Arc::clone(&conn),
            session_key,
        };
        let member = match self.registry.insert(member) {
            Ok(m) => m,
            Err(e) => {
                self.report_error(&conn, &e).await;
                tracing::info!("rejected duplicate login for '{}'", username);
                self.auth.clear_session(&user_id);
                conn.close().await;
                return;
            }
        };
        tracing::info!("user '{}' ({}) joined from {}", username, user_id, peer_addr);

        // The new user's INIT must be on the wire before anyone hears
        // USER_JOINED about them.
        let init = Init {
            history: self.history.snapshot(),
            users: self.registry.active_users(),
        };
        if conn.send(MsgType::Init, &init.encode()).await.is_err() {
            self.depart(&member, false).await;
            return;
        }

        let joined = UserJoined {
            username: username.clone(),
            user_id: user_id.clone(),
        };
        self.broadcast_except(&user_id, MsgType::UserJoined, &joined.encode())
            .await;

        let result = self.message_loop(&mut reader, &member).await;
        if let Err(e) = result {
            if e.is_reportable() {
                self.report_error(&conn, &e).await;
            }
            tracing::debug!("connection with '{}' ended: {}", username, e);
        }

        self.depart(&member, true).await;
        tracing::info!("user '{}' disconnected", username);
    }

    /// The pre-authentication loop: registration and SRP handshake.
    ///
    /// Returns `(user_id, username, session_key)` on success. Failures
    /// that keep the connection open (unknown user, duplicate
    /// registration) are reported to the peer inside the loop; anything
    /// else propagates and closes the connection.
    async fn drive_handshake(
        &self,
        reader: &mut OwnedReadHalf,
        conn: &Arc<Connection>,
    ) -> Result<(String, String, AeadKey)> {
        loop {
            let (msg_type, payload) = read_frame(reader).await?;
            match msg_type {
                MsgType::SrpRegister => {
                    let msg = SrpRegister::decode(&payload)?;
                    let credential = Credential {
                        username: msg.username,
                        salt: msg.salt,
                        verifier: msg.verifier,
                    };
                    match self.auth.register(credential) {
                        Ok(()) => {
                            // Persist right away so a crash cannot lose
                            // the registration the client saw succeed.
                            if let Err(e) = self.save_credentials() {
                                tracing::warn!("credential save failed: {}", e);
                            }
                            conn.send(MsgType::SrpRegisterAck, &[]).await?;
                        }
                        Err(e) if e.keeps_connection_open() => {
                            self.report_error(conn, &e).await;
                        }
                        Err(e) => return Err(e),
                    }
                }
                MsgType::SrpInit => {
                    let msg = SrpInit::decode(&payload)?;
                    let challenge = match self.auth.init_authentication(&msg.username, &msg.a_pub)
                    {
                        Ok(c) => c,
                        Err(Error::UserNotFound) => {
                            conn.send(MsgType::SrpUserNotFound, &[]).await?;
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                    let reply = SrpChallenge {
                        user_id: challenge.user_id.clone(),
                        b_pub: challenge.b_pub,
                        salt: challenge.salt,
                        room_salt: challenge.room_salt,
                    };
                    if let Err(e) = conn.send(MsgType::SrpChallenge, &reply.encode()).await {
                        self.auth.clear_session(&challenge.user_id);
                        return Err(e);
                    }

                    return self
                        .finish_handshake(reader, conn, &challenge.user_id, &msg.username)
                        .await;
                }
                other => {
                    return Err(Error::protocol(format!(
                        "unexpected {:?} before authentication",
                        other
                    )))
                }
            }
        }
    }

    /// Await and verify the client proof, then emit `SRP_SUCCESS`.
    async fn finish_handshake(
        &self,
        reader: &mut OwnedReadHalf,
        conn: &Arc<Connection>,
        user_id: &str,
        username: &str,
    ) -> Result<(String, String, AeadKey)> {
        let outcome = async {
            let (msg_type, payload) = read_frame(reader).await?;
            if msg_type != MsgType::SrpResponse {
                return Err(Error::protocol(format!(
                    "expected SRP_RESPONSE, got {:?}",
                    msg_type
                )));
            }
            let response = SrpResponse::decode(&payload)?;
            if response.user_id != user_id {
                return Err(Error::Auth);
            }
            self.auth.verify_authentication(user_id, &response.proof)
        }
        .await;

        let verification = match outcome {
            Ok(v) => v,
            Err(e) => {
                self.auth.clear_session(user_id);
                return Err(e);
            }
        };

        let success = SrpSuccess {
            server_proof: verification.server_proof.to_vec(),
        };
        if let Err(e) = conn.send(MsgType::SrpSuccess, &success.encode()).await {
            self.auth.clear_session(user_id);
            return Err(e);
        }

        Ok((
            user_id.to_owned(),
            username.to_owned(),
            verification.session_key,
        ))
    }

    /// Post-authentication receive loop.
    async fn message_loop(&self, reader: &mut OwnedReadHalf, member: &Member) -> Result<()> {
        let aead = Aead::new(&member.session_key);
        loop {
            let (msg_type, payload) = match read_frame(reader).await {
                Ok(frame) => frame,
                // Transport errors close the connection without fanfare.
                Err(Error::Network(e)) => {
                    tracing::debug!("socket error for '{}': {}", member.username, e);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            match msg_type {
                MsgType::Message => {
                    let msg = Message::decode(&payload)?;
                    // Tag verification failure propagates and closes the
                    // connection; assume tampering.
                    let plaintext = aead.decrypt(&msg.envelope, b"")?;
                    let text = String::from_utf8(plaintext)
                        .map_err(|_| Error::frame("message text is not valid UTF-8"))?;
                    self.relay_message(member, text).await;
                }
                MsgType::Disconnect => return Ok(()),
                other => {
                    tracing::warn!(
                        "ignoring unexpected {:?} from '{}'",
                        other,
                        member.username
                    );
                }
            }
        }
    }

    /// Record a chat line and fan it out, re-encrypted per recipient.
    async fn relay_message(&self, sender: &Member, text: String) {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        self.history.push(ChatMessage {
            username: sender.username.clone(),
            text: text.clone(),
            timestamp_ms,
        });

        // Snapshot under the lock, send outside it. A failed send only
        // skips that recipient; their own worker notices the dead socket.
        let recipients = self.registry.members();
        for recipient in recipients {
            let envelope = match Aead::new(&recipient.session_key).encrypt(text.as_bytes(), b"")
            {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!("encrypt for '{}' failed: {}", recipient.username, e);
                    continue;
                }
            };
            let broadcast = Broadcast {
                username: sender.username.clone(),
                envelope,
                timestamp_ms,
            };
            if let Err(e) = recipient
                .connection
                .send(MsgType::Broadcast, &broadcast.encode())
                .await
            {
                tracing::debug!("broadcast to '{}' failed: {}", recipient.username, e);
            }
        }
    }

    /// Evict a member and notify the remaining users.
    ///
    /// `USER_LEFT` goes out strictly after the departing socket is
    /// closed.
    async fn depart(&self, member: &Member, notify_peers: bool) {
        self.auth.clear_session(&member.user_id);
        if let Some(removed) = self.registry.remove(&member.user_id) {
            removed.connection.close().await;
            if notify_peers {
                let left = UserLeft {
                    username: removed.username.clone(),
                };
                self.broadcast_except(&removed.user_id, MsgType::UserLeft, &left.encode())
                    .await;
            }
        }
    }

    /// Send a frame to every member except one.
    async fn broadcast_except(&self, exclude_user_id: &str, msg_type: MsgType, payload: &[u8]) {
        let recipients = self.registry.members();
        for recipient in recipients {
            if recipient.user_id == exclude_user_id {
                continue;
            }
            if let Err(e) = recipient.connection.send(msg_type, payload).await {
                tracing::debug!("notify '{}' failed: {}", recipient.username, e);
            }
        }
    }

    /// Report an error to the peer as an `ERROR` frame. Best-effort.
    async fn report_error(&self, conn: &Arc<Connection>, error: &Error) {
        let msg = ErrorMsg {
            message: error.to_string(),
        };
        if let Err(e) = conn.send(MsgType::Error, &msg.encode()).await {
            tracing::debug!("error report failed: {}", e);
        }
    }
}
