//! Shared transport handle for one accepted socket.
//!
//! The read half stays with the worker task that drives the connection;
//! the write half lives here behind an async mutex so the fan-out path
//! can send to any participant. Send and close serialize on that lock,
//! which is never held outside a single await chain.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::protocol::{write_frame, MsgType};

/// Write side of one client connection, shared between the owning worker
/// and the broadcast fan-out.
#[derive(Debug)]
pub struct Connection {
    writer: Mutex<OwnedWriteHalf>,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Wrap the write half of an accepted socket.
    pub fn new(writer: OwnedWriteHalf, peer_addr: SocketAddr) -> Self {
        Self {
            writer: Mutex::new(writer),
            peer_addr,
        }
    }

    /// The peer's socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Send one frame.
    pub async fn send(&self, msg_type: MsgType, payload: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, msg_type, payload).await
    }

    /// Shut the socket down.
    ///
    /// The worker holding the read half observes EOF and exits; errors
    /// here are ignored because the peer may already be gone.
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}
