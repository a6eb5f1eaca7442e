//! Packet framing and typed messages.
//!
//! Every unit on the wire is one frame:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────┐
//! │ type (u16 LE)│ size (u32 LE)│ payload (size bytes) │
//! └──────────────┴──────────────┴──────────────────────┘
//! ```
//!
//! Payloads use the primitives in [`wire`]; the schemas live in
//! [`messages`]. Frames above [`MAX_FRAME_SIZE`] are rejected before the
//! payload is allocated.

pub mod messages;
pub mod wire;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Maximum payload size of a single frame (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame header size in bytes.
pub const HEADER_SIZE: usize = 6;

/// Message types carried in the frame header.
///
/// Ordinals are stable; client and server must agree on them.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    /// Server → client: history and active-user snapshot after login.
    Init = 1,
    /// Client → server: encrypted chat message.
    Message = 2,
    /// Server → client: encrypted chat message fan-out.
    Broadcast = 3,
    /// Server → client: a user joined.
    UserJoined = 4,
    /// Server → client: a user left.
    UserLeft = 5,
    /// Client → server: clean disconnect.
    Disconnect = 6,
    /// Server → client: error report.
    Error = 7,
    /// Client → server: store a new credential.
    SrpRegister = 8,
    /// Server → client: registration accepted.
    SrpRegisterAck = 9,
    /// Client → server: begin authentication (username, A).
    SrpInit = 10,
    /// Server → client: challenge (user_id, B, salt, room salt).
    SrpChallenge = 11,
    /// Client → server: client proof M.
    SrpResponse = 12,
    /// Server → client: server proof H_AMK.
    SrpSuccess = 13,
    /// Server → client: no such user; registration is possible.
    SrpUserNotFound = 14,
}

impl TryFrom<u16> for MsgType {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            1 => Ok(MsgType::Init),
            2 => Ok(MsgType::Message),
            3 => Ok(MsgType::Broadcast),
            4 => Ok(MsgType::UserJoined),
            5 => Ok(MsgType::UserLeft),
            6 => Ok(MsgType::Disconnect),
            7 => Ok(MsgType::Error),
            8 => Ok(MsgType::SrpRegister),
            9 => Ok(MsgType::SrpRegisterAck),
            10 => Ok(MsgType::SrpInit),
            11 => Ok(MsgType::SrpChallenge),
            12 => Ok(MsgType::SrpResponse),
            13 => Ok(MsgType::SrpSuccess),
            14 => Ok(MsgType::SrpUserNotFound),
            other => Err(Error::frame(format!("unknown message type: {}", other))),
        }
    }
}

/// Read one frame from the stream.
///
/// # Errors
///
/// - [`Error::Frame`] for an oversize declaration (checked before any
///   payload allocation), an unknown type, or EOF inside the payload
/// - [`Error::Network`] for socket errors, including EOF at a frame
///   boundary (the peer hung up)
pub async fn read_frame<R>(reader: &mut R) -> Result<(MsgType, Bytes)>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader
        .read_exact(&mut header)
        .await
        .map_err(Error::Network)?;

    let raw_type = u16::from_le_bytes([header[0], header[1]]);
    let size = u32::from_le_bytes([header[2], header[3], header[4], header[5]]) as usize;

    if size > MAX_FRAME_SIZE {
        return Err(Error::frame(format!(
            "declared payload of {} bytes exceeds the {} byte limit",
            size, MAX_FRAME_SIZE
        )));
    }
    let msg_type = MsgType::try_from(raw_type)?;

    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::frame("connection closed mid-payload")
        } else {
            Error::Network(e)
        }
    })?;

    Ok((msg_type, Bytes::from(payload)))
}

/// Write one frame to the stream.
///
/// Header and payload go out in a single write.
pub async fn write_frame<W>(writer: &mut W, msg_type: MsgType, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(Error::frame(format!(
            "refusing to send a {} byte payload",
            payload.len()
        )));
    }

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u16_le(msg_type as u16);
    frame.put_u32_le(payload.len() as u32);
    frame.put_slice(payload);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        write_frame(&mut a, MsgType::Message, b"payload bytes")
            .await
            .unwrap();
        let (msg_type, payload) = read_frame(&mut b).await.unwrap();

        assert_eq!(msg_type, MsgType::Message);
        assert_eq!(payload.as_ref(), b"payload bytes");
    }

    #[tokio::test]
    async fn test_empty_payload_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(64);

        write_frame(&mut a, MsgType::Disconnect, &[]).await.unwrap();
        let (msg_type, payload) = read_frame(&mut b).await.unwrap();

        assert_eq!(msg_type, MsgType::Disconnect);
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_oversize_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);

        // Hand-craft a header declaring 2 MiB; no payload follows.
        let mut header = BytesMut::new();
        header.put_u16_le(MsgType::Message as u16);
        header.put_u32_le((2 * 1024 * 1024) as u32);
        tokio::io::AsyncWriteExt::write_all(&mut a, &header)
            .await
            .unwrap();

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, Error::Frame(_)));
    }

    #[tokio::test]
    async fn test_unknown_type_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);

        let mut header = BytesMut::new();
        header.put_u16_le(0xBEEF);
        header.put_u32_le(0);
        tokio::io::AsyncWriteExt::write_all(&mut a, &header)
            .await
            .unwrap();

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, Error::Frame(_)));
    }

    #[tokio::test]
    async fn test_premature_eof_in_payload() {
        let (mut a, mut b) = tokio::io::duplex(64);

        let mut partial = BytesMut::new();
        partial.put_u16_le(MsgType::Message as u16);
        partial.put_u32_le(100);
        partial.put_slice(b"only a few bytes");
        tokio::io::AsyncWriteExt::write_all(&mut a, &partial)
            .await
            .unwrap();
        drop(a);

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, Error::Frame(_)));
    }

    #[tokio::test]
    async fn test_eof_at_boundary_is_network_class() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
