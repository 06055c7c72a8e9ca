//! Length-delimited record framing over a reliable byte stream
//!
//! Every record travels as a 4-byte big-endian length followed by a bincode
//! payload of exactly that many bytes. Because the length is read before the
//! payload is decoded, an undecodable payload can be skipped without losing
//! the next frame boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted in either direction
pub const MAX_FRAME_LEN: usize = 4096;

const HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode record: {0}")]
    Encode(bincode::Error),

    #[error("failed to decode record: {0}")]
    Decode(bincode::Error),

    #[error("frame of {len} bytes exceeds MAX_FRAME_LEN")]
    Oversized { len: usize },

    #[error("stream closed in the middle of a frame")]
    UnexpectedEof,
}

impl FrameError {
    /// Whether the stream can no longer be trusted to deliver frames.
    ///
    /// A bad payload leaves the stream aligned on the next frame; anything
    /// else means the session is over.
    pub fn is_connection_fault(&self) -> bool {
        !matches!(self, FrameError::Decode(_) | FrameError::Encode(_))
    }
}

/// Serializes a record into a complete frame, header included
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, FrameError> {
    let payload = bincode::serialize(record).map_err(FrameError::Encode)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::Oversized { len: payload.len() });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes one frame payload (without its header)
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, FrameError> {
    bincode::deserialize(payload).map_err(FrameError::Decode)
}

pub async fn write_frame<W, T>(writer: &mut W, record: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode(record)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next complete frame payload.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
/// Partial reads are accumulated until the frame is whole.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;

    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(FrameError::UnexpectedEof)
            };
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::Oversized { len });
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(Some(payload)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FrameError::UnexpectedEof),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ClientPacket, Intent, Moving};
    use tokio_test::io::Builder;

    fn intent_packet(paddle_y: f32) -> ClientPacket {
        ClientPacket::Intent(Intent {
            paddle_y,
            moving: Moving::None,
            report: None,
        })
    }

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(64);

        write_frame(&mut a, &intent_packet(42.0)).await.unwrap();
        let payload = read_frame(&mut b).await.unwrap().unwrap();
        let packet: ClientPacket = decode(&payload).unwrap();

        assert_eq!(packet, intent_packet(42.0));
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let frame = encode(&intent_packet(7.0)).unwrap();
        let mut reader = Builder::new()
            .read(&frame[..2])
            .read(&frame[2..5])
            .read(&frame[5..])
            .build();

        let payload = read_frame(&mut reader).await.unwrap().unwrap();
        let packet: ClientPacket = decode(&payload).unwrap();
        assert_eq!(packet, intent_packet(7.0));
    }

    #[tokio::test]
    async fn test_clean_eof_between_frames() {
        let frame = encode(&intent_packet(1.0)).unwrap();
        let mut reader = Builder::new().read(&frame).build();

        assert!(read_frame(&mut reader).await.unwrap().is_some());
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_inside_frame_is_fault() {
        let frame = encode(&intent_packet(1.0)).unwrap();
        let mut reader = Builder::new().read(&frame[..frame.len() - 1]).build();

        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedEof));
        assert!(err.is_connection_fault());

        let mut reader = Builder::new().read(&frame[..2]).build();
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_oversized_header_rejected() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        let mut reader = Builder::new().read(&header).build();

        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(err, FrameError::Oversized { len } if len == MAX_FRAME_LEN + 1));
        assert!(err.is_connection_fault());
    }

    #[tokio::test]
    async fn test_malformed_payload_keeps_boundary() {
        let mut bytes = vec![0, 0, 0, 3, 0xFF, 0xFF, 0xFF];
        bytes.extend(encode(&intent_packet(99.0)).unwrap());
        let mut reader = Builder::new().read(&bytes).build();

        let garbage = read_frame(&mut reader).await.unwrap().unwrap();
        let err = decode::<ClientPacket>(&garbage).unwrap_err();
        assert!(!err.is_connection_fault());

        let payload = read_frame(&mut reader).await.unwrap().unwrap();
        let packet: ClientPacket = decode(&payload).unwrap();
        assert_eq!(packet, intent_packet(99.0));
    }

    #[test]
    fn test_empty_payload_fails_to_decode() {
        let result: Result<ClientPacket, _> = decode(&[]);
        assert!(result.is_err());
    }
}
