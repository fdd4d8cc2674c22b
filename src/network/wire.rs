//! Length-prefixed framing for the reliable transport.
//!
//! Frame format: [4-byte length (u32 big-endian)][envelope bytes]
//! Maximum frame size: 64KB (chat-scale payloads; oversized frames are a
//! protocol violation, not a retryable condition)

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RelayError;

/// Maximum allowed frame size (64KB)
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

/// Write one envelope as a length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), RelayError> {
    let len = payload.len() as u32;
    if len > MAX_FRAME_SIZE {
        return Err(RelayError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes (max: {})", len, MAX_FRAME_SIZE),
        )));
    }

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame. Returns Ok(None) on clean EOF
/// (association closed).
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, RelayError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(RelayError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes (max: {})", len, MAX_FRAME_SIZE),
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let payload = br#"{"type":"Chat","eventId":42,"plaintext":"hi"}"#;

        let mut buf = Vec::new();
        write_frame(&mut buf, payload).await.unwrap();
        assert_eq!(buf.len(), 4 + payload.len());

        let mut cursor = std::io::Cursor::new(buf);
        let read = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(read, payload);
    }

    #[tokio::test]
    async fn test_eof_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let result = read_frame(&mut cursor).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let len = (MAX_FRAME_SIZE + 1).to_be_bytes();
        let mut cursor = std::io::Cursor::new(len.to_vec());
        assert!(read_frame(&mut cursor).await.is_err());

        let big = vec![0u8; MAX_FRAME_SIZE as usize + 1];
        let mut buf = Vec::new();
        assert!(write_frame(&mut buf, &big).await.is_err());
    }

    #[tokio::test]
    async fn test_two_frames_back_to_back() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"first").await.unwrap();
        write_frame(&mut buf, b"second").await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).await.unwrap().unwrap(), b"first");
        assert_eq!(read_frame(&mut cursor).await.unwrap().unwrap(), b"second");
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }
}
