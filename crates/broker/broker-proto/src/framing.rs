use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{Request, Response};

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    TooLarge(u32, u32),

    #[error("received an empty frame")]
    Empty,

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("authentication failed")]
    AuthFailed,
}

/// Reads one length-prefixed frame: a 4-byte big-endian length followed by
/// exactly that many payload bytes.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, max_message_size: u32) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len == 0 {
        return Err(FramingError::Empty);
    }
    if len > max_message_size {
        return Err(FramingError::TooLarge(len, max_message_size));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Writes one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<(), FramingError> {
    let len = (body.len() as u32).to_be_bytes();
    writer.write_all(&len).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R, max_message_size: u32) -> Result<Request, FramingError> {
    let body = read_frame(reader, max_message_size).await?;
    Ok(serde_json::from_slice(&body)?)
}

pub async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> Result<(), FramingError> {
    let body = serde_json::to_vec(response)?;
    write_frame(writer, &body).await
}

/// Performs the preshared-key handshake: the client's first frame must be
/// the raw UTF-8 auth key. The server does not otherwise acknowledge
/// success — the connection simply proceeds to the request/response loop.
pub async fn authenticate<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_message_size: u32,
    expected_key: &str,
) -> Result<(), FramingError> {
    let body = read_frame(reader, max_message_size).await?;
    if body == expected_key.as_bytes() {
        Ok(())
    } else {
        Err(FramingError::AuthFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn frame_round_trip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();
        let mut cursor = Cursor::new(buf);
        let got = read_frame(&mut cursor, 1024).await.unwrap();
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &vec![0u8; 100]).await.unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(read_frame(&mut cursor, 10).await.is_err());
    }

    #[tokio::test]
    async fn authentication_checks_the_shared_key() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"correct-key").await.unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(authenticate(&mut cursor, 1024, "correct-key").await.is_ok());

        let mut buf2 = Vec::new();
        write_frame(&mut buf2, b"wrong-key").await.unwrap();
        let mut cursor2 = Cursor::new(buf2);
        assert!(authenticate(&mut cursor2, 1024, "correct-key").await.is_err());
    }
}
