//! Length-prefixed CBOR frames.
//!
//! ```text
//! [ u32 big-endian body length ][ CBOR body ]
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, TransportError};

/// Largest accepted frame body.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Encode a value as a complete frame, prefix included.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; 4];
    ciborium::into_writer(value, &mut buf).map_err(|e| TransportError::Codec(e.to_string()))?;

    let size = buf.len() - 4;
    if size > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    buf[..4].copy_from_slice(&(size as u32).to_be_bytes());
    Ok(buf)
}

/// Decode a frame body (without the length prefix).
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    ciborium::from_reader(body).map_err(|e| TransportError::Codec(e.to_string()))
}

/// Write one frame.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(value)?;
    tracing::trace!(bytes = frame.len(), "writing frame");
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
///
/// A clean end of stream before the length prefix is reported as
/// [`TransportError::ConnectionClosed`].
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let size = u32::from_be_bytes(len_bytes) as usize;
    if size > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    tracing::trace!(bytes = size, "read frame");
    decode_body(&body)
}
