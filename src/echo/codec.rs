use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest body a single frame may carry.
pub const MAX_FRAME_SIZE: usize = crate::utils::MAX_BODY_SIZE;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),
}

/// Length-prefixed framing: a 4-byte big-endian body length, then the body.
///
/// A zero length is a valid, empty frame.
#[derive(Debug, Clone, Copy)]
pub struct EchoCodec {
    max_frame_size: usize,
}

impl Default for EchoCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl EchoCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Write one frame and flush.
    pub async fn write_frame<W>(&self, writer: &mut W, body: &[u8]) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        if body.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(body.len()));
        }
        let len = body.len() as u32;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(body).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly between
    /// frames. EOF inside a frame is an error.
    pub async fn read_frame<R>(&self, reader: &mut R) -> Result<Option<Vec<u8>>, CodecError>
    where
        R: AsyncRead + Unpin,
    {
        // Only EOF before the first header byte is a clean close.
        let mut len_bytes = [0u8; 4];
        if reader.read(&mut len_bytes[..1]).await? == 0 {
            return Ok(None);
        }
        reader.read_exact(&mut len_bytes[1..]).await?;

        let len = u32::from_be_bytes(len_bytes) as usize;
        if len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(len));
        }

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        Ok(Some(body))
    }
}
