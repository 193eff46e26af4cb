use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FrameError;

// [length][payload]
// [length] is 4 bytes little endian and counts only the payload
pub const FRAME_LENGTH_BYTES: usize = 4;

#[derive(Debug)]
enum ReadState {
    WaitingForLength,
    WaitingForFrame { expected_length: usize },
}

/// Reads one length-prefixed payload. A clean EOF before the length yields `FrameError::Closed`.
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut state = ReadState::WaitingForLength;
    loop {
        match state {
            ReadState::WaitingForLength => {
                let mut length_buffer = [0u8; FRAME_LENGTH_BYTES];
                match reader.read_exact(&mut length_buffer).await {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        return Err(FrameError::Closed);
                    }
                    Err(e) => return Err(FrameError::Read(e)),
                }
                let expected_length = u32::from_le_bytes(length_buffer) as usize;
                if expected_length > max_frame_bytes {
                    return Err(FrameError::FrameTooLarge(expected_length, max_frame_bytes));
                }
                state = ReadState::WaitingForFrame { expected_length };
            }
            ReadState::WaitingForFrame { expected_length } => {
                let mut payload = vec![0u8; expected_length];
                reader
                    .read_exact(&mut payload)
                    .await
                    .map_err(FrameError::Read)?;
                return Ok(payload);
            }
        }
    }
}

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let length = u32::try_from(payload.len())
        .map_err(|_| FrameError::FrameTooLarge(payload.len(), u32::MAX as usize))?;
    writer
        .write_all(&length.to_le_bytes())
        .await
        .map_err(FrameError::Write)?;
    writer.write_all(payload).await.map_err(FrameError::Write)?;
    writer.flush().await.map_err(FrameError::Write)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_back_what_was_written() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut client, b"hello").await.unwrap();
        write_frame(&mut client, b"").await.unwrap();
        assert_eq!(read_frame(&mut server, 1024).await.unwrap(), b"hello");
        assert_eq!(read_frame(&mut server, 1024).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn rejects_oversized_frames() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut client, &[0u8; 32]).await.unwrap();
        assert!(matches!(
            read_frame(&mut server, 16).await,
            Err(FrameError::FrameTooLarge(32, 16))
        ));
    }

    #[tokio::test]
    async fn eof_is_reported_as_closed() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(matches!(
            read_frame(&mut server, 16).await,
            Err(FrameError::Closed)
        ));
    }
}
