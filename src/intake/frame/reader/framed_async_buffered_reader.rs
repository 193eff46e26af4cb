use crate::{
    error::FrameError,
    intake::frame::{codec::read_frame, reader::FrameReader, Frame},
};
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncRead, BufReader};

pub struct FramedAsyncBufferedReader<T>
where
    T: AsyncRead + Unpin + Sync + Send,
{
    reader: BufReader<T>,
    max_frame_bytes: usize,
}

impl<T: AsyncRead + Unpin + Sync + Send> FramedAsyncBufferedReader<T> {
    pub fn new(stream: T, max_frame_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(stream),
            max_frame_bytes,
        }
    }
}

impl<T: AsyncRead + Unpin + Sync + Send> FrameReader for FramedAsyncBufferedReader<T> {
    fn read<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Frame, FrameError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = read_frame(&mut self.reader, self.max_frame_bytes).await?;
            Frame::try_from(payload.as_slice())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::frame::codec::write_frame;
    use crate::intake::frame::frame::{FINISHED_TAG, PING_TAG};

    #[tokio::test]
    async fn reads_frames_in_order_and_survives_bad_tags() {
        let (mut client, server) = tokio::io::duplex(256);
        write_frame(&mut client, &[PING_TAG]).await.unwrap();
        write_frame(&mut client, &[99]).await.unwrap();
        write_frame(&mut client, &[FINISHED_TAG]).await.unwrap();
        drop(client);

        let mut reader = FramedAsyncBufferedReader::new(server, 1024);
        assert_eq!(reader.read().await.unwrap(), Frame::Ping);
        assert!(matches!(
            reader.read().await,
            Err(FrameError::InvalidFrameTag(99))
        ));
        assert_eq!(reader.read().await.unwrap(), Frame::Finished);
        assert!(matches!(reader.read().await, Err(FrameError::Closed)));
    }
}
