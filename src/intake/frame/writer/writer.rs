use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncWrite, BufWriter};

use crate::{
    error::FrameError,
    intake::frame::{codec::write_frame, Message},
};

pub trait FrameWriter: Send + Sync {
    fn write<'a>(
        &'a mut self,
        message: &'a Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), FrameError>> + Send + 'a>>;
}

pub struct FramedAsyncBufferedWriter<T>
where
    T: AsyncWrite + Unpin + Sync + Send,
{
    writer: BufWriter<T>,
}

impl<T: AsyncWrite + Unpin + Sync + Send> FramedAsyncBufferedWriter<T> {
    pub fn new(writer: T) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

impl<T: AsyncWrite + Unpin + Sync + Send> FrameWriter for FramedAsyncBufferedWriter<T> {
    fn write<'a>(
        &'a mut self,
        message: &'a Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), FrameError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = message.encode()?;
            write_frame(&mut self.writer, &payload).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::frame::codec::read_frame;
    use crate::intake::frame::message::{ERROR_TAG, PONG_TAG};

    #[tokio::test]
    async fn each_message_is_flushed_as_one_frame() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut writer = FramedAsyncBufferedWriter::new(client);
        writer.write(&Message::Pong).await.unwrap();
        writer.write(&Message::error("nope")).await.unwrap();

        assert_eq!(read_frame(&mut server, 1024).await.unwrap(), vec![PONG_TAG]);
        let error = read_frame(&mut server, 1024).await.unwrap();
        assert_eq!(error[0], ERROR_TAG);
        assert_eq!(&error[1..], br#"{"message":"nope"}"#);
    }
}
