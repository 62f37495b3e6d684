//! server::stream
//!
//! Bridge from blocking archive writers to a streaming response body.
//!
//! The archive is produced on a blocking thread through [`io::Write`];
//! [`ChannelWriter`] forwards each write into a bounded channel whose
//! receiving end is the response body. A full channel blocks the writer, so
//! memory use is bounded by the channel depth no matter how slow the client
//! is. A dropped body (client gone) turns the next write into
//! `BrokenPipe`.

use std::io::{self, Write};

use axum::body::{Body, Bytes};
use futures::stream;
use tokio::sync::mpsc;

/// Chunks buffered between the writer and the connection.
const CHANNEL_DEPTH: usize = 16;

/// Write size handed to the channel.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Writing end of a streamed body.
#[derive(Debug, Clone)]
pub struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChannelWriter {
    /// Terminate the body with an error, so the client sees a truncated
    /// transfer rather than a complete one.
    ///
    /// Must be called from a blocking thread.
    pub fn abort(&self, message: &str) {
        // The receiver may be gone already; nothing left to tell.
        let _ = self
            .tx
            .blocking_send(Err(io::Error::other(message.to_string())));
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A connected writer/body pair.
pub fn channel_body() -> (ChannelWriter, Body) {
    let (tx, mut rx) = mpsc::channel(CHANNEL_DEPTH);
    let chunks = stream::poll_fn(move |cx| rx.poll_recv(cx));
    (ChannelWriter { tx }, Body::from_stream(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn bytes_arrive_in_order() {
        let (mut writer, body) = channel_body();
        let producer = tokio::task::spawn_blocking(move || {
            writer.write_all(b"hello ").unwrap();
            writer.write_all(b"world").unwrap();
        });

        let collected = body.collect().await.unwrap().to_bytes();
        producer.await.unwrap();
        assert_eq!(&collected[..], b"hello world");
    }

    #[tokio::test]
    async fn abort_fails_the_body() {
        let (mut writer, body) = channel_body();
        let producer = tokio::task::spawn_blocking(move || {
            writer.write_all(b"partial").unwrap();
            writer.abort("read failed");
        });

        assert!(body.collect().await.is_err());
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_body_is_broken_pipe() {
        let (mut writer, body) = channel_body();
        drop(body);
        let err = tokio::task::spawn_blocking(move || writer.write(b"x").unwrap_err())
            .await
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
