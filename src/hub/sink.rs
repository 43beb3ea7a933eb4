//! Subscriber connection abstraction
//!
//! The hub only needs something that accepts serialized event text, so any
//! transport (WebSocket writer, SSE stream, in-process channel, stdout) plugs
//! in through `MessageSink`.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Errors a connection reports when it can no longer take messages
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Connection closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live connection that receives serialized events
///
/// A delivery error ends the subscription.
pub trait MessageSink: Send + 'static {
    /// Delivers one serialized event
    fn deliver(&mut self, message: Arc<str>) -> impl Future<Output = Result<(), SinkError>> + Send;
}

impl MessageSink for mpsc::Sender<Arc<str>> {
    async fn deliver(&mut self, message: Arc<str>) -> Result<(), SinkError> {
        self.send(message).await.map_err(|_| SinkError::Closed)
    }
}

impl MessageSink for mpsc::UnboundedSender<Arc<str>> {
    async fn deliver(&mut self, message: Arc<str>) -> Result<(), SinkError> {
        self.send(message).map_err(|_| SinkError::Closed)
    }
}

/// Writes each event as one line of JSON
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<tokio::io::Stdout> {
    /// JSON-lines sink on standard output
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> MessageSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn deliver(&mut self, message: Arc<str>) -> Result<(), SinkError> {
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (mut tx, mut rx) = mpsc::channel::<Arc<str>>(1);
        tx.deliver(Arc::from("hello")).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (mut tx, rx) = mpsc::channel::<Arc<str>>(1);
        drop(rx);
        let result = tx.deliver(Arc::from("hello")).await;
        assert!(matches!(result, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn test_writer_sink_writes_lines() {
        let mut sink = WriterSink::new(Vec::<u8>::new());
        sink.deliver(Arc::from(r#"{"a":1}"#)).await.unwrap();
        sink.deliver(Arc::from(r#"{"b":2}"#)).await.unwrap();

        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(written, "{\"a\":1}\n{\"b\":2}\n");
    }
}
