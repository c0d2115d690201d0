//! Chunked streaming delivery
//!
//! Copies a reader into a sink one fixed-size chunk at a time. Each chunk is
//! handed to the sink and the send is awaited before the next read, so at most
//! one chunk is held in memory regardless of blob size.

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The receiving side went away (client disconnected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Sink closed")]
pub struct SinkClosed;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Read failed after {sent} bytes: {source}")]
    Read {
        sent: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Client disconnected after {sent} bytes")]
    SinkClosed { sent: u64 },
}

/// Destination for streamed chunks.
#[async_trait]
pub trait ChunkSink: Send {
    /// Deliver one chunk, waiting until the sink accepts it.
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkClosed>;
}

/// Bounded channel feeding an HTTP response body.
#[async_trait]
impl ChunkSink for mpsc::Sender<Result<Bytes, std::io::Error>> {
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        self.send(Ok(chunk)).await.map_err(|_| SinkClosed)
    }
}

/// Stream `reader` into `sink` in chunks of `chunk_size` bytes.
///
/// Every chunk except the last is exactly `chunk_size` bytes. Returns the
/// number of bytes delivered once the reader reports end of stream. The
/// reader is dropped on return, whatever the outcome.
pub async fn stream<R, S>(mut reader: R, chunk_size: usize, sink: &mut S) -> Result<u64, StreamError>
where
    R: AsyncRead + Unpin + Send,
    S: ChunkSink + ?Sized,
{
    let chunk_size = chunk_size.max(1);
    let mut buf = vec![0u8; chunk_size];
    let mut sent = 0u64;

    loop {
        let filled = fill(&mut reader, &mut buf)
            .await
            .map_err(|source| StreamError::Read { sent, source })?;
        if filled == 0 {
            break;
        }

        sink.send_chunk(Bytes::copy_from_slice(&buf[..filled]))
            .await
            .map_err(|_| StreamError::SinkClosed { sent })?;
        sent += filled as u64;

        // A short chunk means the reader already returned zero bytes
        if filled < chunk_size {
            break;
        }
    }

    Ok(sent)
}

/// Read until `buf` is full or the reader is exhausted.
async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
