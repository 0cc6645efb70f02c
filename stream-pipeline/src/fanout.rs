//! Duplicates one byte stream to several independent writers.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Read size per pump iteration; also the most data held in flight.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("Failed to read source: {0}")]
    Read(#[from] std::io::Error),
    #[error("All fan-out sinks are closed")]
    AllSinksClosed,
}

struct FanoutSink {
    name: String,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    open: bool,
}

/// N-ary byte-stream duplicator.
///
/// Every chunk read from the source is written, in order, to each sink that
/// is still open. A sink whose write fails is marked closed and skipped from
/// then on; the pump only fails once no sink is left open. Only one chunk is
/// buffered, so a slow sink applies backpressure to the source once its own
/// pipe buffer is full.
pub struct FanoutPipe {
    sinks: Vec<FanoutSink>,
    chunk_size: usize,
}

impl Default for FanoutPipe {
    fn default() -> Self {
        Self::new()
    }
}

impl FanoutPipe {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            sinks: Vec::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn add_sink<W>(&mut self, name: impl Into<String>, writer: W)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.sinks.push(FanoutSink {
            name: name.into(),
            writer: Box::new(writer),
            open: true,
        });
    }

    /// Number of sinks still accepting data.
    pub fn open_sinks(&self) -> usize {
        self.sinks.iter().filter(|s| s.open).count()
    }

    /// Copy `source` to every open sink until EOF or cancellation.
    ///
    /// Returns the number of bytes read from the source. Sinks are left
    /// open; call [`FanoutPipe::close`] to release them.
    pub async fn pump<R>(
        &mut self,
        source: &mut R,
        cancel: &CancellationToken,
    ) -> Result<u64, FanoutError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;

        loop {
            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(total),
                read = source.read(&mut buf) => read?,
            };

            if n == 0 {
                return Ok(total);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(total),
                sent = self.broadcast(&buf[..n]) => sent?,
            }

            total += n as u64;
        }
    }

    async fn broadcast(&mut self, chunk: &[u8]) -> Result<(), FanoutError> {
        for sink in self.sinks.iter_mut().filter(|s| s.open) {
            if let Err(e) = sink.writer.write_all(chunk).await {
                tracing::warn!("Fan-out sink {} closed: {}", sink.name, e);
                sink.open = false;
            }
        }

        if self.open_sinks() == 0 {
            return Err(FanoutError::AllSinksClosed);
        }
        Ok(())
    }

    /// Shut down every sink so readers observe end-of-stream.
    pub async fn close(mut self) {
        for sink in self.sinks.iter_mut().filter(|s| s.open) {
            if let Err(e) = sink.writer.shutdown().await {
                tracing::debug!("Fan-out sink {} shutdown: {}", sink.name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn spawn_reader(mut reader: DuplexStream) -> JoinHandle<Vec<u8>> {
        tokio::spawn(async move {
            let mut out = Vec::new();
            reader.read_to_end(&mut out).await.unwrap();
            out
        })
    }

    #[tokio::test]
    async fn test_every_sink_receives_identical_bytes() {
        let data = pattern(200_000);
        let mut fanout = FanoutPipe::with_chunk_size(4096);
        let mut readers = Vec::new();

        for i in 0..3 {
            let (writer, reader) = duplex(1024);
            fanout.add_sink(format!("sink-{}", i), writer);
            readers.push(spawn_reader(reader));
        }

        let mut source = data.as_slice();
        let copied = fanout
            .pump(&mut source, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(copied, data.len() as u64);
        fanout.close().await;

        for reader in readers {
            assert_eq!(reader.await.unwrap(), data);
        }
    }

    #[tokio::test]
    async fn test_closed_sink_does_not_affect_others() {
        let data = pattern(50_000);
        let mut fanout = FanoutPipe::with_chunk_size(1000);

        let (archive_w, archive_r) = duplex(512);
        let (live_w, live_r) = duplex(512);
        fanout.add_sink("archive", archive_w);
        fanout.add_sink("live", live_w);

        drop(live_r);
        let archive = spawn_reader(archive_r);

        let mut source = data.as_slice();
        fanout
            .pump(&mut source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fanout.open_sinks(), 1);
        fanout.close().await;
        assert_eq!(archive.await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_all_sinks_closed_is_an_error() {
        let data = pattern(10_000);
        let mut fanout = FanoutPipe::new();

        let (first_w, first_r) = duplex(64);
        let (second_w, second_r) = duplex(64);
        fanout.add_sink("first", first_w);
        fanout.add_sink("second", second_w);
        drop(first_r);
        drop(second_r);

        let mut source = data.as_slice();
        let result = fanout.pump(&mut source, &CancellationToken::new()).await;
        assert!(matches!(result, Err(FanoutError::AllSinksClosed)));
        assert_eq!(fanout.open_sinks(), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_idle_pump() {
        let mut fanout = FanoutPipe::new();
        let (writer, _reader) = duplex(64);
        fanout.add_sink("only", writer);

        // Source that never produces data
        let (_source_w, mut source) = duplex(64);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let copied = fanout.pump(&mut source, &cancel).await.unwrap();
        assert_eq!(copied, 0);
    }
}
