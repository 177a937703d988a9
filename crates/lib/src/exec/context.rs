//! Owned, scoped I/O streams for a run.
//!
//! A run's output travels through a bounded channel from the execution
//! worker to a single delivery context, batched by byte count instead of
//! throttled per byte. Backpressure comes from the channel bound: a program
//! printing in a tight loop blocks on the channel rather than flooding the
//! consumer. Input comes from an [`InputSource`] chosen by the embedder
//! (an editor-backed source in the IDE, a channel or empty source here).
//!
//! Writers are meant for blocking worker threads; the async side uses
//! [`OutputPipe::line`] for its own messages and [`OutputReceiver`] to
//! drain.

use std::io;

use tokio::sync::mpsc;

/// Bound of the chunk channel between worker and delivery context.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Writer buffer size that forces a chunk send.
pub const FLUSH_THRESHOLD: usize = 4096;

/// Which stream a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
  Out,
  Err,
}

/// One ordered batch of output bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
  pub stream: StreamKind,
  pub bytes: Vec<u8>,
}

/// Sending half of a run's output channel.
#[derive(Debug, Clone)]
pub struct OutputPipe {
  tx: mpsc::Sender<OutputChunk>,
}

impl OutputPipe {
  /// Create a bounded pipe. The receiver is handed to the delivery context;
  /// the pipe (and writers derived from it) to producers. The channel
  /// closes when the pipe and all writers are dropped.
  pub fn bounded(capacity: usize) -> (OutputPipe, OutputReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (OutputPipe { tx }, OutputReceiver { rx })
  }

  /// Buffered writer for a blocking worker thread.
  pub fn writer(&self, stream: StreamKind) -> PipeWriter {
    PipeWriter {
      stream,
      tx: self.tx.clone(),
      buffer: Vec::new(),
    }
  }

  /// Send one line immediately from an async context. Errors from a closed
  /// channel are ignored; delivery has ended and there is nobody left to
  /// tell.
  pub async fn line(&self, stream: StreamKind, message: &str) {
    let mut bytes = message.as_bytes().to_vec();
    bytes.push(b'\n');
    let _ = self.tx.send(OutputChunk { stream, bytes }).await;
  }
}

/// Buffered, blocking writer used by the execution worker.
///
/// Bytes accumulate until [`FLUSH_THRESHOLD`] or an explicit flush, then go
/// out as one chunk. Must not be used from an async context: sends block
/// the calling thread.
#[derive(Debug)]
pub struct PipeWriter {
  stream: StreamKind,
  tx: mpsc::Sender<OutputChunk>,
  buffer: Vec<u8>,
}

impl PipeWriter {
  pub fn write_bytes(&mut self, bytes: &[u8]) {
    self.buffer.extend_from_slice(bytes);
    while self.buffer.len() >= FLUSH_THRESHOLD {
      let rest = self.buffer.split_off(FLUSH_THRESHOLD);
      let chunk = std::mem::replace(&mut self.buffer, rest);
      self.send(chunk);
    }
  }

  /// Write a line and flush it through immediately.
  pub fn write_line(&mut self, line: &str) {
    self.write_bytes(line.as_bytes());
    self.write_bytes(b"\n");
    self.flush_buffer();
  }

  pub fn flush_buffer(&mut self) {
    if !self.buffer.is_empty() {
      let chunk = std::mem::take(&mut self.buffer);
      self.send(chunk);
    }
  }

  fn send(&self, bytes: Vec<u8>) {
    let _ = self.tx.blocking_send(OutputChunk {
      stream: self.stream,
      bytes,
    });
  }
}

impl io::Write for PipeWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.write_bytes(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.flush_buffer();
    Ok(())
  }
}

impl Drop for PipeWriter {
  fn drop(&mut self) {
    self.flush_buffer();
  }
}

/// Receiving half of a run's output channel: the single delivery context.
#[derive(Debug)]
pub struct OutputReceiver {
  rx: mpsc::Receiver<OutputChunk>,
}

impl OutputReceiver {
  pub async fn recv(&mut self) -> Option<OutputChunk> {
    self.rx.recv().await
  }

  /// Drain every chunk, in order, into the observer sink. Chunk boundaries
  /// follow byte counts and may split multi-byte characters; decoding is
  /// lossy.
  pub async fn forward_to<F>(mut self, sink: F)
  where
    F: Fn(StreamKind, String),
  {
    while let Some(chunk) = self.rx.recv().await {
      sink(chunk.stream, String::from_utf8_lossy(&chunk.bytes).to_string());
    }
  }
}

/// Source of program input, read line-by-line by the execution worker.
pub trait InputSource: Send {
  /// Next line of input, or `None` at end of input. May block.
  fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Input source that is immediately exhausted.
#[derive(Debug, Default)]
pub struct EmptyInput;

impl InputSource for EmptyInput {
  fn read_line(&mut self) -> io::Result<Option<String>> {
    Ok(None)
  }
}

/// Input fed line-by-line from another thread (the editor side in the IDE).
#[derive(Debug)]
pub struct ChannelInput {
  rx: std::sync::mpsc::Receiver<String>,
}

impl ChannelInput {
  pub fn new() -> (std::sync::mpsc::Sender<String>, Self) {
    let (tx, rx) = std::sync::mpsc::channel();
    (tx, Self { rx })
  }
}

impl InputSource for ChannelInput {
  fn read_line(&mut self) -> io::Result<Option<String>> {
    match self.rx.recv() {
      Ok(line) => Ok(Some(line)),
      // All senders gone: end of input.
      Err(_) => Ok(None),
    }
  }
}

/// The explicit stream handles owned by one run. Passed to the runtime in
/// place of any process-global redirection; dropped (and thereby flushed)
/// on every exit path of the run.
pub struct ExecutionContext {
  pub out: PipeWriter,
  pub err: PipeWriter,
  pub input: Box<dyn InputSource>,
}

impl ExecutionContext {
  pub fn flush(&mut self) {
    self.out.flush_buffer();
    self.err.flush_buffer();
  }
}
