//! Output pump draining a child stream into classified log lines.
//!
//! The pump reads until end-of-stream, a read error, or cancellation.
//! Lines are emitted in arrival order with nothing buffered beyond the
//! current partial line. Blank lines are dropped.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::log::{LineClassifier, LogLine, StreamSource};
use crate::supervisor::{CancellationSignal, EventSink};

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpExit {
    /// The stream closed.
    EndOfStream,
    /// The cancellation signal was observed.
    Cancelled,
    /// A read failed; handled the same as end-of-stream by the supervisor.
    ReadError(std::io::Error),
}

impl PumpExit {
    /// Whether the stream ended without being cancelled.
    #[must_use]
    pub fn is_stream_end(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Outcome of a pump run.
#[derive(Debug)]
pub struct PumpReport {
    pub exit: PumpExit,
    /// Number of lines delivered to the sink.
    pub lines: u64,
}

/// Reads lines from `R` and forwards them to an [`EventSink`].
pub struct OutputPump<R> {
    reader: BufReader<R>,
    source: StreamSource,
    classifier: Arc<LineClassifier>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationSignal,
    seq: Arc<AtomicU64>,
}

impl<R: AsyncRead + Unpin> OutputPump<R> {
    /// Create a pump over `reader` with its own sequence counter.
    pub fn new(
        reader: R,
        classifier: Arc<LineClassifier>,
        sink: Arc<dyn EventSink>,
        cancel: CancellationSignal,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            source: StreamSource::Stdout,
            classifier,
            sink,
            cancel,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Draw sequence numbers from a shared counter.
    #[must_use]
    pub fn with_sequence(mut self, seq: Arc<AtomicU64>) -> Self {
        self.seq = seq;
        self
    }

    /// Tag emitted lines with `source`.
    #[must_use]
    pub fn with_source(mut self, source: StreamSource) -> Self {
        self.source = source;
        self
    }

    /// Run until the stream ends or the signal fires.
    pub async fn run(mut self) -> PumpReport {
        let mut buf = Vec::new();
        let mut lines = 0u64;

        let exit = loop {
            if self.cancel.is_fired() {
                break PumpExit::Cancelled;
            }

            buf.clear();
            let read = tokio::select! {
                biased;

                () = self.cancel.fired() => break PumpExit::Cancelled,
                read = self.reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => break PumpExit::EndOfStream,
                Ok(_) => {
                    if self.emit(&buf) {
                        lines += 1;
                    }
                }
                Err(e) => break PumpExit::ReadError(e),
            }
        };

        match &exit {
            PumpExit::ReadError(e) => {
                tracing::warn!(source = ?self.source, error = %e, lines, "Output read failed");
            }
            other => {
                tracing::debug!(source = ?self.source, exit = ?other, lines, "Output pump finished");
            }
        }

        PumpReport { exit, lines }
    }

    /// Classify and deliver one raw line. Returns false if it was blank.
    fn emit(&self, raw: &[u8]) -> bool {
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let text: Cow<'_, str> = String::from_utf8_lossy(raw);

        if LineClassifier::is_blank(&text) {
            return false;
        }

        let category = self.classifier.classify(&text);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let line = LogLine::new(seq, text, category, self.source);
        self.sink.on_line(&line);
        true
    }
}
