//! Stream relays: forward a child's output to the event sink as it arrives.
//!
//! A relay never waits for a newline. Each read returns whatever bytes the
//! child has written so far, so a prompt like `"Enter: "` is forwarded
//! before the program blocks on input.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::event::{RunEmitter, RunEvent, StreamKind};
use crate::registry::ActivityClock;

const READ_CHUNK: usize = 1024;

/// Incremental UTF-8 decoder.
///
/// Sequences split across reads are held back until complete; invalid
/// sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next bytes, returning all text that is complete so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush any held-back bytes at end of stream.
    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}

/// Bounded buffer of the most recent stderr bytes, read by the diagnostic parser.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    limit: usize,
}

impl CaptureBuffer {
    /// Create a buffer that keeps at most `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(Vec::new())),
            limit,
        }
    }

    /// Append bytes, discarding the oldest ones past the limit.
    pub fn push(&self, data: &[u8]) {
        let mut bytes = self.bytes.lock();
        bytes.extend_from_slice(data);
        if bytes.len() > self.limit {
            let excess = bytes.len() - self.limit;
            bytes.drain(..excess);
        }
    }

    /// Captured text, decoded permissively.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    /// Number of bytes held.
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    /// Check if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }
}

/// Forward one stream until end of data.
///
/// Every read touches the activity clock. Returns the number of bytes relayed.
pub(crate) async fn relay_stream<R>(
    mut reader: R,
    stream: StreamKind,
    emitter: RunEmitter,
    activity: ActivityClock,
    capture: Option<CaptureBuffer>,
) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut decoder = Utf8Decoder::new();
    let mut buf = [0u8; READ_CHUNK];
    let mut total = 0usize;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(
                    session_id = %emitter.session_id(),
                    stream = %stream,
                    error = %e,
                    "Stream read failed, closing relay"
                );
                break;
            }
        };

        total += n;
        activity.touch();
        if let Some(capture) = &capture {
            capture.push(&buf[..n]);
        }

        let fragment = decoder.decode(&buf[..n]);
        if !fragment.is_empty() {
            trace!(run_id = %emitter.run_id(), stream = %stream, fragment = ?fragment, "Relaying output");
            emitter.emit(RunEvent::output(fragment, stream));
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        emitter.emit(RunEvent::output(tail, stream));
    }

    debug!(
        run_id = %emitter.run_id(),
        stream = %stream,
        bytes = total,
        "Stream closed"
    );
    total
}
