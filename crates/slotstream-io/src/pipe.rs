//! Rendezvous pipe: run a writer callback on its own thread and read what it
//! writes from the calling thread.
//!
//! The two ends meet at a single-slot monitor. A producer write publishes its
//! bytes and then blocks until the consumer has drained all of them, so at
//! most one write call's worth of data is ever held by the pipe no matter how
//! long the stream is.
//!
//! ```rust
//! use slotstream_io::PipeBuilder;
//! use std::io::{Read, Write};
//!
//! let mut reader = PipeBuilder::new()
//!     .spawn(|sink| {
//!         sink.write_all(b"hello ")?;
//!         sink.write_all(b"world")?;
//!         Ok(())
//!     })
//!     .expect("spawn producer");
//!
//! let mut text = String::new();
//! reader.read_to_string(&mut text).expect("read pipe");
//! assert_eq!(text, "hello world");
//! reader.finish().expect("producer succeeded");
//! ```

use crate::error::{BoxError, PipeError};
use parking_lot::{Condvar, Mutex};
use std::io::{self, BufWriter, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Default capacity of the producer-side `BufWriter` (8 KiB)
pub const DEFAULT_PIPE_BUFFER_SIZE: usize = 8 * 1024;

/// Write end handed to the producer callback
pub type PipeSink = BufWriter<PipeWriter>;

#[derive(Debug, Default)]
struct State {
    /// Bytes of the outstanding producer write
    buffer: Vec<u8>,
    /// Consumer position within `buffer`
    position: usize,
    has_data: bool,
    ended: bool,
    failure: Option<PipeError>,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

impl Shared {
    /// Publish one producer buffer and wait until it is drained
    fn publish(&self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.cancelled || state.ended {
            return Err(PipeError::Cancelled.into_io());
        }

        state.buffer.clear();
        state.buffer.extend_from_slice(buf);
        state.position = 0;
        state.has_data = true;
        self.cond.notify_all();

        while state.has_data && !state.cancelled {
            self.cond.wait(&mut state);
        }

        if state.has_data {
            // Cancelled with bytes still outstanding
            state.has_data = false;
            state.buffer = Vec::new();
            return Err(PipeError::Cancelled.into_io());
        }
        Ok(())
    }

    fn end(&self, failure: Option<PipeError>) {
        let mut state = self.state.lock();
        if state.ended {
            return;
        }
        state.ended = true;
        state.has_data = false;
        state.buffer = Vec::new();
        state.failure = failure;
        self.cond.notify_all();
    }

    fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if state.ended || state.cancelled {
            return false;
        }
        state.cancelled = true;
        self.cond.notify_all();
        true
    }
}

/// Marks the pipe ended when the producer thread unwinds
struct EndGuard {
    shared: Arc<Shared>,
}

impl Drop for EndGuard {
    fn drop(&mut self) {
        let failure = thread::panicking()
            .then(|| PipeError::ProducerPanicked("producer callback panicked".to_string()));
        self.shared.end(failure);
    }
}

/// Raw write end of a rendezvous pipe
///
/// Every non-empty `write` blocks until the reader has consumed all of it.
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Whether the reader has gone away
    ///
    /// Producers that do expensive work between writes should poll this and
    /// stop early.
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.lock().cancelled
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if thread::panicking() {
            // Unwinding producer: do not hand out half-written data
            return Err(PipeError::Cancelled.into_io());
        }
        trace!("pipe producer publishing {} bytes", buf.len());
        self.shared.publish(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.is_cancelled() {
            return Err(PipeError::Cancelled.into_io());
        }
        Ok(())
    }
}

/// Builder for a rendezvous pipe
#[derive(Debug, Clone)]
pub struct PipeBuilder {
    buffer_size: usize,
    thread_name: String,
}

impl Default for PipeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipeBuilder {
    /// Create a builder with the default buffer size
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_PIPE_BUFFER_SIZE,
            thread_name: "slotstream-pipe".to_string(),
        }
    }

    /// Set the producer-side buffer capacity
    ///
    /// Zero disables buffering: every producer `write` becomes one handoff.
    #[must_use]
    pub const fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the name of the producer thread
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Start the producer thread and return the read end
    ///
    /// Blocks until the producer published its first buffer or finished.
    pub fn spawn<F>(self, writer: F) -> io::Result<PipeReader>
    where
        F: FnOnce(&mut PipeSink) -> Result<(), BoxError> + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let producer_shared = Arc::clone(&shared);
        let buffer_size = self.buffer_size;

        let handle = thread::Builder::new()
            .name(self.thread_name)
            .spawn(move || run_producer(&producer_shared, buffer_size, writer))?;

        {
            let mut state = shared.state.lock();
            while !state.has_data && !state.ended {
                shared.cond.wait(&mut state);
            }
        }

        debug!("rendezvous pipe started (buffer size {})", buffer_size);
        Ok(PipeReader {
            shared,
            handle: Some(handle),
        })
    }
}

fn run_producer<F>(shared: &Arc<Shared>, buffer_size: usize, writer: F)
where
    F: FnOnce(&mut PipeSink) -> Result<(), BoxError>,
{
    let guard = EndGuard {
        shared: Arc::clone(shared),
    };
    let mut sink = BufWriter::with_capacity(
        buffer_size,
        PipeWriter {
            shared: Arc::clone(shared),
        },
    );

    let outcome = writer(&mut sink).and_then(|()| sink.flush().map_err(BoxError::from));
    // Bytes still buffered after a failure are discarded, not published
    let (_writer, _unflushed) = sink.into_parts();

    match outcome {
        Ok(()) => {
            debug!("pipe producer finished");
            shared.end(None);
        }
        Err(err) => {
            warn!("pipe producer failed: {}", err);
            shared.end(Some(PipeError::ProducerFailed(Arc::from(err))));
        }
    }
    drop(guard);
}

/// Spawn a producer with default settings
pub fn spawn<F>(writer: F) -> io::Result<PipeReader>
where
    F: FnOnce(&mut PipeSink) -> Result<(), BoxError> + Send + 'static,
{
    PipeBuilder::new().spawn(writer)
}

/// Read end of a rendezvous pipe
///
/// Dropping the reader before end of stream cancels the producer: a write it
/// is blocked in returns `BrokenPipe`, and so does every later write.
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl PipeReader {
    /// Surface a producer failure without reading
    pub fn check(&self) -> io::Result<()> {
        match &self.shared.state.lock().failure {
            Some(failure) => Err(failure.clone().into_io()),
            None => Ok(()),
        }
    }

    /// Whether the producer has stopped (successfully or not)
    pub fn is_ended(&self) -> bool {
        self.shared.state.lock().ended
    }

    /// Stop the pipe and wait for the producer thread to exit
    ///
    /// Cancels the producer if it has not ended yet. Returns the producer's
    /// failure, unless the failure was caused by this cancellation.
    pub fn finish(mut self) -> Result<(), PipeError> {
        let cancelled = self.shared.cancel();
        if cancelled {
            debug!("pipe reader finished before end of stream, producer cancelled");
        }

        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("pipe producer thread panicked");
        }

        let state = self.shared.state.lock();
        match &state.failure {
            Some(failure) if !state.cancelled => Err(failure.clone()),
            _ => Ok(()),
        }
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.shared.state.lock();
        loop {
            if let Some(failure) = &state.failure {
                return Err(failure.clone().into_io());
            }
            if state.has_data {
                break;
            }
            if state.ended {
                return Ok(0);
            }
            self.shared.cond.wait(&mut state);
        }

        let available = state.buffer.len() - state.position;
        let count = available.min(buf.len());
        let start = state.position;
        buf[..count].copy_from_slice(&state.buffer[start..start + count]);
        state.position += count;

        if state.position == state.buffer.len() {
            // Drained: free the slot allocation
            state.has_data = false;
            state.buffer = Vec::new();
            self.shared.cond.notify_all();
        }
        Ok(count)
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        if self.shared.cancel() {
            debug!("pipe reader dropped before end of stream, producer cancelled");
        }
    }
}
