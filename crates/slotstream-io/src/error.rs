//! Error types for pipes and concatenated streams
//!
//! Both error types travel inside [`std::io::Error`] when they surface through
//! the `Read`/`Seek` traits. Use the `from_io` helpers to recover them.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a producer callback
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Rendezvous pipe error
#[derive(Debug, Clone, Error)]
pub enum PipeError {
    /// The producer callback returned an error
    #[error("write pipe producer failed: {0}")]
    ProducerFailed(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// The producer callback panicked
    #[error("write pipe producer panicked: {0}")]
    ProducerPanicked(String),

    /// The read end was closed while the producer was still writing
    #[error("write pipe was cancelled by the reader")]
    Cancelled,
}

impl PipeError {
    /// Recover a pipe error carried inside an I/O error
    pub fn from_io(err: &io::Error) -> Option<&Self> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }

    /// Whether this error came from the producer side (failure or panic)
    pub const fn is_producer_failure(&self) -> bool {
        matches!(self, Self::ProducerFailed(_) | Self::ProducerPanicked(_))
    }

    pub(crate) fn into_io(self) -> io::Error {
        let kind = match self {
            Self::Cancelled => io::ErrorKind::BrokenPipe,
            Self::ProducerFailed(_) | Self::ProducerPanicked(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}

/// Stream concatenation error
#[derive(Debug, Error)]
pub enum ConcatError {
    /// No sub-streams were supplied
    #[error("cannot concatenate an empty list of streams")]
    Empty,

    /// A sub-stream reopened with a different length than first measured
    #[error("length of sub-stream {index} has changed: expected {expected}, got {actual}")]
    LengthChanged {
        /// Sub-stream index
        index: usize,
        /// Length recorded at construction
        expected: u64,
        /// Length observed on reopen
        actual: u64,
    },

    /// Attempt to seek before the beginning of the stream
    #[error("attempt to seek before beginning of stream")]
    NegativePosition,

    /// Skip offset larger than the wrapped stream
    #[error("offset {offset} exceeds stream length {length}")]
    OffsetOutOfRange {
        /// Requested offset
        offset: u64,
        /// Length of the wrapped stream
        length: u64,
    },

    /// A failed seek left the stream without a valid position
    #[error("stream position was lost by a failed seek")]
    PositionLost,

    /// Opening or probing a sub-stream failed
    #[error("sub-stream {index} failed: {source}")]
    SubStream {
        /// Sub-stream index
        index: usize,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ConcatError {
    /// Recover a concatenation error carried inside an I/O error
    pub fn from_io(err: &io::Error) -> Option<&Self> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }
}

impl From<ConcatError> for io::Error {
    fn from(err: ConcatError) -> Self {
        let kind = match &err {
            ConcatError::Empty | ConcatError::NegativePosition | ConcatError::OffsetOutOfRange { .. } => {
                io::ErrorKind::InvalidInput
            }
            ConcatError::LengthChanged { .. } => io::ErrorKind::InvalidData,
            ConcatError::PositionLost => io::ErrorKind::Other,
            ConcatError::SubStream { source, .. } => source.kind(),
        };
        Self::new(kind, err)
    }
}

/// Result type for concatenation operations
pub type ConcatResult<T> = Result<T, ConcatError>;
