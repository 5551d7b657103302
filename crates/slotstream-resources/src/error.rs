//! Error types for packing and reading chunked resources

use slotstream_formats::{HeaderError, RunIdError};
use slotstream_io::{ConcatError, PipeError};
use std::io;
use thiserror::Error;

/// Error raised by the chunk writer, the chunk reader or their configuration
#[derive(Debug, Error)]
pub enum ChunkError {
    /// I/O error from a store or the source stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored chunk header could not be parsed
    #[error("archive not embedded or corrupted: invalid header in {name}: {source}")]
    Header {
        /// Resource holding the header
        name: String,
        /// Parse failure
        #[source]
        source: HeaderError,
    },

    /// The producer callback failed or panicked
    #[error("producer failed: {0}")]
    Producer(#[source] PipeError),

    /// Building or reading the logical stream failed
    #[error("logical stream error: {0}")]
    Concat(#[from] ConcatError),

    /// The source holds more bytes than the slot budget
    #[error(
        "stream exceeds the slot budget of {max_slots} slots of {payload_size} payload bytes"
    )]
    BudgetExceeded {
        /// Number of available slots
        max_slots: usize,
        /// Payload bytes per slot
        payload_size: usize,
    },

    /// No run identifier resource
    #[error("archive not embedded or corrupted: missing run identifier")]
    MissingRunId,

    /// The run identifier resource is not a UUID
    #[error("archive not embedded or corrupted: {0}")]
    InvalidRunId(#[from] RunIdError),

    /// Run identifier present but no chunk holds data
    #[error("archive not embedded or corrupted: no chunks found")]
    NoChunks,

    /// Two chunks claim the same position
    #[error("archive not embedded or corrupted: duplicate split id {0}")]
    DuplicateSplitId(u32),

    /// Chunk positions are not contiguous from 1
    #[error("archive not embedded or corrupted: expected split id {expected}, found {found}")]
    SplitIdGap {
        /// Next expected split id
        expected: u32,
        /// Split id found instead
        found: u32,
    },

    /// Configuration values are unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl ChunkError {
    /// Whether the stored chunk set is missing, incomplete or damaged
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Header { .. }
                | Self::MissingRunId
                | Self::InvalidRunId(_)
                | Self::NoChunks
                | Self::DuplicateSplitId(_)
                | Self::SplitIdGap { .. }
        )
    }

    /// Classify an error read from a pipe-backed source
    pub(crate) fn from_source_io(err: io::Error) -> Self {
        match PipeError::from_io(&err) {
            Some(pipe) if pipe.is_producer_failure() => Self::Producer(pipe.clone()),
            _ => Self::Io(err),
        }
    }
}

/// Result type for chunk operations
pub type ChunkResult<T> = Result<T, ChunkError>;
