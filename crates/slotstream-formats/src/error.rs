//! Chunk header and naming error types

use thiserror::Error;

/// Error raised while framing or parsing a chunk header
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Fewer bytes than one header
    #[error("truncated header: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Required header length
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Header bytes are not valid UTF-8
    #[error("header is not valid UTF-8")]
    InvalidUtf8,

    /// Header does not start with the split header tag
    #[error("missing FileSplitHeader tag")]
    MissingTag,

    /// Field not of the form `"Key=Value"`
    #[error("malformed header field: {0:?}")]
    MalformedField(String),

    /// Field name not recognised
    #[error("unknown header field: {0}")]
    UnknownField(String),

    /// Field present more than once
    #[error("duplicate header field: {0}")]
    DuplicateField(&'static str),

    /// Required field absent
    #[error("missing header field: {0}")]
    MissingField(&'static str),

    /// Field value is not a number
    #[error("invalid value for {field}: {value:?}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Raw value text
        value: String,
    },

    /// Declared header size differs from the physical header size
    #[error("header size mismatch: expected {expected}, got {actual}")]
    HeaderSizeMismatch {
        /// Physical header size
        expected: usize,
        /// Declared header size
        actual: u32,
    },

    /// Split ids are 1-based
    #[error("invalid split id: {0}")]
    InvalidSplitId(u32),

    /// Encoded text does not fit into the fixed header
    #[error("header text of {0} bytes does not fit")]
    TooLong(usize),
}

/// Error raised for an unusable run identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid run identifier: {0:?}")]
pub struct RunIdError(pub String);

/// Result type for header operations
pub type FormatResult<T> = Result<T, HeaderError>;
