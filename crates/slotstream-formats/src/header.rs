//! Fixed-width chunk header
//!
//! Every stored chunk starts with a 112-byte, zero-padded UTF-8 header:
//!
//! ```text
//! "FileSplitHeader"\0"HeaderSize=112"\0"SplitId=<k>"\0"NumberOfSplits=<n>"\0\0...
//! ```
//!
//! The payload follows immediately after the padding.

use crate::error::{FormatResult, HeaderError};

/// Physical size of a chunk header in bytes
pub const HEADER_SIZE: usize = 112;

/// Literal tag opening every header, quotes included
pub const HEADER_TAG: &str = "\"FileSplitHeader\"";

const FIELD_HEADER_SIZE: &str = "HeaderSize";
const FIELD_SPLIT_ID: &str = "SplitId";
const FIELD_NUMBER_OF_SPLITS: &str = "NumberOfSplits";

/// Parsed chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHeader {
    /// 1-based position of the chunk in its run
    pub split_id: u32,
    /// Split count declared by the writer
    pub number_of_splits: u32,
}

impl ChunkHeader {
    /// Create a header
    pub const fn new(split_id: u32, number_of_splits: u32) -> Self {
        Self {
            split_id,
            number_of_splits,
        }
    }

    /// Header text without padding
    pub fn to_text(&self) -> String {
        format!(
            "{HEADER_TAG}\0\"{FIELD_HEADER_SIZE}={HEADER_SIZE}\"\0\"{FIELD_SPLIT_ID}={}\"\0\"{FIELD_NUMBER_OF_SPLITS}={}\"",
            self.split_id, self.number_of_splits
        )
    }

    /// Encode to the fixed-width representation
    pub fn encode(&self) -> FormatResult<[u8; HEADER_SIZE]> {
        if self.split_id == 0 {
            return Err(HeaderError::InvalidSplitId(0));
        }

        let text = self.to_text();
        if text.len() > HEADER_SIZE {
            return Err(HeaderError::TooLong(text.len()));
        }

        let mut header = [0u8; HEADER_SIZE];
        header[..text.len()].copy_from_slice(text.as_bytes());
        Ok(header)
    }

    /// Parse the first [`HEADER_SIZE`] bytes of `data`
    pub fn parse(data: &[u8]) -> FormatResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(HeaderError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let text =
            std::str::from_utf8(&data[..HEADER_SIZE]).map_err(|_| HeaderError::InvalidUtf8)?;
        let fields = text
            .strip_prefix(HEADER_TAG)
            .ok_or(HeaderError::MissingTag)?;

        let mut header_size = None;
        let mut split_id = None;
        let mut number_of_splits = None;

        for field in fields.split('\0').filter(|field| !field.is_empty()) {
            let (key, value) = split_field(field)?;
            let (name, slot) = match key {
                FIELD_HEADER_SIZE => (FIELD_HEADER_SIZE, &mut header_size),
                FIELD_SPLIT_ID => (FIELD_SPLIT_ID, &mut split_id),
                FIELD_NUMBER_OF_SPLITS => (FIELD_NUMBER_OF_SPLITS, &mut number_of_splits),
                other => return Err(HeaderError::UnknownField(other.to_string())),
            };
            if slot.is_some() {
                return Err(HeaderError::DuplicateField(name));
            }
            *slot = Some(parse_value(name, value)?);
        }

        let header_size = header_size.ok_or(HeaderError::MissingField(FIELD_HEADER_SIZE))?;
        let split_id = split_id.ok_or(HeaderError::MissingField(FIELD_SPLIT_ID))?;
        let number_of_splits =
            number_of_splits.ok_or(HeaderError::MissingField(FIELD_NUMBER_OF_SPLITS))?;

        if header_size as usize != HEADER_SIZE {
            return Err(HeaderError::HeaderSizeMismatch {
                expected: HEADER_SIZE,
                actual: header_size,
            });
        }
        if split_id == 0 {
            return Err(HeaderError::InvalidSplitId(split_id));
        }

        Ok(Self {
            split_id,
            number_of_splits,
        })
    }
}

/// Split `"Key=Value"` into key and value
fn split_field(field: &str) -> FormatResult<(&str, &str)> {
    let malformed = || HeaderError::MalformedField(field.to_string());

    let inner = field
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(malformed)?;
    if inner.matches('=').count() != 1 {
        return Err(malformed());
    }
    inner.split_once('=').ok_or_else(malformed)
}

fn parse_value(field: &'static str, value: &str) -> FormatResult<u32> {
    value.parse().map_err(|_| HeaderError::InvalidValue {
        field,
        value: value.to_string(),
    })
}
