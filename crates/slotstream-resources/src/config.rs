//! Configuration for chunk packing

use crate::error::{ChunkError, ChunkResult};
use serde::{Deserialize, Serialize};
use slotstream_formats::HEADER_SIZE;
use slotstream_io::DEFAULT_PIPE_BUFFER_SIZE;
use std::path::Path;

/// Slot size and budget of a packaging run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Bytes per stored slot, header included
    pub split_size: usize,

    /// Largest logical stream the slot budget must hold
    pub max_total_size: u64,

    /// Fill every slot after the last chunk with an empty placeholder
    ///
    /// When false only the first unused slot receives one.
    pub fill_placeholders: bool,

    /// Capacity of the producer-side write buffer (0 disables buffering)
    pub pipe_buffer_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            split_size: 1_000_000,
            max_total_size: 2_000_000_000,
            fill_placeholders: true,
            pipe_buffer_size: DEFAULT_PIPE_BUFFER_SIZE,
        }
    }
}

impl ChunkConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ChunkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(text: &str) -> ChunkResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the slot size
    #[must_use]
    pub const fn with_split_size(mut self, split_size: usize) -> Self {
        self.split_size = split_size;
        self
    }

    /// Set the total size budget
    #[must_use]
    pub const fn with_max_total_size(mut self, max_total_size: u64) -> Self {
        self.max_total_size = max_total_size;
        self
    }

    /// Choose the placeholder policy
    #[must_use]
    pub const fn with_fill_placeholders(mut self, fill: bool) -> Self {
        self.fill_placeholders = fill;
        self
    }

    /// Set the producer buffer capacity
    #[must_use]
    pub const fn with_pipe_buffer_size(mut self, size: usize) -> Self {
        self.pipe_buffer_size = size;
        self
    }

    /// Payload bytes per slot
    pub const fn payload_size(&self) -> usize {
        self.split_size.saturating_sub(HEADER_SIZE)
    }

    /// Number of slots needed to hold `max_total_size` bytes
    pub fn max_slots(&self) -> usize {
        match self.payload_size() {
            0 => 0,
            payload => {
                usize::try_from(self.max_total_size.div_ceil(payload as u64)).unwrap_or(usize::MAX)
            }
        }
    }

    /// Check that the values describe a usable slot layout
    pub fn validate(&self) -> ChunkResult<()> {
        if self.split_size <= HEADER_SIZE {
            return Err(ChunkError::InvalidConfig(format!(
                "split size {} must exceed the {HEADER_SIZE}-byte header",
                self.split_size
            )));
        }
        if self.max_total_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "max total size must be positive".to_string(),
            ));
        }
        let max_slots = self.max_slots();
        if u32::try_from(max_slots).is_err() {
            return Err(ChunkError::InvalidConfig(format!(
                "{max_slots} slots do not fit a split count"
            )));
        }
        Ok(())
    }
}
