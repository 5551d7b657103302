//! Run identifiers and deterministic resource slot names
//!
//! A writer and a reader agree on slot names without any manifest: the name of
//! slot `i` is `"ZIP_"` followed by the uppercase hex SHA-256 of the UTF-16LE
//! text `run_id + i`. The run identifier itself is stored under the fixed
//! resource name [`RUN_ID_RESOURCE`].

use crate::error::RunIdError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Resource holding the run identifier as UTF-8
pub const RUN_ID_RESOURCE: &str = "GUID";

/// Prefix of every chunk slot name
pub const SLOT_NAME_PREFIX: &str = "ZIP_";

/// Identifier of one packaging run
///
/// Keeps the exact text it was created from so that names hash identically on
/// both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Fresh random identifier in lowercase hyphenated form
    pub fn generate() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Identifier for a known UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }

    /// Identifier text as stored
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of slot `index`
    pub fn slot_name(&self, index: usize) -> String {
        let mut hasher = Sha256::new();
        for unit in format!("{}{index}", self.0).encode_utf16() {
            hasher.update(unit.to_le_bytes());
        }
        format!("{SLOT_NAME_PREFIX}{}", hex::encode_upper(hasher.finalize()))
    }

    /// Endless iterator over slot names starting at index 0
    pub fn slot_names(&self) -> SlotNames<'_> {
        SlotNames {
            run_id: self,
            index: 0,
        }
    }
}

impl FromStr for RunId {
    type Err = RunIdError;

    /// Accepts any UUID text and keeps it verbatim
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(text).map_err(|_| RunIdError(text.to_string()))?;
        Ok(Self(text.to_string()))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Iterator over the slot names of a run
#[derive(Debug, Clone)]
pub struct SlotNames<'a> {
    run_id: &'a RunId,
    index: usize,
}

impl Iterator for SlotNames<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let name = self.run_id.slot_name(self.index);
        self.index = self.index.checked_add(1)?;
        Some(name)
    }
}
