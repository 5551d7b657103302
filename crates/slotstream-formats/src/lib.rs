//! Wire format for chunked resource streaming
//!
//! A logical stream is stored as a run of resources. Each non-empty resource
//! is a fixed 112-byte text header followed by payload; the resource names
//! are derived from a per-run identifier so that no directory is needed.
//!
//! # Layout
//!
//! | Resource | Contents |
//! |----------|----------|
//! | `GUID` | run identifier, UTF-8 |
//! | `ZIP_<hash(run, 0)>` | header (`SplitId=1`) + payload |
//! | `ZIP_<hash(run, 1)>` | header (`SplitId=2`) + payload |
//! | ... | empty placeholder once the stream is exhausted |

#![warn(missing_docs)]

mod error;
pub mod header;
pub mod naming;

pub use error::{FormatResult, HeaderError, RunIdError};
pub use header::{ChunkHeader, HEADER_SIZE, HEADER_TAG};
pub use naming::{RUN_ID_RESOURCE, RunId, SLOT_NAME_PREFIX, SlotNames};
