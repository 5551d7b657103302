//! Chunked storage of a byte stream in named resource slots
//!
//! [`ChunkWriter`] splits a stream, usually produced on the fly through a
//! rendezvous pipe, into framed chunks stored under deterministic names.
//! [`ChunkReader`] finds those chunks again and exposes them as one seekable
//! stream.
//!
//! # Stores
//!
//! Resources live behind the [`ResourceSink`] and [`ResourceSource`] traits.
//! [`MemoryStore`] keeps them in memory; [`DirectoryStore`] keeps one file per
//! resource.
//!
//! # Errors
//!
//! Every failure is a [`ChunkError`]. Damaged or incomplete chunk sets report
//! `true` from [`ChunkError::is_corruption`] and display as
//! `archive not embedded or corrupted: ...`.

#![warn(missing_docs)]

pub mod config;
mod error;
pub mod reader;
pub mod store;
pub mod writer;

pub use config::ChunkConfig;
pub use error::{ChunkError, ChunkResult};
pub use reader::{ChunkEntry, ChunkOpener, ChunkReader, LogicalStream};
pub use store::{DirectoryStore, MemoryStore, ResourceSink, ResourceSource};
pub use writer::{ChunkWriter, PackSummary};

pub use slotstream_formats::{ChunkHeader, HEADER_SIZE, RUN_ID_RESOURCE, RunId};
