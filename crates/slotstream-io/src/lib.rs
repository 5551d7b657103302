//! Stream plumbing for chunked resource streaming
//!
//! This crate turns a push-style producer into a pull-style stream and glues
//! many small, lazily-opened streams back into one.
//!
//! # Components
//!
//! - **Rendezvous pipe** ([`pipe`]): runs a writer callback on a dedicated
//!   thread and exposes what it writes as a [`std::io::Read`]. At most one
//!   write call's worth of bytes is held at any time.
//! - **Stream concatenation** ([`concat`]): forward-only and seekable
//!   concatenation over [`StreamOpener`] descriptors, with at most one
//!   sub-stream open.
//! - **Offset view** ([`offset`]): skips a fixed-size prefix such as a chunk
//!   header.
//!
//! # Threading
//!
//! A pipe uses exactly two threads: the producer it spawns and the caller that
//! reads it. The concatenators are single-threaded and hold no locks.

#![warn(missing_docs)]

pub mod concat;
mod error;
pub mod offset;
pub mod pipe;

pub use concat::{ConcatStream, FnOpener, SeekableConcatStream, StreamOpener, from_fn};
pub use error::{BoxError, ConcatError, ConcatResult, PipeError};
pub use offset::OffsetStream;
pub use pipe::{DEFAULT_PIPE_BUFFER_SIZE, PipeBuilder, PipeReader, PipeSink, PipeWriter};
