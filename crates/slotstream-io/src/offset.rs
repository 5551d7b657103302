//! Stream view that starts at a fixed offset of an inner stream

use crate::error::ConcatError;
use std::io::{self, Read, Seek, SeekFrom};

/// Exposes the bytes of `inner` from `offset` onward
///
/// Position 0 of the view is `offset` in the inner stream; the view's length
/// is the inner length minus `offset`.
#[derive(Debug)]
pub struct OffsetStream<S> {
    inner: S,
    offset: u64,
}

impl<S: Read + Seek> OffsetStream<S> {
    /// Wrap `inner`, skipping its first `offset` bytes
    pub fn new(mut inner: S, offset: u64) -> io::Result<Self> {
        let length = inner.seek(SeekFrom::End(0))?;
        if offset > length {
            return Err(ConcatError::OffsetOutOfRange { offset, length }.into());
        }
        inner.seek(SeekFrom::Start(offset))?;
        Ok(Self { inner, offset })
    }

    /// Number of skipped bytes
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Recover the wrapped stream
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn seek_inner(&mut self, absolute: Option<u64>) -> io::Result<u64> {
        match absolute {
            Some(absolute) if absolute >= self.offset => {
                Ok(self.inner.seek(SeekFrom::Start(absolute))? - self.offset)
            }
            _ => Err(ConcatError::NegativePosition.into()),
        }
    }
}

impl<S: Read> Read for OffsetStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<S: Read + Seek> Seek for OffsetStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let absolute = match pos {
            SeekFrom::Start(position) => self.offset.checked_add(position),
            SeekFrom::Current(delta) => self.inner.stream_position()?.checked_add_signed(delta),
            SeekFrom::End(delta) => self.inner.seek(SeekFrom::End(0))?.checked_add_signed(delta),
        };
        self.seek_inner(absolute)
    }
}
