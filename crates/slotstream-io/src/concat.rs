//! Concatenation of lazily-opened sub-streams
//!
//! Sub-streams are described by [`StreamOpener`]s rather than open handles, so
//! a concatenation over hundreds of resources never keeps more than one of
//! them open. Dropping a sub-stream closes it.
//!
//! [`ConcatStream`] reads its sub-streams front to back. [`SeekableConcatStream`]
//! measures every sub-stream's length once up front and then maps absolute
//! offsets to `(index, local offset)` pairs.

use crate::error::{ConcatError, ConcatResult};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use tracing::trace;

/// Describes how to open one sub-stream
pub trait StreamOpener {
    /// Stream produced by [`open`](Self::open)
    type Stream: Read;

    /// Open a fresh handle positioned at the start of the sub-stream
    fn open(&mut self) -> io::Result<Self::Stream>;
}

impl<O: StreamOpener + ?Sized> StreamOpener for Box<O> {
    type Stream = O::Stream;

    fn open(&mut self) -> io::Result<Self::Stream> {
        (**self).open()
    }
}

/// Opener backed by a closure, see [`from_fn`]
#[derive(Debug, Clone)]
pub struct FnOpener<F> {
    open: F,
}

/// Build a [`StreamOpener`] from a closure
pub fn from_fn<F, S>(open: F) -> FnOpener<F>
where
    F: FnMut() -> io::Result<S>,
    S: Read,
{
    FnOpener { open }
}

impl<F, S> StreamOpener for FnOpener<F>
where
    F: FnMut() -> io::Result<S>,
    S: Read,
{
    type Stream = S;

    fn open(&mut self) -> io::Result<S> {
        (self.open)()
    }
}

fn open_sub_stream<O: StreamOpener>(opener: &mut O, index: usize) -> ConcatResult<O::Stream> {
    trace!("opening sub-stream {}", index);
    opener
        .open()
        .map_err(|source| ConcatError::SubStream { index, source })
}

/// Forward-only concatenation
pub struct ConcatStream<O: StreamOpener> {
    openers: Vec<O>,
    next: usize,
    current: Option<O::Stream>,
}

impl<O: StreamOpener> fmt::Debug for ConcatStream<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcatStream")
            .field("streams", &self.openers.len())
            .field("next", &self.next)
            .field("open", &self.current.is_some())
            .finish()
    }
}

impl<O: StreamOpener> ConcatStream<O> {
    /// Concatenate the given sub-streams in order
    pub fn new(openers: impl IntoIterator<Item = O>) -> ConcatResult<Self> {
        let openers: Vec<O> = openers.into_iter().collect();
        if openers.is_empty() {
            return Err(ConcatError::Empty);
        }
        Ok(Self {
            openers,
            next: 0,
            current: None,
        })
    }

    /// Number of sub-streams
    pub fn stream_count(&self) -> usize {
        self.openers.len()
    }

    /// Whether a sub-stream is currently open
    pub fn has_open_stream(&self) -> bool {
        self.current.is_some()
    }
}

impl<O: StreamOpener> Read for ConcatStream<O> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.current.is_none() {
                if self.next >= self.openers.len() {
                    return Ok(0);
                }
                let index = self.next;
                let stream = open_sub_stream(&mut self.openers[index], index)?;
                self.current = Some(stream);
                self.next = index + 1;
            }

            let read = match &mut self.current {
                Some(stream) => stream.read(buf)?,
                None => 0,
            };
            if read != 0 {
                return Ok(read);
            }
            self.current = None;
        }
    }
}

/// Concatenation with random access across sub-stream boundaries
pub struct SeekableConcatStream<O>
where
    O: StreamOpener,
    O::Stream: Seek,
{
    openers: Vec<O>,
    lengths: Vec<u64>,
    /// Cumulative end offset of each sub-stream
    ends: Vec<u64>,
    total: u64,
    position: u64,
    next: usize,
    current: Option<(usize, O::Stream)>,
    /// Set by a failed seek until the next successful one
    position_lost: bool,
}

impl<O> fmt::Debug for SeekableConcatStream<O>
where
    O: StreamOpener,
    O::Stream: Seek,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeekableConcatStream")
            .field("lengths", &self.lengths)
            .field("total", &self.total)
            .field("position", &self.position)
            .field("current", &self.current_index())
            .field("position_lost", &self.position_lost)
            .finish()
    }
}

impl<O> SeekableConcatStream<O>
where
    O: StreamOpener,
    O::Stream: Seek,
{
    /// Probe every sub-stream's length and build the offset table
    ///
    /// No sub-stream is left open afterwards.
    pub fn new(openers: impl IntoIterator<Item = O>) -> ConcatResult<Self> {
        let mut openers: Vec<O> = openers.into_iter().collect();
        if openers.is_empty() {
            return Err(ConcatError::Empty);
        }

        let mut lengths = Vec::with_capacity(openers.len());
        let mut ends = Vec::with_capacity(openers.len());
        let mut total = 0u64;
        for (index, opener) in openers.iter_mut().enumerate() {
            let mut measured = open_sub_stream(opener, index)?;
            let length = measured
                .seek(SeekFrom::End(0))
                .map_err(|source| ConcatError::SubStream { index, source })?;
            drop(measured);

            total = total
                .checked_add(length)
                .ok_or_else(|| ConcatError::SubStream {
                    index,
                    source: io::Error::new(io::ErrorKind::InvalidData, "total length overflows"),
                })?;
            lengths.push(length);
            ends.push(total);
        }

        trace!(
            "measured {} sub-streams, total length {}",
            openers.len(),
            total
        );

        Ok(Self {
            openers,
            lengths,
            ends,
            total,
            position: 0,
            next: 0,
            current: None,
            position_lost: false,
        })
    }

    /// Total length of all sub-streams
    pub fn len(&self) -> u64 {
        self.total
    }

    /// Whether the concatenation holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Current absolute position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Lengths recorded when the streams were measured
    pub fn sub_stream_lengths(&self) -> &[u64] {
        &self.lengths
    }

    /// Index of the open sub-stream, if any
    pub fn current_index(&self) -> Option<usize> {
        self.current.as_ref().map(|(index, _)| *index)
    }

    /// Map an absolute offset to `(index, local offset)`
    ///
    /// Returns `None` for offsets at or past the end. Empty sub-streams are
    /// never selected.
    pub fn locate(&self, offset: u64) -> Option<(usize, u64)> {
        let index = self.ends.partition_point(|&end| end <= offset);
        if index >= self.ends.len() {
            return None;
        }
        let start = self.ends[index] - self.lengths[index];
        Some((index, offset - start))
    }

    /// Move to an absolute position
    ///
    /// Positions past the end are allowed and read as end of stream. If the
    /// target sub-stream cannot be opened, reads fail until a later seek
    /// succeeds.
    pub fn set_position(&mut self, offset: u64) -> io::Result<()> {
        if let Err(err) = self.reposition(offset) {
            self.current = None;
            self.next = self.openers.len();
            self.position_lost = true;
            return Err(err);
        }
        self.position = offset;
        self.position_lost = false;
        Ok(())
    }

    fn reposition(&mut self, offset: u64) -> io::Result<()> {
        match self.locate(offset) {
            None => {
                self.current = None;
                self.next = self.openers.len();
            }
            Some((index, local)) => {
                if let Some((_, stream)) = self
                    .current
                    .as_mut()
                    .filter(|(open_index, _)| *open_index == index)
                {
                    stream.seek(SeekFrom::Start(local))?;
                } else {
                    self.current = None;
                    let stream = self.open_at(index, local)?;
                    self.current = Some((index, stream));
                    self.next = index + 1;
                }
            }
        }
        Ok(())
    }

    fn open_at(&mut self, index: usize, local: u64) -> ConcatResult<O::Stream> {
        let mut stream = open_sub_stream(&mut self.openers[index], index)?;
        let sub_stream_error = |source| ConcatError::SubStream { index, source };

        let actual = stream.seek(SeekFrom::End(0)).map_err(sub_stream_error)?;
        let expected = self.lengths[index];
        if actual != expected {
            return Err(ConcatError::LengthChanged {
                index,
                expected,
                actual,
            });
        }
        stream
            .seek(SeekFrom::Start(local))
            .map_err(sub_stream_error)?;
        Ok(stream)
    }
}

impl<O> Read for SeekableConcatStream<O>
where
    O: StreamOpener,
    O::Stream: Seek,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.position_lost {
            return Err(ConcatError::PositionLost.into());
        }

        loop {
            if self.current.is_none() {
                if self.next >= self.openers.len() {
                    return Ok(0);
                }
                let index = self.next;
                let stream = self.open_at(index, 0)?;
                self.current = Some((index, stream));
                self.next = index + 1;
            }

            let read = match &mut self.current {
                Some((_, stream)) => stream.read(buf)?,
                None => 0,
            };
            if read != 0 {
                self.position += read as u64;
                return Ok(read);
            }
            self.current = None;
        }
    }
}

impl<O> Seek for SeekableConcatStream<O>
where
    O: StreamOpener,
    O::Stream: Seek,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.total.checked_add_signed(delta),
        }
        .ok_or(ConcatError::NegativePosition)?;

        self.set_position(target)?;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}
