//! Resource chunk reader
//!
//! Rebuilds the logical stream written by [`ChunkWriter`](crate::ChunkWriter).
//! Slot names are derived from the stored run identifier until the first name
//! that does not exist; empty slots are skipped; the remaining chunks must
//! form the contiguous split ids `1..=count`. The declared split count is
//! reported but not validated.

use crate::error::{ChunkError, ChunkResult};
use crate::store::ResourceSource;
use slotstream_formats::{ChunkHeader, HEADER_SIZE, RUN_ID_RESOURCE, RunId};
use slotstream_io::{OffsetStream, SeekableConcatStream, StreamOpener};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// One discovered chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry {
    /// 1-based position in the logical stream
    pub split_id: u32,
    /// Split count declared in the header
    pub number_of_splits: u32,
    /// Resource holding the chunk
    pub name: String,
    /// Payload bytes after the header
    pub payload_len: u64,
}

/// Opens one chunk resource with its header skipped
#[derive(Debug)]
pub struct ChunkOpener<S> {
    source: Arc<S>,
    name: String,
}

impl<S> ChunkOpener<S> {
    /// Resource this opener reads
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S: ResourceSource> StreamOpener for ChunkOpener<S> {
    type Stream = OffsetStream<S::Reader>;

    fn open(&mut self) -> io::Result<Self::Stream> {
        trace!("opening chunk {}", self.name);
        let reader = self.source.open_read(&self.name)?;
        OffsetStream::new(reader, HEADER_SIZE as u64)
    }
}

/// Seekable logical stream over a run's chunks
pub type LogicalStream<S> = SeekableConcatStream<ChunkOpener<S>>;

/// Reads chunked resources back as one stream
#[derive(Debug)]
pub struct ChunkReader<S> {
    source: Arc<S>,
}

impl<S> Clone for ChunkReader<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: ResourceSource> ChunkReader<S> {
    /// Read from `source`
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Stored run identifier
    pub fn run_id(&self) -> ChunkResult<RunId> {
        if !self.source.exists(RUN_ID_RESOURCE) {
            return Err(ChunkError::MissingRunId);
        }
        let mut bytes = Vec::new();
        self.source
            .open_read(RUN_ID_RESOURCE)?
            .read_to_end(&mut bytes)?;
        let text = String::from_utf8(bytes).map_err(|err| {
            slotstream_formats::RunIdError(String::from_utf8_lossy(err.as_bytes()).into_owned())
        })?;
        Ok(text.parse::<RunId>()?)
    }

    /// Find, validate and order the run's chunks
    pub fn discover(&self) -> ChunkResult<Vec<ChunkEntry>> {
        let run_id = self.run_id()?;
        let mut by_split_id = BTreeMap::new();
        let mut placeholders = 0usize;

        for name in run_id.slot_names() {
            if !self.source.exists(&name) {
                break;
            }
            let length = self.source.resource_len(&name)?;
            if length == 0 {
                placeholders += 1;
                continue;
            }

            let header = self.read_header(&name)?;
            if by_split_id.contains_key(&header.split_id) {
                return Err(ChunkError::DuplicateSplitId(header.split_id));
            }

            trace!("found chunk {} in {}", header.split_id, name);
            by_split_id.insert(
                header.split_id,
                ChunkEntry {
                    split_id: header.split_id,
                    number_of_splits: header.number_of_splits,
                    name,
                    payload_len: length - HEADER_SIZE as u64,
                },
            );
        }

        let entries: Vec<ChunkEntry> = by_split_id.into_values().collect();
        if entries.is_empty() {
            return Err(ChunkError::NoChunks);
        }
        for (expected, entry) in (1u32..).zip(&entries) {
            if entry.split_id != expected {
                return Err(ChunkError::SplitIdGap {
                    expected,
                    found: entry.split_id,
                });
            }
        }

        debug!(
            "run {}: {} chunks, {} empty slots",
            run_id,
            entries.len(),
            placeholders
        );
        Ok(entries)
    }

    /// Open the logical stream
    pub fn open(&self) -> ChunkResult<LogicalStream<S>> {
        let entries = self.discover()?;
        let openers = entries.into_iter().map(|entry| ChunkOpener {
            source: Arc::clone(&self.source),
            name: entry.name,
        });
        let stream = SeekableConcatStream::new(openers)?;
        info!(
            "opened logical stream of {} bytes over {} chunks",
            stream.len(),
            stream.sub_stream_lengths().len()
        );
        Ok(stream)
    }

    /// Copy the whole logical stream into `out`
    pub fn copy_to<W: Write + ?Sized>(&self, out: &mut W) -> ChunkResult<u64> {
        let mut stream = self.open()?;
        Ok(io::copy(&mut stream, out)?)
    }

    fn read_header(&self, name: &str) -> ChunkResult<ChunkHeader> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        self.source
            .open_read(name)?
            .take(HEADER_SIZE as u64)
            .read_to_end(&mut bytes)?;
        ChunkHeader::parse(&bytes).map_err(|source| ChunkError::Header {
            name: name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ResourceSink};
    use pretty_assertions::assert_eq;
    use slotstream_formats::HeaderError;
    use slotstream_io::ConcatError;
    use std::io::{Seek, SeekFrom};

    const NIL: &str = "00000000-0000-0000-0000-000000000000";

    fn run_id() -> RunId {
        NIL.parse().unwrap()
    }

    fn chunk(split_id: u32, number_of_splits: u32, payload: &[u8]) -> Vec<u8> {
        let mut data = ChunkHeader::new(split_id, number_of_splits)
            .encode()
            .unwrap()
            .to_vec();
        data.extend_from_slice(payload);
        data
    }

    /// Store with the nil run id and the given slot contents
    fn store_with(slots: &[Vec<u8>]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (name, data) in run_id().slot_names().zip(slots) {
            store.put(&name, data).unwrap();
        }
        store.put(RUN_ID_RESOURCE, NIL.as_bytes()).unwrap();
        store
    }

    fn reader(store: MemoryStore) -> ChunkReader<MemoryStore> {
        ChunkReader::new(Arc::new(store))
    }

    #[test]
    fn test_reads_chunks_in_split_order() {
        // Slot order differs from split order
        let store = store_with(&[
            chunk(2, 4, b"world"),
            Vec::new(),
            chunk(1, 4, b"hello "),
            Vec::new(),
        ]);
        let reader = reader(store);

        let entries = reader.discover().unwrap();
        assert_eq!(
            entries.iter().map(|e| e.split_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(entries[0].payload_len, 6);

        let mut text = String::new();
        reader.open().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn test_seek_across_chunks() {
        let store = store_with(&[chunk(1, 3, b"01234"), chunk(2, 3, b"56789")]);
        let mut stream = reader(store).open().unwrap();
        assert_eq!(stream.len(), 10);

        stream.seek(SeekFrom::Start(3)).unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"3456");

        stream.seek(SeekFrom::End(-1)).unwrap();
        let mut rest = String::new();
        stream.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "9");
    }

    #[test]
    fn test_reopen_is_identical() {
        let store = store_with(&[chunk(1, 2, b"abc"), chunk(2, 2, b"def")]);
        let reader = reader(store);
        let mut first = Vec::new();
        let mut second = Vec::new();
        reader.copy_to(&mut first).unwrap();
        reader.copy_to(&mut second).unwrap();
        assert_eq!(first, b"abcdef");
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_run_id() {
        let err = reader(MemoryStore::new()).open().unwrap_err();
        assert!(matches!(err, ChunkError::MissingRunId));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_invalid_run_id() {
        let mut store = MemoryStore::new();
        store.put(RUN_ID_RESOURCE, b"\xff\xfe").unwrap();
        assert!(matches!(
            reader(store.clone()).run_id(),
            Err(ChunkError::InvalidRunId(_))
        ));
        store.put(RUN_ID_RESOURCE, b"garbage").unwrap();
        assert!(matches!(
            reader(store).run_id(),
            Err(ChunkError::InvalidRunId(_))
        ));
    }

    #[test]
    fn test_no_chunks() {
        let store = store_with(&[Vec::new(), Vec::new()]);
        assert!(matches!(
            reader(store).discover(),
            Err(ChunkError::NoChunks)
        ));
    }

    #[test]
    fn test_stops_at_first_missing_slot() {
        let mut store = store_with(&[chunk(1, 5, b"a")]);
        // Index 2 is never reached because index 1 is absent
        store.put(&run_id().slot_name(2), &chunk(2, 5, b"b")).unwrap();
        let entries = reader(store).discover().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_duplicate_split_id() {
        let store = store_with(&[chunk(1, 2, b"a"), chunk(1, 2, b"b")]);
        assert!(matches!(
            reader(store).discover(),
            Err(ChunkError::DuplicateSplitId(1))
        ));
    }

    #[test]
    fn test_split_id_gap() {
        let store = store_with(&[chunk(1, 5, b"a"), chunk(3, 5, b"c")]);
        assert!(matches!(
            reader(store).discover(),
            Err(ChunkError::SplitIdGap {
                expected: 2,
                found: 3
            })
        ));

        let store = store_with(&[chunk(2, 5, b"b")]);
        assert!(matches!(
            reader(store).discover(),
            Err(ChunkError::SplitIdGap {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn test_declared_split_count_is_not_validated() {
        let store = store_with(&[chunk(1, 1, b"a"), chunk(2, 7, b"b"), chunk(3, 0, b"c")]);
        let reader = reader(store);
        let entries = reader.discover().unwrap();
        assert_eq!(
            entries.iter().map(|e| e.number_of_splits).collect::<Vec<_>>(),
            vec![1, 7, 0]
        );
        let mut out = Vec::new();
        reader.copy_to(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_short_resource_is_header_error() {
        let store = store_with(&[b"\"FileSplitHeader\"".to_vec()]);
        let err = reader(store).discover().unwrap_err();
        assert!(matches!(
            err,
            ChunkError::Header {
                source: HeaderError::Truncated { .. },
                ..
            }
        ));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_header_only_chunk_is_empty_payload() {
        let store = store_with(&[chunk(1, 2, b""), chunk(2, 2, b"x")]);
        let mut stream = reader(store).open().unwrap();
        assert_eq!(stream.sub_stream_lengths(), &[0, 1]);
        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"x");
    }

    #[test]
    fn test_chunk_replaced_after_open_is_detected() {
        let store = store_with(&[chunk(1, 2, b"abc"), chunk(2, 2, b"def")]);
        let mut stream = reader(store.clone()).open().unwrap();
        store.insert(run_id().slot_name(1), chunk(2, 2, b"defg"));

        let err = stream.seek(SeekFrom::Start(4)).unwrap_err();
        assert!(matches!(
            ConcatError::from_io(&err),
            Some(ConcatError::LengthChanged { index: 1, .. })
        ));
    }
}
