//! Resource chunk writer
//!
//! Drains a byte stream into a fixed budget of named slots. Each non-empty
//! slot holds a [`ChunkHeader`] followed by up to
//! [`ChunkConfig::payload_size`] payload bytes. Only one slot's worth of data
//! is held in memory at a time.
//!
//! ```rust
//! use slotstream_resources::{ChunkConfig, ChunkReader, ChunkWriter, MemoryStore};
//! use std::io::{Read, Write};
//! use std::sync::Arc;
//!
//! let config = ChunkConfig::new().with_split_size(200).with_max_total_size(1000);
//! let mut store = MemoryStore::new();
//! let summary = ChunkWriter::new(config)?
//!     .pack(&mut store, |sink| {
//!         sink.write_all(&[7u8; 500])?;
//!         Ok(())
//!     })?;
//! assert_eq!(summary.chunks, 6);
//!
//! let mut stream = ChunkReader::new(Arc::new(store)).open()?;
//! let mut data = Vec::new();
//! stream.read_to_end(&mut data)?;
//! assert_eq!(data, vec![7u8; 500]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::ChunkConfig;
use crate::error::{ChunkError, ChunkResult};
use crate::store::ResourceSink;
use slotstream_formats::{ChunkHeader, HEADER_SIZE, RUN_ID_RESOURCE, RunId};
use slotstream_io::{BoxError, PipeBuilder, PipeError, PipeSink};
use std::io::{self, Read};
use tracing::{debug, info, trace, warn};

/// Outcome of one packaging run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    /// Identifier the slot names were derived from
    pub run_id: RunId,
    /// Number of non-empty chunks
    pub chunks: u32,
    /// Logical stream length
    pub payload_bytes: u64,
    /// Slots written, placeholders included
    pub slots_written: usize,
}

/// Packs a stream into framed resource slots
#[derive(Debug, Clone)]
pub struct ChunkWriter {
    config: ChunkConfig,
    run_id: Option<RunId>,
}

impl ChunkWriter {
    /// Create a writer, validating `config`
    pub fn new(config: ChunkConfig) -> ChunkResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            run_id: None,
        })
    }

    /// Use a fixed run identifier instead of a fresh one
    #[must_use]
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Drain `source` into `sink`
    ///
    /// The run identifier is stored after every slot, so an interrupted run
    /// never looks complete.
    pub fn write_from<R, K>(&self, mut source: R, sink: &mut K) -> ChunkResult<PackSummary>
    where
        R: Read,
        K: ResourceSink + ?Sized,
    {
        let run_id = self.run_id.clone().unwrap_or_else(RunId::generate);
        let payload_size = self.config.payload_size();
        let max_slots = self.config.max_slots();
        let number_of_splits = u32::try_from(max_slots).map_err(|_| {
            ChunkError::InvalidConfig(format!("{max_slots} slots do not fit a split count"))
        })?;

        debug!(
            "packing run {} into up to {} slots of {} payload bytes",
            run_id, max_slots, payload_size
        );

        let mut chunk = Vec::with_capacity(HEADER_SIZE + payload_size);
        let mut chunks = 0u32;
        let mut payload_bytes = 0u64;
        let mut slots_written = 0usize;
        let mut exhausted = false;

        for name in run_id.slot_names().take(max_slots) {
            if exhausted {
                sink.put(&name, &[])?;
                slots_written += 1;
                continue;
            }

            chunk.clear();
            chunk.resize(HEADER_SIZE + payload_size, 0);
            let read = read_full(&mut source, &mut chunk[HEADER_SIZE..])?;

            if read == 0 {
                trace!("source exhausted, placeholder in {}", name);
                sink.put(&name, &[])?;
                slots_written += 1;
                exhausted = true;
                if !self.config.fill_placeholders {
                    break;
                }
                continue;
            }

            chunks += 1;
            let header = ChunkHeader::new(chunks, number_of_splits).encode().map_err(|source| {
                ChunkError::Header {
                    name: name.clone(),
                    source,
                }
            })?;
            chunk[..HEADER_SIZE].copy_from_slice(&header);
            chunk.truncate(HEADER_SIZE + read);

            trace!("storing chunk {} ({} bytes) in {}", chunks, read, name);
            sink.put(&name, &chunk)?;
            slots_written += 1;
            payload_bytes += read as u64;
        }

        if !exhausted {
            let mut extra = [0u8; 1];
            if read_full(&mut source, &mut extra)? != 0 {
                warn!(
                    "run {} exceeds the budget of {} slots, aborting",
                    run_id, max_slots
                );
                return Err(ChunkError::BudgetExceeded {
                    max_slots,
                    payload_size,
                });
            }
        }

        sink.put(RUN_ID_RESOURCE, run_id.as_str().as_bytes())?;

        info!(
            "packed run {}: {} chunks, {} bytes, {} slots written",
            run_id, chunks, payload_bytes, slots_written
        );
        Ok(PackSummary {
            run_id,
            chunks,
            payload_bytes,
            slots_written,
        })
    }

    /// Run `producer` on a rendezvous pipe and pack what it writes
    ///
    /// The producer thread is always joined before this returns.
    pub fn pack<K, F>(&self, sink: &mut K, producer: F) -> ChunkResult<PackSummary>
    where
        K: ResourceSink + ?Sized,
        F: FnOnce(&mut PipeSink) -> Result<(), BoxError> + Send + 'static,
    {
        let mut reader = PipeBuilder::new()
            .with_buffer_size(self.config.pipe_buffer_size)
            .with_thread_name("slotstream-producer")
            .spawn(producer)?;

        let written = self.write_from(&mut reader, sink);
        settle(written, reader.finish())
    }
}

/// Combine the writer outcome with the producer outcome reported by `finish`
///
/// A writer error wins. A producer failure seen only by `finish` is still
/// logged so it is not lost.
fn settle(
    written: ChunkResult<PackSummary>,
    finished: Result<(), PipeError>,
) -> ChunkResult<PackSummary> {
    match (written, finished) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(err)) => Err(ChunkError::Producer(err)),
        (Err(err @ ChunkError::Producer(_)), Err(_)) => Err(err),
        (Err(err), Err(producer)) => {
            warn!("producer also failed after write error: {}", producer);
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
    }
}

/// Fill `buf` from `source`, stopping early only at end of stream
fn read_full<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> ChunkResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(ChunkError::from_source_io(err)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};
    use std::sync::Arc;

    const NIL: &str = "00000000-0000-0000-0000-000000000000";

    fn small_config() -> ChunkConfig {
        // 10 payload bytes per slot, 5 slots
        ChunkConfig::new()
            .with_split_size(HEADER_SIZE + 10)
            .with_max_total_size(50)
    }

    fn writer(config: ChunkConfig) -> ChunkWriter {
        ChunkWriter::new(config)
            .unwrap()
            .with_run_id(NIL.parse().unwrap())
    }

    /// Yields one byte per call and an `Interrupted` error before each
    struct Trickle {
        data: Vec<u8>,
        position: usize,
        interrupt: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            match self.data.get(self.position) {
                Some(&byte) if !buf.is_empty() => {
                    buf[0] = byte;
                    self.position += 1;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn test_chunk_layout() {
        let mut store = MemoryStore::new();
        let data: Vec<u8> = (0..25).collect();
        let summary = writer(small_config())
            .write_from(Cursor::new(&data), &mut store)
            .unwrap();

        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.payload_bytes, 25);
        assert_eq!(summary.slots_written, 5);

        let run_id = summary.run_id;
        let lengths: Vec<usize> = run_id
            .slot_names()
            .take(5)
            .map(|name| store.get(&name).unwrap().len())
            .collect();
        assert_eq!(lengths, vec![122, 122, 117, 0, 0]);

        let third = store.get(&run_id.slot_name(2)).unwrap();
        assert_eq!(ChunkHeader::parse(&third).unwrap(), ChunkHeader::new(3, 5));
        assert_eq!(&third[HEADER_SIZE..], &data[20..]);
        assert_eq!(store.get(RUN_ID_RESOURCE).unwrap().as_ref(), NIL.as_bytes());
    }

    #[test]
    fn test_single_placeholder_policy() {
        let mut store = MemoryStore::new();
        let summary = writer(small_config().with_fill_placeholders(false))
            .write_from(Cursor::new(vec![1u8; 10]), &mut store)
            .unwrap();

        assert_eq!(summary.chunks, 1);
        assert_eq!(summary.slots_written, 2);
        assert!(store.get(&summary.run_id.slot_name(1)).unwrap().is_empty());
        assert!(store.get(&summary.run_id.slot_name(2)).is_none());
    }

    #[test]
    fn test_empty_source() {
        let mut store = MemoryStore::new();
        let summary = writer(small_config())
            .write_from(io::empty(), &mut store)
            .unwrap();
        assert_eq!(summary.chunks, 0);
        assert_eq!(summary.slots_written, 5);
        // 5 placeholders plus the run identifier
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_exact_budget_has_no_placeholder() {
        let mut store = MemoryStore::new();
        let summary = writer(small_config())
            .write_from(Cursor::new(vec![9u8; 50]), &mut store)
            .unwrap();
        assert_eq!(summary.chunks, 5);
        assert_eq!(summary.slots_written, 5);
    }

    #[test]
    fn test_budget_exceeded_is_fatal() {
        let mut store = MemoryStore::new();
        let err = writer(small_config())
            .write_from(Cursor::new(vec![9u8; 51]), &mut store)
            .unwrap_err();
        assert!(matches!(
            err,
            ChunkError::BudgetExceeded {
                max_slots: 5,
                payload_size: 10
            }
        ));
        assert!(store.get(RUN_ID_RESOURCE).is_none());
    }

    #[test]
    fn test_partial_reads_fill_slots() {
        let mut store = MemoryStore::new();
        let source = Trickle {
            data: (0..15).collect(),
            position: 0,
            interrupt: false,
        };
        let summary = writer(small_config())
            .write_from(source, &mut store)
            .unwrap();
        assert_eq!(summary.chunks, 2);
        assert_eq!(
            store.get(&summary.run_id.slot_name(0)).unwrap().len(),
            HEADER_SIZE + 10
        );
    }

    #[test]
    fn test_generated_run_ids_differ() {
        let writer = ChunkWriter::new(small_config()).unwrap();
        let mut store = MemoryStore::new();
        let first = writer.write_from(io::empty(), &mut store).unwrap();
        let second = writer.write_from(io::empty(), &mut store).unwrap();
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ChunkWriter::new(ChunkConfig::new().with_split_size(HEADER_SIZE)).is_err());
    }

    #[test]
    fn test_pack_through_pipe() {
        let mut store = MemoryStore::new();
        let summary = writer(small_config().with_pipe_buffer_size(3))
            .pack(&mut store, |sink| {
                for byte in 0..33u8 {
                    sink.write_all(&[byte])?;
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(summary.chunks, 4);
        assert_eq!(summary.payload_bytes, 33);
    }

    #[test]
    fn test_pack_reports_producer_failure() {
        let mut store = MemoryStore::new();
        let err = writer(small_config())
            .pack(&mut store, |sink| {
                sink.write_all(b"partial")?;
                Err("archive backend failed".into())
            })
            .unwrap_err();
        assert!(matches!(err, ChunkError::Producer(_)), "{err}");
        assert!(err.to_string().contains("archive backend failed"));
        assert!(store.get(RUN_ID_RESOURCE).is_none());
    }

    #[test]
    fn test_sink_error_wins_over_producer_failure() {
        let sink_error = || ChunkError::Io(io::Error::other("disk full"));
        let producer_error = || PipeError::ProducerFailed(Arc::from(BoxError::from("backend")));

        let err = settle(Err(sink_error()), Err(producer_error())).unwrap_err();
        assert!(matches!(err, ChunkError::Io(_)), "{err}");
        assert!(err.to_string().contains("disk full"));

        let err = settle(Err(ChunkError::Producer(producer_error())), Err(producer_error()))
            .unwrap_err();
        assert!(matches!(err, ChunkError::Producer(_)));

        let summary = PackSummary {
            run_id: NIL.parse().unwrap(),
            chunks: 1,
            payload_bytes: 3,
            slots_written: 5,
        };
        let err = settle(Ok(summary), Err(producer_error())).unwrap_err();
        assert!(matches!(err, ChunkError::Producer(_)));
    }

    #[test]
    fn test_pack_budget_exceeded_joins_producer() {
        let mut store = MemoryStore::new();
        let err = writer(small_config())
            .pack(&mut store, |sink| {
                loop {
                    sink.write_all(&[0u8; 16])?;
                }
            })
            .unwrap_err();
        assert!(matches!(err, ChunkError::BudgetExceeded { .. }));
    }
}
