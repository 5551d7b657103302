//! Rendezvous pipe output split into pieces and reassembled by concatenation

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use pretty_assertions::assert_eq;
use slotstream_io::{
    ConcatError, ConcatStream, OffsetStream, PipeBuilder, PipeError, SeekableConcatStream, from_fn,
};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

fn drain_in_pieces(piece_size: usize, data: Vec<u8>) -> Vec<Vec<u8>> {
    let mut reader = PipeBuilder::new()
        .with_buffer_size(0)
        .spawn(move |sink| {
            for piece in data.chunks(7) {
                sink.write_all(piece)?;
            }
            Ok(())
        })
        .unwrap();

    let mut pieces = Vec::new();
    loop {
        let mut piece = Vec::new();
        (&mut reader)
            .take(piece_size as u64)
            .read_to_end(&mut piece)
            .unwrap();
        if piece.is_empty() {
            break;
        }
        pieces.push(piece);
    }
    reader.finish().unwrap();
    pieces
}

#[test]
fn pipe_pieces_reassemble_forward() {
    let data: Vec<u8> = (0..=255).collect();
    let pieces = drain_in_pieces(40, data.clone());
    assert_eq!(pieces.len(), 7);

    let openers = pieces.into_iter().map(|piece| {
        let mut piece = Some(piece);
        from_fn(move || Ok(Cursor::new(piece.take().unwrap_or_default())))
    });
    let mut stream = ConcatStream::new(openers).unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn framed_pieces_reassemble_with_seek() {
    const PREFIX: &[u8] = b"HDR:";
    let data: Vec<u8> = (0..100).collect();
    let framed: Vec<Vec<u8>> = drain_in_pieces(30, data.clone())
        .into_iter()
        .map(|piece| [PREFIX, &piece[..]].concat())
        .collect();

    let openers = framed.into_iter().map(|bytes| {
        from_fn(move || OffsetStream::new(Cursor::new(bytes.clone()), PREFIX.len() as u64))
    });
    let mut stream = SeekableConcatStream::new(openers).unwrap();
    assert_eq!(stream.len(), 100);
    assert_eq!(stream.sub_stream_lengths(), &[30, 30, 30, 10]);

    stream.seek(SeekFrom::Start(55)).unwrap();
    let mut buf = [0u8; 10];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(buf.to_vec(), data[55..65].to_vec());
    assert_eq!(stream.current_index(), Some(2));

    let err = stream.seek(SeekFrom::Current(-100)).unwrap_err();
    assert!(matches!(
        ConcatError::from_io(&err),
        Some(ConcatError::NegativePosition)
    ));
}

#[test]
fn producer_failure_reaches_reader() {
    let mut reader = PipeBuilder::new()
        .spawn(|sink| {
            sink.write_all(b"ok so far")?;
            sink.flush()?;
            Err("disk full".into())
        })
        .unwrap();

    let mut out = Vec::new();
    let err = reader.read_to_end(&mut out).unwrap_err();
    assert_eq!(out, b"ok so far");
    let pipe = PipeError::from_io(&err).unwrap();
    assert!(pipe.is_producer_failure());
    assert!(pipe.to_string().contains("disk full"));
    assert!(matches!(reader.finish(), Err(PipeError::ProducerFailed(_))));
}
