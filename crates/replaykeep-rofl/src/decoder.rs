//! Container framing removal and chunk stream splitting.

use std::io::Read;

use tracing::{debug, trace, Span};
use zstd::stream::read::Decoder;

use crate::error::{DecodeError, Result, Stage};

/// Size of the per-chunk header: `id:u32, type:u8, secondary_id:u32,
/// uncompressed_len:u32, compressed_len:u32`, all little-endian.
pub const CHUNK_HEADER_LEN: usize = 17;

const METADATA_LENGTH_LEN: usize = 4;
const SIGNATURE_LEN: usize = 0x100;
const HEADER_LEN: usize = 0x10;

/// Offset of the byte that selects the secondary header variant.
const SECONDARY_SELECTOR_OFFSET: usize = 0xC;
const SECONDARY_HEADER_SHORT: usize = 0xC;
const SECONDARY_HEADER_LONG: usize = 0xD;

/// Upper bound on a single inflated chunk. Guards against a frame that
/// inflates without limit.
const MAX_CHUNK_PAYLOAD: usize = 256 * 1024 * 1024;

/// One record of the chunk stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: u32,
    /// Discriminates payload semantics. Opaque to this crate.
    pub chunk_type: u8,
    pub secondary_id: u32,
    pub uncompressed_len: u32,
    pub compressed_len: u32,
    /// Inflated body. Empty when the chunk carried no compressed body. Its
    /// length is whatever the frame inflates to, which need not equal
    /// `uncompressed_len`.
    pub payload: Vec<u8>,
}

/// Decodes replay containers under a caller-provided tracing span.
#[derive(Debug, Clone)]
pub struct ReplayDecoder {
    span: Span,
}

impl ReplayDecoder {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Decode a whole container held in memory.
    ///
    /// Either every chunk is returned or an error is; chunks decoded before a
    /// body-level failure are discarded.
    pub fn decode(&self, raw: &[u8]) -> Result<Vec<Chunk>> {
        let _entered = self.span.enter();

        let stream = strip_framing(raw)?;
        let chunks = split_chunks(stream)?;

        debug!(
            input_len = raw.len(),
            stream_len = stream.len(),
            chunks = chunks.len(),
            "Decoded replay container"
        );
        Ok(chunks)
    }
}

impl Default for ReplayDecoder {
    fn default() -> Self {
        Self::new(Span::none())
    }
}

/// Decode `raw` with a decoder that logs under no particular span.
pub fn decode(raw: &[u8]) -> Result<Vec<Chunk>> {
    ReplayDecoder::default().decode(raw)
}

fn require(stage: Stage, needed: usize, available: usize) -> Result<()> {
    if available < needed {
        return Err(DecodeError::Truncated {
            stage,
            needed,
            available,
        });
    }
    Ok(())
}

/// Strip metadata, signature, header and secondary header, returning the
/// chunk stream.
fn strip_framing(raw: &[u8]) -> Result<&[u8]> {
    require(Stage::MetadataLength, METADATA_LENGTH_LEN, raw.len())?;
    let (rest, length_field) = raw.split_at(raw.len() - METADATA_LENGTH_LEN);
    let metadata_len = le_u32(length_field) as usize;

    require(
        Stage::Metadata,
        metadata_len.saturating_add(METADATA_LENGTH_LEN),
        raw.len(),
    )?;
    let rest = &rest[..rest.len() - metadata_len];

    require(Stage::Signature, SIGNATURE_LEN, rest.len())?;
    let rest = &rest[..rest.len() - SIGNATURE_LEN];

    require(Stage::Header, HEADER_LEN, rest.len())?;
    let rest = &rest[HEADER_LEN..];

    require(Stage::SecondaryHeader, SECONDARY_HEADER_LONG, rest.len())?;
    let secondary_len = if rest[SECONDARY_SELECTOR_OFFSET] == 1 {
        SECONDARY_HEADER_SHORT
    } else {
        SECONDARY_HEADER_LONG
    };

    Ok(&rest[secondary_len..])
}

fn split_chunks(mut stream: &[u8]) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();

    while stream.len() >= CHUNK_HEADER_LEN {
        let index = chunks.len();
        let (header, rest) = stream.split_at(CHUNK_HEADER_LEN);
        stream = rest;

        let mut chunk = Chunk {
            id: le_u32(&header[0..4]),
            chunk_type: header[4],
            secondary_id: le_u32(&header[5..9]),
            uncompressed_len: le_u32(&header[9..13]),
            compressed_len: le_u32(&header[13..17]),
            payload: Vec::new(),
        };

        if chunk.compressed_len > 0 {
            let len = chunk.compressed_len as usize;
            if stream.len() < len {
                return Err(DecodeError::Corrupt {
                    chunk_index: index,
                    reason: format!("body needs {len} bytes, {} available", stream.len()),
                });
            }
            let (body, rest) = stream.split_at(len);
            stream = rest;

            chunk.payload = inflate(body, chunk.uncompressed_len as usize).map_err(|reason| {
                DecodeError::Corrupt {
                    chunk_index: index,
                    reason,
                }
            })?;
            if chunk.payload.len() != chunk.uncompressed_len as usize {
                debug!(
                    index,
                    declared = chunk.uncompressed_len,
                    inflated = chunk.payload.len(),
                    "Chunk inflated to a different length than declared"
                );
            }
        } else if chunk.uncompressed_len > 0 {
            // Stored bodies are not needed downstream. One that runs past the
            // end ends the stream.
            let len = chunk.uncompressed_len as usize;
            if stream.len() < len {
                trace!(index, id = chunk.id, "Stored body runs past end of stream");
                chunks.push(chunk);
                break;
            }
            stream = &stream[len..];
        }

        trace!(
            index,
            id = chunk.id,
            chunk_type = chunk.chunk_type,
            payload_len = chunk.payload.len(),
            "Decoded chunk"
        );
        chunks.push(chunk);
    }

    Ok(chunks)
}

/// Inflate one zstd body. `size_hint` only sizes the initial buffer.
fn inflate(body: &[u8], size_hint: usize) -> std::result::Result<Vec<u8>, String> {
    let decoder =
        Decoder::with_buffer(body).map_err(|e| format!("failed to initialise zstd decoder: {e}"))?;

    let mut payload = Vec::with_capacity(size_hint.min(MAX_CHUNK_PAYLOAD));
    decoder
        .take(MAX_CHUNK_PAYLOAD as u64 + 1)
        .read_to_end(&mut payload)
        .map_err(|e| format!("zstd decompression failed: {e}"))?;

    if payload.len() > MAX_CHUNK_PAYLOAD {
        return Err(format!(
            "inflates past the {MAX_CHUNK_PAYLOAD} byte limit"
        ));
    }
    Ok(payload)
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Body<'a> {
        Empty,
        Compressed(&'a [u8]),
        Stored(&'a [u8]),
    }

    fn record(id: u32, chunk_type: u8, secondary_id: u32, body: Body<'_>) -> Vec<u8> {
        let (uncompressed_len, compressed_len, bytes) = match body {
            Body::Empty => (0, 0, Vec::new()),
            Body::Compressed(data) => {
                let compressed = zstd::bulk::compress(data, 0).unwrap();
                (data.len() as u32, compressed.len() as u32, compressed)
            }
            Body::Stored(data) => (data.len() as u32, 0, data.to_vec()),
        };

        let mut out = Vec::new();
        out.extend_from_slice(&id.to_le_bytes());
        out.push(chunk_type);
        out.extend_from_slice(&secondary_id.to_le_bytes());
        out.extend_from_slice(&uncompressed_len.to_le_bytes());
        out.extend_from_slice(&compressed_len.to_le_bytes());
        out.extend_from_slice(&bytes);
        out
    }

    const METADATA: &[u8] = br#"{"gameLength":1}"#;

    fn container(secondary: &[u8], stream: &[u8]) -> Vec<u8> {
        let mut out = vec![0xAA; HEADER_LEN];
        out.extend_from_slice(secondary);
        out.extend_from_slice(stream);
        out.extend_from_slice(&[0xFF; SIGNATURE_LEN]);
        out.extend_from_slice(METADATA);
        out.extend_from_slice(&(METADATA.len() as u32).to_le_bytes());
        out
    }

    fn trailer_len() -> usize {
        SIGNATURE_LEN + METADATA.len() + METADATA_LENGTH_LEN
    }

    #[test]
    fn single_empty_chunk_with_long_secondary_header() {
        let mut raw = vec![0u8; HEADER_LEN];
        raw.extend_from_slice(&[0u8; 13]);
        raw.extend_from_slice(&record(1, 0, 0, Body::Empty));
        raw.extend_from_slice(&[0u8; SIGNATURE_LEN]);
        raw.extend_from_slice(&0u32.to_le_bytes());

        let chunks = decode(&raw).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, 1);
        assert_eq!(chunks[0].chunk_type, 0);
        assert!(chunks[0].payload.is_empty());
    }

    #[test]
    fn mixed_chunks_keep_order_and_payloads() {
        let first = b"first chunk payload, compressible compressible compressible".to_vec();
        let third = vec![7u8; 300];

        let mut stream = Vec::new();
        stream.extend(record(10, 1, 100, Body::Compressed(&first)));
        stream.extend(record(11, 2, 101, Body::Stored(b"skipped bytes")));
        stream.extend(record(12, 1, 102, Body::Compressed(&third)));
        stream.extend(record(13, 2, 103, Body::Empty));

        let chunks = decode(&container(&[0u8; 13], &stream)).unwrap();

        let ids: Vec<u32> = chunks.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![10, 11, 12, 13]);
        assert_eq!(chunks[0].payload, first);
        assert_eq!(chunks[0].secondary_id, 100);
        assert!(chunks[1].payload.is_empty());
        assert_eq!(chunks[1].uncompressed_len, 13);
        assert_eq!(chunks[1].compressed_len, 0);
        assert_eq!(chunks[2].payload, third);
        assert_eq!(chunks[2].chunk_type, 1);
        assert!(chunks[3].payload.is_empty());
    }

    #[test]
    fn short_secondary_header_variant() {
        // With the 12-byte variant the selector byte is the first byte of the
        // chunk stream, i.e. the low byte of the first chunk id.
        let payload = b"short header".to_vec();
        let mut stream = record(1, 3, 0, Body::Compressed(&payload));
        stream.extend(record(2, 3, 0, Body::Empty));

        let chunks = decode(&container(&[0u8; 12], &stream)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, 1);
        assert_eq!(chunks[0].payload, payload);
        assert_eq!(chunks[1].id, 2);
    }

    #[test]
    fn empty_stream_is_valid() {
        let chunks = decode(&container(&[0u8; 13], &[])).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn trailing_partial_header_is_ignored() {
        let mut stream = record(5, 0, 0, Body::Empty);
        stream.extend_from_slice(&[0x42; CHUNK_HEADER_LEN - 1]);

        let chunks = decode(&container(&[0u8; 13], &stream)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, 5);
    }

    #[test]
    fn too_short_for_length_field() {
        let err = decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                stage: Stage::MetadataLength,
                ..
            }
        ));
    }

    #[test]
    fn truncation_in_trailer_is_detected() {
        let mut stream = record(1, 1, 0, Body::Compressed(b"payload"));
        stream.extend(record(2, 1, 0, Body::Empty));
        let raw = container(&[0u8; 13], &stream);

        for cut in (raw.len() - trailer_len() + 1)..raw.len() {
            match decode(&raw[..cut]) {
                Err(DecodeError::Truncated { .. }) => {}
                other => panic!("cut at {cut}: expected Truncated, got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_secondary_header_is_truncated() {
        let raw = container(&[0u8; 5], &[]);
        let err = decode(&raw).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                stage: Stage::SecondaryHeader,
                ..
            }
        ));
    }

    #[test]
    fn missing_signature_is_truncated() {
        let mut raw = vec![0u8; 100];
        raw.extend_from_slice(&0u32.to_le_bytes());
        let err = decode(&raw).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                stage: Stage::Signature,
                ..
            }
        ));
    }

    #[test]
    fn damaged_frame_is_corrupt() {
        let mut stream = record(1, 0, 0, Body::Empty);
        let second_body_at = stream.len() + CHUNK_HEADER_LEN;
        stream.extend(record(2, 1, 0, Body::Compressed(b"will be damaged")));
        // Clobber the zstd frame magic.
        for byte in &mut stream[second_body_at..second_body_at + 4] {
            *byte ^= 0xFF;
        }

        let err = decode(&container(&[0u8; 13], &stream)).unwrap_err();
        match err {
            DecodeError::Corrupt { chunk_index, .. } => assert_eq!(chunk_index, 1),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn flipped_body_byte_is_corrupt() {
        let data: Vec<u8> = (0..2048u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut compressor = zstd::bulk::Compressor::new(3).unwrap();
        compressor.include_checksum(true).unwrap();
        let frame = compressor.compress(&data).unwrap();

        let mut stream = Vec::new();
        stream.extend_from_slice(&1u32.to_le_bytes());
        stream.push(1);
        stream.extend_from_slice(&0u32.to_le_bytes());
        stream.extend_from_slice(&(data.len() as u32).to_le_bytes());
        stream.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        let middle = stream.len() + frame.len() / 2;
        stream.extend_from_slice(&frame);
        stream[middle] ^= 0x5A;

        let err = decode(&container(&[0u8; 13], &stream)).unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt { chunk_index: 0, .. }));
    }

    #[test]
    fn short_compressed_body_is_corrupt() {
        let mut stream = record(1, 1, 0, Body::Compressed(b"cut short"));
        stream.truncate(stream.len() - 3);

        let err = decode(&container(&[0u8; 13], &stream)).unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt { chunk_index: 0, .. }));
    }

    #[test]
    fn declared_length_does_not_bound_payload() {
        let payload = b"thirty-six bytes of chunk payload...".to_vec();
        assert_eq!(payload.len(), 36);

        for declared in [35u32, 0, 46] {
            let mut stream = record(1, 1, 0, Body::Compressed(&payload));
            stream[9..13].copy_from_slice(&declared.to_le_bytes());

            let chunks = decode(&container(&[0u8; 13], &stream)).unwrap();
            assert_eq!(chunks.len(), 1, "declared {declared}");
            assert_eq!(chunks[0].uncompressed_len, declared);
            assert_eq!(chunks[0].payload, payload, "declared {declared}");
        }
    }

    #[test]
    fn stored_body_running_past_end_ends_stream() {
        let mut stream = record(1, 1, 0, Body::Compressed(b"kept"));
        stream.extend(record(2, 2, 0, Body::Stored(b"0123456789")));
        stream.truncate(stream.len() - 4);

        let chunks = decode(&container(&[0u8; 13], &stream)).unwrap();
        let ids: Vec<u32> = chunks.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(chunks[0].payload, b"kept");
        assert!(chunks[1].payload.is_empty());
    }
}
