//! # replaykeep-rofl
//!
//! Decoder for the `.rofl` replay container.
//!
//! A container is laid out as
//!
//! ```text
//! [16-byte header][12|13-byte secondary header][chunk stream][256-byte signature][metadata JSON][u32 LE metadata length]
//! ```
//!
//! The decoder strips the framing from both ends and splits the chunk stream
//! into [`Chunk`]s, inflating zstd-compressed chunk bodies along the way. It
//! performs no I/O and keeps no state between calls; chunk payloads are opaque
//! to this crate.

pub mod decoder;

mod error;

pub use decoder::{decode, Chunk, ReplayDecoder, CHUNK_HEADER_LEN};
pub use error::{DecodeError, Result, Stage};
