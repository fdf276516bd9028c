//! # PCM Chunking
//!
//! Slices a canonical PCM stream into the fixed-size chunks the streaming
//! session transmits, and reports the stream's sample rate alongside them.
//!
//! Chunk order equals byte order in the source stream. The order encodes
//! temporal audio order, so no reordering or parallel splitting is allowed
//! anywhere downstream.

use crate::audio::normalize::PcmStream;

/// One transmit unit: a contiguous run of PCM bytes, at most `chunk_size` long.
pub type Chunk = Vec<u8>;

/// Split a PCM stream into consecutive chunks of `chunk_size` bytes.
///
/// ## Behavior:
/// - The final chunk may be shorter than `chunk_size`
/// - An empty stream yields an empty sequence
/// - Concatenating the chunks in order reproduces the stream exactly
pub fn split(stream: &PcmStream, chunk_size: usize) -> (Vec<Chunk>, u32) {
    let chunks = stream
        .bytes()
        .chunks(chunk_size)
        .map(|chunk| chunk.to_vec())
        .collect();
    (chunks, stream.sample_rate())
}
