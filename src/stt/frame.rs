//! # Wire Framing
//!
//! Encodes one PCM chunk plus its metadata into the recognizer's binary
//! message format:
//!
//! ```text
//! [4-byte LE metadata length][metadata JSON][raw PCM chunk bytes]
//! ```
//!
//! The metadata record is self-describing — it carries the chunk's byte
//! length as well as the sample rate, so a receiver can locate the next
//! frame boundary from the record alone instead of needing the chunk size
//! out of band:
//!
//! ```json
//! {"sampleRate": 16000, "chunkLength": 16384}
//! ```
//!
//! Framing is pure and deterministic: the same chunk and rate always
//! produce the same bytes.

use crate::error::{AppError, AppResult};
use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;

/// Metadata record prepended to every transmitted chunk.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameMeta {
    sample_rate: u32,
    chunk_length: usize,
}

/// Encode one chunk into a single binary wire message.
///
/// ## Layout:
/// 1. u32 little-endian byte length of the metadata JSON
/// 2. the metadata JSON itself
/// 3. the raw chunk bytes, with no further separator
pub fn frame(chunk: &[u8], sample_rate: u32) -> AppResult<Vec<u8>> {
    let meta = serde_json::to_vec(&FrameMeta {
        sample_rate,
        chunk_length: chunk.len(),
    })
    .map_err(|e| AppError::Internal(format!("frame metadata serialization failed: {}", e)))?;

    let mut message = Vec::with_capacity(4 + meta.len() + chunk.len());
    message
        .write_u32::<LittleEndian>(meta.len() as u32)
        .map_err(|e| AppError::Internal(format!("frame prefix write failed: {}", e)))?;
    message.extend_from_slice(&meta);
    message.extend_from_slice(chunk);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    /// Split a wire message back into (metadata JSON, chunk bytes).
    fn decode(message: &[u8]) -> (serde_json::Value, Vec<u8>) {
        let mut cursor = Cursor::new(message);
        let meta_len = cursor.read_u32::<LittleEndian>().unwrap() as usize;
        let meta_bytes = &message[4..4 + meta_len];
        let meta = serde_json::from_slice(meta_bytes).unwrap();
        (meta, message[4 + meta_len..].to_vec())
    }

    #[test]
    fn test_prefix_matches_metadata_length() {
        for (chunk, rate) in [
            (vec![0u8; 16384], 16_000u32),
            (vec![1u8, 2, 3], 8_000),
            (Vec::new(), 44_100),
        ] {
            let message = frame(&chunk, rate).unwrap();
            let mut cursor = Cursor::new(&message);
            let meta_len = cursor.read_u32::<LittleEndian>().unwrap() as usize;

            // The prefix decodes to exactly the serialized metadata byte length
            assert!(serde_json::from_slice::<serde_json::Value>(&message[4..4 + meta_len]).is_ok());
            assert_eq!(message.len(), 4 + meta_len + chunk.len());
        }
    }

    #[test]
    fn test_metadata_is_self_describing() {
        let chunk = vec![7u8; 123];
        let (meta, payload) = decode(&frame(&chunk, 16_000).unwrap());

        assert_eq!(meta["sampleRate"], 16_000);
        assert_eq!(meta["chunkLength"], 123);
        assert_eq!(payload, chunk);
    }

    #[test]
    fn test_framing_is_deterministic() {
        let chunk = vec![42u8; 64];
        assert_eq!(frame(&chunk, 16_000).unwrap(), frame(&chunk, 16_000).unwrap());
    }

    #[test]
    fn test_empty_chunk_frames_cleanly() {
        let (meta, payload) = decode(&frame(&[], 16_000).unwrap());
        assert_eq!(meta["chunkLength"], 0);
        assert!(payload.is_empty());
    }
}
