//! # Audio Processing Module
//!
//! This module turns uploaded audio files into the canonical PCM stream the
//! streaming recognizer client transmits.
//!
//! ## Key Components:
//! - **Normalizer**: content-based format detection and decoding to mono 16-bit PCM
//! - **Chunker**: splitting the canonical stream into fixed-size frames
//!
//! ## Canonical Stream Format:
//! - **Bit Depth**: 16-bit signed PCM
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: Little-endian
//! - **Sample Rate**: preserved for WAV uploads, 16kHz for everything else;
//!   always reported alongside the data

pub mod chunk;        // Fixed-size PCM chunking
pub mod normalize;    // Format detection, decoding, downmix, resampling

pub use chunk::{split, Chunk};
pub use normalize::{normalize, PcmStream};
