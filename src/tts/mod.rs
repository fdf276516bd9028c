//! # Speech Synthesis Client
//!
//! The client side of the external text-to-speech service. One call sends the
//! text as a single frame, collects the binary PCM the synthesizer streams
//! back, and wraps it as a WAV file for the HTTP response.
//!
//! ## End-of-stream:
//! The synthesizer does not send an explicit terminator. A read timeout on a
//! quiet socket, a non-binary frame, or the peer closing all count as normal
//! completion — mirroring the recognition session, where timeouts also end a
//! healthy exchange.

use crate::config::SynthesizerConfig;
use crate::error::{AppError, AppResult};
use futures_util::{SinkExt, StreamExt};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info};

/// Stateless facade over the synthesis service.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    config: SynthesizerConfig,
}

impl Synthesizer {
    /// Create a facade for the given synthesizer configuration.
    pub fn new(config: SynthesizerConfig) -> Self {
        Self { config }
    }

    /// Synthesize `text` into WAV bytes (mono, 16-bit, configured rate).
    ///
    /// ## Errors:
    /// - `ConnectionError` if the WebSocket handshake does not complete
    /// - `TransmissionError` if sending the text fails
    pub async fn synthesize(&self, text: &str) -> AppResult<Vec<u8>> {
        let endpoint = &self.config.endpoint;
        info!(endpoint, chars = text.len(), "opening synthesis session");

        let (mut ws, _) = connect_async(endpoint).await.map_err(|e| {
            AppError::ConnectionError(format!("handshake with {} failed: {}", endpoint, e))
        })?;

        ws.send(Message::Text(text.into()))
            .await
            .map_err(|e| AppError::TransmissionError(format!("sending text failed: {}", e)))?;

        let read_timeout = Duration::from_millis(self.config.read_timeout_ms);
        let mut pcm: Vec<u8> = Vec::new();

        loop {
            match timeout(read_timeout, ws.next()).await {
                Ok(Some(Ok(Message::Binary(bytes)))) => pcm.extend_from_slice(&bytes),
                // A non-binary frame is the synthesizer's way of saying done
                Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Ok(_))) => break,
                // Peer teardown and quiet sockets both mean completion
                Ok(Some(Err(_))) | Ok(None) | Err(_) => break,
            }
        }

        let _ = ws.close(None).await;

        debug!(bytes = pcm.len(), "synthesis complete, wrapping as WAV");
        wrap_as_wav(&pcm, self.config.output_sample_rate)
    }
}

/// Wrap raw 16-bit LE mono PCM bytes in a WAV container.
fn wrap_as_wav(pcm: &[u8], sample_rate: u32) -> AppResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AppError::Internal(format!("WAV header write failed: {}", e)))?;
        // An odd trailing byte cannot form a sample and is dropped
        for sample in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .map_err(|e| AppError::Internal(format!("WAV sample write failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| AppError::Internal(format!("WAV finalize failed: {}", e)))?;
    }

    Ok(cursor.into_inner())
}
