//! # Streaming Recognition Client
//!
//! The client side of the external speech-to-text service:
//! - **Framing**: the length-prefixed binary wire format (`frame`)
//! - **Session**: one paced, bidirectional WebSocket exchange (`session`)
//! - **Facade**: the one-call pipeline from uploaded bytes to transcript
//!
//! ## Pipeline:
//! Normalizer → Chunker → Streaming Session, in that order. Any component
//! failure propagates unchanged to the caller.

pub mod frame;
pub mod session;

pub use session::SessionOptions;

use crate::audio;
use crate::config::RecognizerConfig;
use crate::error::AppResult;

/// Stateless facade over the recognition pipeline.
///
/// Holds only configuration: every call opens its own connection and task
/// pair, and nothing survives past the returned transcript.
#[derive(Debug, Clone)]
pub struct Recognizer {
    config: RecognizerConfig,
}

impl Recognizer {
    /// Create a facade for the given recognizer configuration.
    pub fn new(config: RecognizerConfig) -> Self {
        Self { config }
    }

    /// Convert an uploaded audio buffer into its transcript.
    ///
    /// ## Errors:
    /// - `UnsupportedFormat` if the bytes are not decodable audio
    /// - `ConnectionError` / `TransmissionError` from the streaming session
    pub async fn recognize(&self, bytes: &[u8]) -> AppResult<String> {
        let pcm = audio::normalize(bytes)?;
        let (chunks, sample_rate) = audio::split(&pcm, self.config.chunk_size);

        let options = SessionOptions {
            silence_ms: self.config.silence_ms,
            frame_interval_ms: self.config.frame_interval_ms,
            deadline_ms: self.config.deadline_ms,
        };
        session::run(chunks, sample_rate, &self.config.endpoint, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use futures_util::{SinkExt, StreamExt};
    use std::io::Cursor;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::protocol::Message;

    /// A mono 16-bit WAV at 16kHz, sized to split into three chunks at the
    /// given chunk size.
    fn wav_fixture(chunk_size: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples = (chunk_size * 3) / 2 - 10; // three chunks, short tail
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..samples {
                writer.write_sample((i % 512) as i16 - 256).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    /// Loopback recognizer accepting any number of connections; replies with
    /// the given fragment messages after the first binary frame of each.
    async fn fragment_server(replies: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                let replies = replies.clone();
                tokio::spawn(async move {
                    let mut ws = accept_async(stream).await.unwrap();
                    let mut sent = false;
                    while let Some(Ok(message)) = ws.next().await {
                        match message {
                            Message::Binary(_) if !sent => {
                                sent = true;
                                for reply in &replies {
                                    ws.send(Message::Text((*reply).into())).await.unwrap();
                                }
                            }
                            Message::Close(_) => break,
                            _ => {}
                        }
                    }
                });
            }
        });
        format!("ws://{}", addr)
    }

    fn recognizer_for(endpoint: String) -> Recognizer {
        Recognizer::new(RecognizerConfig {
            endpoint,
            chunk_size: 2048,
            frame_interval_ms: 5,
            silence_ms: 40,
            deadline_ms: 30_000,
        })
    }

    #[tokio::test]
    async fn test_recognize_end_to_end() {
        let url = fragment_server(vec![r#"{"text":"hel"}"#, r#"{"text":"lo world"}"#]).await;
        let recognizer = recognizer_for(url);

        let transcript = recognizer.recognize(&wav_fixture(2048)).await.unwrap();
        assert_eq!(transcript, "hel lo world");
    }

    #[tokio::test]
    async fn test_recognize_is_idempotent() {
        let url = fragment_server(vec![r#"{"text":"same"}"#, r#"{"result":"again"}"#]).await;
        let recognizer = recognizer_for(url);
        let input = wav_fixture(2048);

        let first = recognizer.recognize(&input).await.unwrap();
        let second = recognizer.recognize(&input).await.unwrap();

        assert_eq!(first, "same again");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_upload_fails_before_connecting() {
        // Endpoint is never dialed: normalization rejects the payload first
        let recognizer = recognizer_for("ws://127.0.0.1:9/unreachable".to_string());

        let result = recognizer.recognize(&[]).await;
        assert!(matches!(result, Err(AppError::UnsupportedFormat(_))));
    }
}
