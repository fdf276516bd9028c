//! # Streaming Recognition Session
//!
//! Owns a single WebSocket connection to the remote recognizer for the
//! lifetime of one request: transmits framed PCM chunks at a fixed cadence,
//! concurrently collects recognized text fragments, appends trailing silence
//! to flush the recognizer, and assembles the final transcript.
//!
//! ## State machine:
//! `Connecting → Streaming → Draining → Closed`
//!
//! ## Concurrency model:
//! Two tasks share the connection, one per direction. The send side paces
//! frames in the caller's task; the receive side runs as a spawned task that
//! owns the fragment list outright and returns it when the stream ends, so
//! the list has a single writer and a single reader by construction — no
//! lock needed. Both sides are joined before the transcript is assembled,
//! so no fragment is lost to a shutdown race.

use crate::audio::chunk::Chunk;
use crate::error::{AppError, AppResult};
use crate::stt::frame::frame;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long to wait for the receive task to drain buffered messages after
/// the connection has been closed.
const RECV_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Pacing and lifetime options for one streaming session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Duration of synthetic trailing silence, in milliseconds
    pub silence_ms: u64,

    /// Pause between transmitted frames, in milliseconds
    pub frame_interval_ms: u64,

    /// Upper bound on the whole session; on expiry the connection is
    /// force-closed and the partial transcript is returned as a normal result
    pub deadline_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            silence_ms: 1000,
            frame_interval_ms: 20,
            deadline_ms: 30_000,
        }
    }
}

type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Stream one utterance to the recognizer and return its transcript.
///
/// ## Behavior:
/// - Every chunk is framed and sent in order, with `frame_interval_ms` of
///   pacing between frames to emulate real-time audio delivery.
/// - After the real chunks, `ceil(silence_ms / frame_interval_ms)` zero-filled
///   frames the size of the first chunk signal the end of the utterance.
/// - Inbound text fragments are collected concurrently for the whole
///   connection lifetime and joined with single spaces, in arrival order.
///
/// ## Errors:
/// - `ConnectionError` if the WebSocket handshake does not complete
/// - `TransmissionError` if a send fails mid-stream; partial fragments are
///   discarded since a half-sent utterance cannot produce a coherent
///   transcript. No retry, no reconnection.
pub async fn run(
    chunks: Vec<Chunk>,
    sample_rate: u32,
    endpoint: &str,
    options: &SessionOptions,
) -> AppResult<String> {
    let session_id = Uuid::new_v4();
    info!(%session_id, endpoint, chunks = chunks.len(), sample_rate, "opening recognition session");

    // Connecting
    let (ws, _) = connect_async(endpoint)
        .await
        .map_err(|e| AppError::ConnectionError(format!("handshake with {} failed: {}", endpoint, e)))?;
    let (mut sink, stream) = ws.split();

    // The receive task runs from the moment the connection opens until it
    // closes, so fragments arriving while we are still sending are kept.
    let mut recv_task = tokio::spawn(collect_fragments(stream, session_id));

    // Streaming + Draining, bounded by the session deadline
    let interval = Duration::from_millis(options.frame_interval_ms);
    let silence_frames = options.silence_ms.div_ceil(options.frame_interval_ms);
    let silence_payload: Chunk = chunks.first().map(|c| vec![0u8; c.len()]).unwrap_or_default();

    let send_result = tokio::time::timeout(Duration::from_millis(options.deadline_ms), async {
        for (index, chunk) in chunks.iter().enumerate() {
            let message = frame(chunk, sample_rate)?;
            sink.send(Message::Binary(message)).await.map_err(|e| {
                AppError::TransmissionError(format!("send failed on chunk {}: {}", index, e))
            })?;
            sleep(interval).await;
        }

        debug!(%session_id, frames = silence_frames, "draining with trailing silence");
        for _ in 0..silence_frames {
            let message = frame(&silence_payload, sample_rate)?;
            sink.send(Message::Binary(message)).await.map_err(|e| {
                AppError::TransmissionError(format!("send failed during silence drain: {}", e))
            })?;
            sleep(interval).await;
        }

        Ok::<(), AppError>(())
    })
    .await;

    // Closed: initiate shutdown, then wait for the receive side to finish
    // draining already-buffered inbound messages.
    let _ = sink.close().await;

    let fragments = match tokio::time::timeout(RECV_DRAIN_GRACE, &mut recv_task).await {
        Ok(Ok(fragments)) => fragments,
        Ok(Err(e)) => {
            warn!(%session_id, error = %e, "receive task failed");
            Vec::new()
        }
        Err(_) => {
            warn!(%session_id, "receive task did not drain in time, aborting it");
            recv_task.abort();
            Vec::new()
        }
    };

    match send_result {
        Ok(Ok(())) => {
            let transcript = join_fragments(&fragments);
            info!(%session_id, fragments = fragments.len(), "session complete");
            Ok(transcript)
        }
        Ok(Err(e)) => {
            // A half-sent utterance cannot be trusted; drop what we collected.
            warn!(%session_id, error = %e, "aborting session, discarding partial transcript");
            Err(e)
        }
        Err(_elapsed) => {
            // Deadline expiry is a normal completion with whatever arrived.
            warn!(%session_id, deadline_ms = options.deadline_ms, "session deadline reached, returning partial transcript");
            Ok(join_fragments(&fragments))
        }
    }
}

/// Consume every inbound message until the connection ends, collecting text
/// fragments in arrival order.
///
/// The peer closing the connection is the normal end-of-stream signal, not a
/// failure. Malformed messages are dropped without ending the session.
async fn collect_fragments(mut stream: WsStream, session_id: Uuid) -> Vec<String> {
    let mut fragments = Vec::new();

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(fragment) = extract_fragment(&text) {
                    debug!(%session_id, fragment = %fragment, "received transcript fragment");
                    fragments.push(fragment);
                }
            }
            Ok(Message::Close(_)) => {
                debug!(%session_id, "recognizer closed the connection");
                break;
            }
            // Binary/ping/pong frames carry no text; ignore them
            Ok(_) => {}
            Err(e) => {
                // Peer teardown surfaces here; treat it as end-of-stream
                debug!(%session_id, error = %e, "receive ended");
                break;
            }
        }
    }

    fragments
}

/// Extract the recognized text from an inbound message.
///
/// Backends disagree on the field name, so both `"text"` and `"result"` are
/// accepted; empty strings and any other shape yield nothing.
fn extract_fragment(message: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(message).ok()?;
    ["text", "result"]
        .iter()
        .find_map(|key| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
        })
        .map(|s| s.to_string())
}

/// Space-join fragments in arrival order and trim the result.
fn join_fragments(fragments: &[String]) -> String {
    fragments.join(" ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::accept_async;

    /// Spin up a loopback recognizer that runs `handler` on the first
    /// connection; returns its ws:// URL.
    async fn loopback_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            handler(ws).await;
        });
        format!("ws://{}", addr)
    }

    fn options(silence_ms: u64, frame_interval_ms: u64) -> SessionOptions {
        SessionOptions {
            silence_ms,
            frame_interval_ms,
            deadline_ms: 30_000,
        }
    }

    #[tokio::test]
    async fn test_transmits_exactly_n_plus_silence_frames() {
        let (count_tx, count_rx) = oneshot::channel();
        let url = loopback_server(|mut ws| async move {
            let mut binary_frames = 0u64;
            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Binary(_) => binary_frames += 1,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            let _ = count_tx.send(binary_frames);
        })
        .await;

        // 3 chunks, silence 1000ms at 20ms pacing → 3 + 50 frames
        let chunks = vec![vec![1u8; 64], vec![2u8; 64], vec![3u8; 64]];
        let transcript = run(chunks, 16_000, &url, &options(1000, 20)).await.unwrap();

        assert_eq!(transcript, "");
        assert_eq!(count_rx.await.unwrap(), 53);
    }

    #[tokio::test]
    async fn test_fragments_join_in_arrival_order() {
        let url = loopback_server(|mut ws| async move {
            // First fragment under "text", second under the alternate
            // "result" name, plus noise that must be ignored
            let mut received = 0;
            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Binary(_) => {
                        received += 1;
                        if received == 1 {
                            ws.send(Message::Text(r#"{"text":"hel"}"#.into())).await.unwrap();
                        } else if received == 2 {
                            ws.send(Message::Text("not json at all".into())).await.unwrap();
                            ws.send(Message::Text(r#"{"volume":0.7}"#.into())).await.unwrap();
                            ws.send(Message::Text(r#"{"result":"lo world"}"#.into())).await.unwrap();
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        })
        .await;

        let chunks = vec![vec![0u8; 32], vec![0u8; 32], vec![0u8; 32]];
        let transcript = run(chunks, 16_000, &url, &options(100, 20)).await.unwrap();

        assert_eq!(transcript, "hel lo world");
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        // Bind then drop a listener to get a port nothing is listening on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = run(vec![vec![0u8; 16]], 16_000, &format!("ws://{}", addr), &options(100, 20)).await;

        assert!(matches!(result, Err(AppError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_mid_stream_drop_discards_partials() {
        let url = loopback_server(|mut ws| async move {
            // Offer a fragment, then tear the connection down after two frames
            let mut received = 0;
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Binary(_) = message {
                    received += 1;
                    if received == 1 {
                        ws.send(Message::Text(r#"{"text":"partial"}"#.into())).await.unwrap();
                    }
                    if received == 2 {
                        break; // drop without a close handshake
                    }
                }
            }
        })
        .await;

        let chunks = vec![vec![0u8; 16 * 1024]; 5];
        let result = run(chunks, 16_000, &url, &options(1000, 20)).await;

        // The session aborts; the "partial" fragment is not surfaced anywhere
        assert!(matches!(result, Err(AppError::TransmissionError(_))));
    }

    #[tokio::test]
    async fn test_deadline_returns_partial_transcript() {
        let url = loopback_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"text":"early"}"#.into())).await.unwrap();
            // Keep reading so the client never hits a send error
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Close(_) = message {
                    break;
                }
            }
        })
        .await;

        let mut opts = options(10_000, 20);
        opts.deadline_ms = 150;
        let chunks = vec![vec![0u8; 32]; 500];
        let transcript = run(chunks, 16_000, &url, &opts).await.unwrap();

        assert_eq!(transcript, "early");
    }

    #[tokio::test]
    async fn test_no_chunks_sends_empty_silence_frames() {
        let (meta_tx, meta_rx) = oneshot::channel();
        let url = loopback_server(|mut ws| async move {
            let mut first_frame = None;
            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Binary(bytes) => {
                        if first_frame.is_none() {
                            first_frame = Some(bytes);
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            let _ = meta_tx.send(first_frame);
        })
        .await;

        let transcript = run(Vec::new(), 16_000, &url, &options(60, 20)).await.unwrap();
        assert_eq!(transcript, "");

        // With no real chunks the silence payload is empty: the frame is
        // just the prefix plus the metadata record
        let frame_bytes = meta_rx.await.unwrap().expect("no silence frame seen");
        let meta_len = u32::from_le_bytes(frame_bytes[0..4].try_into().unwrap()) as usize;
        assert_eq!(frame_bytes.len(), 4 + meta_len);
        let meta: serde_json::Value = serde_json::from_slice(&frame_bytes[4..]).unwrap();
        assert_eq!(meta["chunkLength"], 0);
        assert_eq!(meta["sampleRate"], 16_000);
    }

    #[test]
    fn test_extract_fragment_field_names() {
        assert_eq!(extract_fragment(r#"{"text":"a"}"#), Some("a".to_string()));
        assert_eq!(extract_fragment(r#"{"result":"b"}"#), Some("b".to_string()));
        // "text" wins when both are present and non-empty
        assert_eq!(extract_fragment(r#"{"text":"a","result":"b"}"#), Some("a".to_string()));
        // Empty text falls through to the alternate name
        assert_eq!(extract_fragment(r#"{"text":"","result":"b"}"#), Some("b".to_string()));
        assert_eq!(extract_fragment(r#"{"other":1}"#), None);
        assert_eq!(extract_fragment("not json"), None);
    }

    #[test]
    fn test_join_fragments_trims() {
        let fragments = vec![" hello".to_string(), "world ".to_string()];
        assert_eq!(join_fragments(&fragments), "hello world");
        assert_eq!(join_fragments(&[]), "");
    }
}
