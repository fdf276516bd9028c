//! # Broadcast Pickup Handlers
//!
//! Two ways to consume the broadcast queue:
//! - `GET /api/messages` — return everything accumulated so far and clear
//!   the queue (polling clients)
//! - `GET /api/events` — a Server-Sent Events stream that emits queued
//!   entries as they appear (push clients)

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

/// How often the SSE stream polls the queue for new entries.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Return and clear the accumulated broadcast messages.
pub async fn get_messages(state: web::Data<AppState>) -> HttpResponse {
    let messages = state.broadcast.drain();
    HttpResponse::Ok().json(json!({ "messages": messages }))
}

/// Stream broadcast messages as Server-Sent Events.
///
/// Each queue entry becomes one `data:` line. The stream runs until the
/// client disconnects; actix drops the stream (and its interval) with the
/// connection.
pub async fn events(state: web::Data<AppState>) -> HttpResponse {
    let queue = state.broadcast.clone();

    let stream = IntervalStream::new(tokio::time::interval(EVENT_POLL_INTERVAL))
        .filter_map(move |_| queue.pop())
        .map(|message| {
            Ok::<_, actix_web::Error>(web::Bytes::from(format!("data: {}\n\n", message)))
        });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}
