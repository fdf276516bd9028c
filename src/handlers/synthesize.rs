//! # Speech Synthesis Handler
//!
//! `POST /api/synthesize` accepts `{"text": "..."}` and responds with WAV
//! audio bytes produced by the external synthesizer.

use crate::error::AppError;
use crate::state::AppState;
use crate::tts::Synthesizer;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;

/// Synthesis request body.
#[derive(Debug, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

pub async fn synthesize_speech(
    state: web::Data<AppState>,
    payload: web::Json<TextPayload>,
) -> Result<HttpResponse, AppError> {
    let text = payload.into_inner().text;
    if text.trim().is_empty() {
        return Err(AppError::ValidationError("Text must not be empty".to_string()));
    }

    let synthesizer = Synthesizer::new(state.get_config().synthesizer);

    state.increment_active_sessions();
    let result = synthesizer.synthesize(&text).await;
    state.decrement_active_sessions();

    let wav = result?;
    info!(bytes = wav.len(), "synthesis complete");

    Ok(HttpResponse::Ok().content_type("audio/wav").body(wav))
}
