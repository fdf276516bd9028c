//! # Audio Upload Handler
//!
//! `POST /api/upload` accepts a multipart audio file, runs it through the
//! recognition pipeline, queues the transcript for broadcast pickup, and
//! returns `{"text": "..."}`.

use crate::error::AppError;
use crate::state::AppState;
use crate::stt::Recognizer;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde_json::json;
use tracing::info;

/// Uploads larger than this are rejected before any decoding happens.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub async fn upload_audio(
    state: web::Data<AppState>,
    mut payload: actix_multipart::Multipart,
) -> Result<HttpResponse, AppError> {
    // Pull the file field out of the multipart form
    let mut audio_data: Option<Vec<u8>> = None;

    while let Some(item) = payload.next().await {
        let mut field = item
            .map_err(|e| AppError::ValidationError(format!("Multipart error: {}", e)))?;

        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map(|name| name.to_string())
            .ok_or_else(|| AppError::ValidationError("Missing field name".to_string()))?;

        // Older clients send "file"; newer ones send "audio"
        if field_name == "file" || field_name == "audio" {
            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk
                    .map_err(|e| AppError::ValidationError(format!("Chunk error: {}", e)))?;
                if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                    return Err(AppError::ValidationError(format!(
                        "File too large (max: {} bytes)",
                        MAX_UPLOAD_BYTES
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }
            audio_data = Some(bytes);
        }
    }

    let audio_bytes = audio_data
        .ok_or_else(|| AppError::ValidationError("No audio file provided".to_string()))?;

    // Run the pipeline; errors map straight to HTTP statuses (415/502)
    let recognizer = Recognizer::new(state.get_config().recognizer);

    state.increment_active_sessions();
    let result = recognizer.recognize(&audio_bytes).await;
    state.decrement_active_sessions();

    let text = result?;
    info!(chars = text.len(), "recognition complete");

    // Recognized text is also broadcast for polling clients
    state.broadcast.push(json!(text));

    Ok(HttpResponse::Ok().json(json!({ "text": text })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    fn multipart_body(field: &str, payload: &[u8]) -> (String, Vec<u8>) {
        let boundary = "test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"clip.bin\"\r\n\r\n",
                field
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", boundary),
            body,
        )
    }

    #[actix_web::test]
    async fn test_garbage_upload_is_unsupported_media_type() {
        let state = web::Data::new(AppState::new(AppConfig::default()));
        let app = test::init_service(
            App::new()
                .app_data(state)
                .route("/api/upload", web::post().to(upload_audio)),
        )
        .await;

        let (content_type, body) = multipart_body("file", &[0xBA, 0xD0, 0xCA, 0xFE]);
        let req = test::TestRequest::post()
            .uri("/api/upload")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 415);
    }

    #[actix_web::test]
    async fn test_missing_file_field_is_rejected() {
        let state = web::Data::new(AppState::new(AppConfig::default()));
        let app = test::init_service(
            App::new()
                .app_data(state)
                .route("/api/upload", web::post().to(upload_audio)),
        )
        .await;

        let (content_type, body) = multipart_body("unrelated", b"data");
        let req = test::TestRequest::post()
            .uri("/api/upload")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
    }
}
