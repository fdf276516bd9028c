//! # Message Command Handler
//!
//! `POST /api/message` accepts a JSON command envelope and routes it by its
//! `path` field. Only `/message` is serviced here — it enqueues the payload
//! for broadcast pickup. `/auth` and `/admin` are recognized but rejected,
//! everything else is an unresolved message type.

use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Command envelope sent by clients.
#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    pub path: String,
    pub data: serde_json::Value,
}

pub async fn post_message(
    state: web::Data<AppState>,
    payload: web::Json<MessagePayload>,
) -> Result<HttpResponse, AppError> {
    let MessagePayload { path, data } = payload.into_inner();

    match path.as_str() {
        "/auth" => Err(AppError::BadRequest("UnresolvedMessageTypes".to_string())),
        "/admin" => Err(AppError::Forbidden("Forbidden".to_string())),
        "/message" => {
            debug!("queueing broadcast message");
            state.broadcast.push(data.clone());
            Ok(HttpResponse::Ok().json(json!({
                "status": "ok",
                "echo": data
            })))
        }
        _ => Err(AppError::BadRequest("UnresolvedMessageTypes".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    fn test_state() -> web::Data<AppState> {
        web::Data::new(AppState::new(AppConfig::default()))
    }

    #[actix_web::test]
    async fn test_message_path_is_echoed_and_queued() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/api/message", web::post().to(post_message)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/message")
            .set_json(json!({"path": "/message", "data": {"hello": "world"}}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["echo"]["hello"], "world");
        assert_eq!(state.broadcast.drain(), vec![json!({"hello": "world"})]);
    }

    #[actix_web::test]
    async fn test_auth_and_unknown_paths_are_bad_requests() {
        let app = test::init_service(
            App::new()
                .app_data(test_state())
                .route("/api/message", web::post().to(post_message)),
        )
        .await;

        for path in ["/auth", "/nonsense"] {
            let req = test::TestRequest::post()
                .uri("/api/message")
                .set_json(json!({"path": path, "data": {}}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 400, "path {} should be rejected", path);
        }
    }

    #[actix_web::test]
    async fn test_admin_path_is_forbidden() {
        let app = test::init_service(
            App::new()
                .app_data(test_state())
                .route("/api/message", web::post().to(post_message)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/message")
            .set_json(json!({"path": "/admin", "data": {}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }
}
