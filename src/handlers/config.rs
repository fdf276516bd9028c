use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "recognizer": {
                "endpoint": config.recognizer.endpoint,
                "chunk_size": config.recognizer.chunk_size,
                "frame_interval_ms": config.recognizer.frame_interval_ms,
                "silence_ms": config.recognizer.silence_ms,
                "deadline_ms": config.recognizer.deadline_ms
            },
            "synthesizer": {
                "endpoint": config.synthesizer.endpoint,
                "read_timeout_ms": config.synthesizer.read_timeout_ms,
                "output_sample_rate": config.synthesizer.output_sample_rate
            },
            "broadcast": {
                "capacity": config.broadcast.capacity
            }
        }
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config.update_from_json(&json_str)?;

    state.update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": {
            "server": {
                "host": current_config.server.host,
                "port": current_config.server.port
            },
            "recognizer": {
                "endpoint": current_config.recognizer.endpoint,
                "chunk_size": current_config.recognizer.chunk_size,
                "frame_interval_ms": current_config.recognizer.frame_interval_ms,
                "silence_ms": current_config.recognizer.silence_ms,
                "deadline_ms": current_config.recognizer.deadline_ms
            },
            "synthesizer": {
                "endpoint": current_config.synthesizer.endpoint,
                "read_timeout_ms": current_config.synthesizer.read_timeout_ms,
                "output_sample_rate": current_config.synthesizer.output_sample_rate
            }
        }
    })))
}
