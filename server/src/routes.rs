//! Request handlers.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{info, warn};

use neuroscan::NeuroscanError;

use crate::state::AppState;

#[derive(Serialize)]
pub struct PredictionResponse {
    pub result: String,
    pub confidence: f32,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Accept one uploaded image and return its predicted label.
///
/// Expects a multipart form with an `image` field. Undecodable or missing
/// image data yields 400; anything unexpected on the model side yields
/// 500. Internal errors never propagate as panics.
pub async fn upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut image_bytes: Option<Vec<u8>> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("image") {
                    match field.bytes().await {
                        Ok(bytes) => image_bytes = Some(bytes.to_vec()),
                        Err(e) => {
                            return client_error(format!("failed to read upload: {}", e));
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => return client_error(format!("malformed multipart body: {}", e)),
        }
    }

    let Some(bytes) = image_bytes else {
        return client_error("missing 'image' field".to_string());
    };

    match state.predictor.predict_bytes(&bytes) {
        Ok(prediction) => {
            info!(
                "Predicted '{}' ({:.1}%)",
                prediction.label,
                prediction.confidence * 100.0
            );
            (
                StatusCode::OK,
                Json(PredictionResponse {
                    result: prediction.label,
                    confidence: prediction.confidence,
                }),
            )
                .into_response()
        }
        Err(NeuroscanError::Image(_, reason)) => {
            client_error(format!("could not decode image: {}", reason))
        }
        Err(e) => {
            warn!("Prediction failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "prediction failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn client_error(message: String) -> Response {
    warn!("Rejected upload: {}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message }),
    )
        .into_response()
}
