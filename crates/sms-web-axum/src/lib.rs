use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use sms_core::{SmsService, WebResponse};
use sms_web_generic::{MessageProcessor, ResponseConverter};

#[derive(Clone)]
pub struct AppState {
    pub processor: MessageProcessor,
}

impl AppState {
    pub fn new(service: Arc<dyn SmsService>) -> Self {
        Self {
            processor: MessageProcessor::new(service),
        }
    }
}

/// Axum-specific response converter
pub struct AxumResponseConverter;

impl ResponseConverter for AxumResponseConverter {
    type ResponseType = axum::response::Response;

    fn from_web_response(response: WebResponse) -> Self::ResponseType {
        let status = StatusCode::from_u16(response.status.as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (
            status,
            [(header::CONTENT_TYPE, response.content_type)],
            response.body,
        )
            .into_response()
    }
}

/// POST /messages
pub async fn post_message(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let response = state.processor.process_message(&body).await;
    AxumResponseConverter::from_web_response(response)
}

/// GET /balance
pub async fn get_balance(State(state): State<AppState>) -> impl IntoResponse {
    let response = state.processor.process_balance().await;
    AxumResponseConverter::from_web_response(response)
}

/// Router with every proxy endpoint mounted.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages", post(post_message))
        .route("/balance", get(get_balance))
        .with_state(state)
}
