use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_derive::Serialize;
use tracing::{debug, error, info, warn};

use registration_common::handler::{HandleError, HandleOutcome};
use registration_common::message::Message;

use super::app::AppState;

const SECRET_HEADER: &str = "x-hook-secret";
const TEST_HEADER: &str = "x-test";

#[derive(Serialize, Debug, Default)]
pub struct HookResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    subscription_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Returned instead of storing anything when the form plugin sends a test delivery.
#[derive(Serialize, Debug)]
pub struct TestResponse {
    message: String,
    data: HashMap<String, String>,
}

pub async fn post_hook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, (StatusCode, Json<HookResponse>)> {
    let secret = headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if secret != &*state.webhook_secret {
        warn!("rejecting hook with invalid secret");
        return Err(error_response(StatusCode::FORBIDDEN, "invalid secret"));
    }

    debug!(body = %String::from_utf8_lossy(&body), "request body read");

    let message: Message = serde_json::from_slice(&body).map_err(|e| {
        error!("cannot parse body: {}", e);
        error_response(StatusCode::BAD_REQUEST, &e.to_string())
    })?;

    if is_test_delivery(&headers) {
        info!(title = %message.title, "received test message");
        return Ok(Json(TestResponse {
            message: format!("Received submission for form {}", message.title),
            data: message.data,
        })
        .into_response());
    }

    match state.handler.handle(&message).await {
        Ok(HandleOutcome::Stored(stored)) => Ok(Json(HookResponse {
            subscription_id: Some(stored.subscription_id.to_string()),
            error: None,
        })
        .into_response()),
        Ok(HandleOutcome::Ignored) => Ok(Json(HookResponse::default()).into_response()),
        Err(e @ HandleError::Parse(_)) => Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            &e.to_string(),
        )),
        Err(e @ HandleError::Store(_)) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &e.to_string(),
        )),
    }
}

fn is_test_delivery(headers: &HeaderMap) -> bool {
    headers
        .get(TEST_HEADER)
        .is_some_and(|value| !value.is_empty())
}

fn error_response(status: StatusCode, msg: &str) -> (StatusCode, Json<HookResponse>) {
    (
        status,
        Json(HookResponse {
            subscription_id: None,
            error: Some(msg.to_owned()),
        }),
    )
}
