//! Chat and guideline endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::assistant::ChatGateway;
use crate::assistant::client::ChatMessage;
use crate::assistant::guideline::GuidelineStore;
use crate::auth::session::{SessionKeys, session_from_request};
use crate::server::{denial, require_session};

#[derive(Clone)]
pub struct AssistantState {
    pub gateway: Arc<ChatGateway>,
    pub guidelines: Arc<GuidelineStore>,
    pub keys: Arc<SessionKeys>,
}

pub fn assistant_routes(state: AssistantState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/guideline", get(get_guideline).post(set_guideline))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    context_email_ids: Vec<String>,
}

/// A chat turn. Open to anonymous callers; only authenticated ones get
/// mailbox context injected.
async fn chat(
    State(state): State<AssistantState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<ChatRequest>,
) -> Response {
    let Some(messages) = body.messages else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Messages array is required"})),
        )
            .into_response();
    };

    let session = session_from_request(&state.keys, &headers, &jar);
    match state
        .gateway
        .respond(&messages, &body.context_email_ids, session.is_some())
        .await
    {
        Ok(content) => Json(json!({"role": "assistant", "content": content})).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn get_guideline(
    State(state): State<AssistantState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if let Err(denied) = require_session(&state.keys, &headers, &jar) {
        return denied;
    }
    let content = state.guidelines.current().await;
    Json(json!({ "content": content })).into_response()
}

#[derive(Debug, Deserialize)]
struct GuidelineUpdate {
    #[serde(default)]
    content: String,
}

async fn set_guideline(
    State(state): State<AssistantState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<GuidelineUpdate>,
) -> Response {
    let user = match require_session(&state.keys, &headers, &jar) {
        Ok(user) => user,
        Err(denied) => return denied,
    };
    if !user.role.is_admin() {
        return denial(true);
    }
    if body.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Guideline content is required"})),
        )
            .into_response();
    }

    state.guidelines.replace(body.content).await;
    tracing::info!(user = %user.id, "guideline replaced");
    Json(json!({"success": true})).into_response()
}
