//! HTTP composition: the full route surface plus the session gate helpers
//! shared by the route modules.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::assistant::{AssistantState, ChatGateway, GuidelineStore, assistant_routes};
use crate::auth::session::{SessionKeys, SessionUser, session_from_request};
use crate::auth::{AccountDirectory, AuthState, auth_routes};
use crate::config::ImapConfig;
use crate::mail::{MailRouteState, MailService, mail_routes};
use crate::permissions::can_perform_action;

/// Everything the HTTP layer needs, built once at startup.
pub struct AppContext {
    pub mail: Arc<MailService>,
    pub gateway: Arc<ChatGateway>,
    pub guidelines: Arc<GuidelineStore>,
    pub accounts: Arc<AccountDirectory>,
    pub keys: Arc<SessionKeys>,
    pub imap: ImapConfig,
}

pub fn router(context: AppContext) -> Router {
    Router::new()
        .merge(mail_routes(MailRouteState {
            mail: Arc::clone(&context.mail),
            keys: Arc::clone(&context.keys),
            imap: context.imap.clone(),
        }))
        .merge(assistant_routes(AssistantState {
            gateway: Arc::clone(&context.gateway),
            guidelines: Arc::clone(&context.guidelines),
            keys: Arc::clone(&context.keys),
        }))
        .merge(auth_routes(AuthState {
            accounts: Arc::clone(&context.accounts),
            keys: Arc::clone(&context.keys),
        }))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "service": "maildeck"}))
}

/// Resolve the caller's session and check `action` against the permission
/// table. `Ok` carries the session (if any) for handlers that need the
/// caller's identity.
pub(crate) fn authorize(
    keys: &SessionKeys,
    headers: &HeaderMap,
    jar: &CookieJar,
    action: &str,
) -> Result<Option<SessionUser>, Response> {
    let session = session_from_request(keys, headers, jar);
    if can_perform_action(session.as_ref().map(|u| u.role), action) {
        return Ok(session);
    }
    Err(denial(session.is_some()))
}

/// Any authenticated session, whatever the role.
pub(crate) fn require_session(
    keys: &SessionKeys,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<SessionUser, Response> {
    session_from_request(keys, headers, jar).ok_or_else(|| denial(false))
}

/// 401 for missing sessions, 403 when a session exists but the role does
/// not reach the action.
pub(crate) fn denial(authenticated: bool) -> Response {
    if authenticated {
        (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Unauthorized. Admin access required."})),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        )
            .into_response()
    }
}
