//! Mailbox endpoints.
//!
//! Every handler resolves the caller's session, checks the action against
//! the permission table, and answers with the usual `{"error": ...}` /
//! `{"success": true, ...}` envelopes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::auth::session::SessionKeys;
use crate::config::ImapConfig;
use crate::error::MailError;
use crate::mail::message::OutgoingMail;
use crate::mail::service::MailService;
use crate::server::{authorize, require_session};

#[derive(Clone)]
pub struct MailRouteState {
    pub mail: Arc<MailService>,
    pub keys: Arc<SessionKeys>,
    pub imap: ImapConfig,
}

pub fn mail_routes(state: MailRouteState) -> Router {
    Router::new()
        .route("/api/emails", get(list_emails).delete(delete_many))
        .route("/api/emails/fetch", post(trigger_fetch).get(fetch_status))
        .route("/api/emails/send", post(send_email))
        .route("/api/emails/{id}", get(get_email).delete(delete_one))
        .route("/api/emails/{id}/star", post(set_star))
        .route("/api/emails/{id}/read", post(set_read))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    mailbox: Option<String>,
    limit: Option<usize>,
}

async fn list_emails(
    State(state): State<MailRouteState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Err(denied) = authorize(&state.keys, &headers, &jar, "view_inbox") {
        return denied;
    }
    let emails = state
        .mail
        .fetch_messages(query.mailbox.as_deref(), query.limit)
        .await;
    Json(json!({ "emails": emails })).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkDeleteRequest {
    #[serde(default)]
    email_ids: Vec<String>,
}

async fn delete_many(
    State(state): State<MailRouteState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<BulkDeleteRequest>,
) -> Response {
    if let Err(denied) = authorize(&state.keys, &headers, &jar, "delete_email") {
        return denied;
    }
    if body.email_ids.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "No email IDs provided"})),
        )
            .into_response();
    }

    let total = body.email_ids.len();
    let summary = state.mail.delete_messages(&body.email_ids).await;
    let mut response = json!({
        "success": summary.failed == 0,
        "deleted": summary.deleted,
        "failed": summary.failed,
        "message": format!("Deleted {} of {total} emails", summary.deleted),
    });
    if !summary.errors.is_empty() {
        response["errors"] = json!(summary.errors);
    }
    Json(response).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct FetchRequest {
    limit: Option<usize>,
}

/// Force a mailbox round-trip (unless the cache is still warm). Open to
/// unauthenticated callers; the page itself is not returned.
async fn trigger_fetch(
    State(state): State<MailRouteState>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Option<Json<FetchRequest>>,
) -> Response {
    if let Err(denied) = authorize(&state.keys, &headers, &jar, "fetch_email") {
        return denied;
    }
    let limit = body.and_then(|Json(b)| b.limit);
    let emails = state.mail.fetch_messages(None, limit).await;
    Json(json!({
        "success": true,
        "fetched": emails.len(),
        "message": format!("Fetched {} emails", emails.len()),
    }))
    .into_response()
}

/// Transport configuration as seen by the dashboard, credentials masked.
async fn fetch_status(
    State(state): State<MailRouteState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if let Err(denied) = require_session(&state.keys, &headers, &jar) {
        return denied;
    }
    let imap = &state.imap;
    Json(json!({
        "configured": imap.is_configured(),
        "host": imap.host,
        "port": imap.port,
        "mailbox": imap.mailbox,
        "username": mask_credential(&imap.username),
        "fetchLimit": imap.fetch_limit,
        "markAsSeen": imap.mark_as_seen,
    }))
    .into_response()
}

async fn send_email(
    State(state): State<MailRouteState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<OutgoingMail>,
) -> Response {
    let user = match authorize(&state.keys, &headers, &jar, "send_email") {
        Ok(user) => user,
        Err(denied) => return denied,
    };
    let sender_id = user.map(|u| u.id).unwrap_or_default();

    match state.mail.send_message(&body, &sender_id).await {
        Ok(email) => Json(json!({
            "success": true,
            "emailId": email.id,
            "messageId": email.message_id,
            "message": "Email sent successfully",
        }))
        .into_response(),
        Err(e) if e.is_validation() => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn get_email(
    State(state): State<MailRouteState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    if let Err(denied) = authorize(&state.keys, &headers, &jar, "view_email_detail") {
        return denied;
    }
    match state.mail.get_message(&id).await {
        Some(email) => Json(json!({ "email": email })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Email not found"})),
        )
            .into_response(),
    }
}

async fn delete_one(
    State(state): State<MailRouteState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    if let Err(denied) = authorize(&state.keys, &headers, &jar, "delete_email") {
        return denied;
    }
    match state.mail.delete_message(&id).await {
        Ok(()) => Json(json!({"success": true, "message": "Email deleted"})).into_response(),
        Err(e) => mail_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct StarRequest {
    #[serde(default)]
    starred: bool,
}

async fn set_star(
    State(state): State<MailRouteState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(body): Json<StarRequest>,
) -> Response {
    if let Err(denied) = require_session(&state.keys, &headers, &jar) {
        return denied;
    }
    match state.mail.set_starred(&id, body.starred).await {
        Ok(()) => Json(json!({"success": true})).into_response(),
        Err(e) => mail_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct ReadRequest {
    #[serde(default)]
    read: bool,
}

async fn set_read(
    State(state): State<MailRouteState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(body): Json<ReadRequest>,
) -> Response {
    if let Err(denied) = require_session(&state.keys, &headers, &jar) {
        return denied;
    }
    match state.mail.set_read(&id, body.read).await {
        Ok(()) => Json(json!({"success": true})).into_response(),
        Err(e) => mail_error_response(e),
    }
}

fn mail_error_response(e: MailError) -> Response {
    match e {
        MailError::NotFound { .. } => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Email not found"})),
        )
            .into_response(),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": other.to_string()})),
        )
            .into_response(),
    }
}

fn mask_credential(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let visible: String = value.chars().take(2).collect();
    format!("{visible}***")
}
