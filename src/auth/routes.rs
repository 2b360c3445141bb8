//! Login and logout endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::info;

use crate::auth::accounts::AccountDirectory;
use crate::auth::session::{SESSION_COOKIE, SessionKeys};
use crate::error::AuthError;

#[derive(Clone)]
pub struct AuthState {
    pub accounts: Arc<AccountDirectory>,
    pub keys: Arc<SessionKeys>,
}

pub fn auth_routes(state: AuthState) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> impl IntoResponse {
    let Some(user) = state.accounts.authenticate(&body.email, &body.password) else {
        info!(email = %body.email, "rejected login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": AuthError::InvalidCredentials.to_string()})),
        )
            .into_response();
    };

    let token = match state.keys.issue(&user) {
        Ok(token) => token,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    info!(user = %user.id, role = ?user.role, "login");
    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (
        jar.add(cookie),
        Json(serde_json::json!({"success": true, "token": token, "user": user})),
    )
        .into_response()
}

async fn logout(jar: CookieJar) -> impl IntoResponse {
    let mut removal = Cookie::from(SESSION_COOKIE);
    removal.set_path("/");
    (
        jar.remove(removal),
        Json(serde_json::json!({"success": true})),
    )
}
