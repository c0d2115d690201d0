//! Account routes
//!
//! Endpoints:
//! - POST /auth/create - Create an account and log in
//! - POST /auth/login - Exchange name and password for a bearer token
//! - POST /auth/logout - End the caller's session

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_account))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// POST /auth/create
async fn create_account(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let user = state.gate().register(&credentials.name, &credentials.password).await?;
    let token = state.sessions().issue(user.id);

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            name: user.name,
        }),
    ))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SessionResponse>> {
    let user = state.gate().verify(&credentials.name, &credentials.password).await?;
    let token = state.sessions().issue(user.id);

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(SessionResponse {
        token,
        name: user.name,
    }))
}

/// POST /auth/logout
async fn logout(State(state): State<AppState>, user: AuthUser) -> StatusCode {
    state.sessions().revoke(&user.token);
    tracing::info!(user_id = user.id, "User logged out");
    StatusCode::NO_CONTENT
}
