pub mod service;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::shared::error::ApiError;
use crate::shared::models::{ApiResponse, UserView};
use crate::shared::state::AppState;
use crate::shared::utils::blocking;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

pub fn configure() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/users/:id", get(get_user))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>), ApiError> {
    let user = blocking(&state.conn, move |conn| {
        service::create_user(conn, &request)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(user, "user created")),
    ))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let user = blocking(&state.conn, move |conn| service::find_user(conn, id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", id)))?;

    Ok(Json(ApiResponse::ok(user, "user found")))
}
