use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};

use hanok_shared::errors::AppResult;
use hanok_shared::types::api::ApiResponse;
use hanok_shared::types::auth::AuthUser;
use hanok_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::Notification;
use crate::AppState;

/// GET /notifications
/// List notifications for the authenticated user with pagination.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Notification>>>> {
    let page = state.notifications.find_all(auth_user.id, &params).await?;
    Ok(Json(ApiResponse::ok(page)))
}

#[derive(Debug, serde::Deserialize)]
pub struct UnreadQuery {
    pub since: Option<DateTime<Utc>>,
}

/// GET /notifications/unread
/// Unread notifications for the authenticated user, optionally only those
/// created after `since`.
pub async fn list_unread(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(query): Query<UnreadQuery>,
) -> AppResult<Json<ApiResponse<Vec<Notification>>>> {
    let items = state.notifications.find_unread(auth_user.id, query.since).await?;
    Ok(Json(ApiResponse::ok(items)))
}

/// POST /notifications/:id/read
/// Mark a single notification as read. 204 on success.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.notifications.mark_as_read(id, auth_user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, serde::Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// POST /notifications/read-all
/// Mark all unread notifications as read for the authenticated user.
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<MarkAllReadResponse>>> {
    let updated = state.notifications.mark_all_as_read(auth_user.id).await?;
    Ok(Json(ApiResponse::ok(MarkAllReadResponse { updated })))
}
