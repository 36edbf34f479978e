//! Presence query handlers.

use axum::Json;
use axum::extract::{Path, State};

use courier_core::error::AppError;
use courier_core::types::id::{MAX_USER_ID_LEN, UserId, validate_user_id};

use crate::dto::response::{ApiResponse, OnlineUsersResponse, PresenceResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/presence/online
pub async fn online_users(State(state): State<AppState>) -> Json<ApiResponse<OnlineUsersResponse>> {
    let users = state.realtime.presence.online_users();
    Json(ApiResponse::ok(OnlineUsersResponse {
        count: users.len(),
        users,
    }))
}

/// GET /api/presence/{user_id}
pub async fn user_presence(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<PresenceResponse>>, ApiError> {
    if validate_user_id(&user_id).is_err() {
        return Err(AppError::validation(format!(
            "user_id must be 1-{MAX_USER_ID_LEN} bytes"
        ))
        .into());
    }

    let user_id = UserId::from(user_id);
    let online = state.realtime.presence.is_online(&user_id);

    Ok(Json(ApiResponse::ok(PresenceResponse { user_id, online })))
}
