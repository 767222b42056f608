use axum::{
    extract::{Path, State},
    Extension, Json,
};
use lossless_models::{ListeningTime, PublicUser, UserProfile};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::songs::non_empty;
use crate::auth::middleware::AuthUser;
use crate::auth::routes::{validate_email, UserResponse};
use crate::error::{ApiError, ApiResult};
use lossless_db::entities::{playlist, user};
use lossless_db::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

async fn find_user(state: &AppState, id: Uuid) -> ApiResult<user::Model> {
    user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// Seconds to add, from a body like `{"time_in_seconds": 12.5}`.
/// Anything but a finite, non-negative JSON number is rejected.
fn parse_listening_seconds(body: &Value) -> ApiResult<f64> {
    body.get("time_in_seconds")
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .ok_or_else(|| ApiError::Validation("Invalid time value".into()))
}

/// GET /api/users/{id}: public profile with public playlists
pub async fn get_user_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    let found = find_user(&state, id).await?;

    let playlists = playlist::Entity::find()
        .filter(playlist::Column::OwnerId.eq(id))
        .filter(playlist::Column::IsPublic.eq(true))
        .order_by_desc(playlist::Column::UpdatedAt)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|p| p.into_summary(None))
        .collect();

    Ok(Json(UserProfile {
        user: PublicUser::from(&found),
        playlists,
    }))
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user_id = auth_user.0.sub;
    let existing = find_user(&state, user_id).await?;

    let mut active: user::ActiveModel = existing.into();

    if let Some(email) = body.email {
        let email = email.trim().to_string();
        validate_email(&email)?;
        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(&email))
            .filter(user::Column::Id.ne(user_id))
            .one(&state.db)
            .await?;
        if taken.is_some() {
            return Err(ApiError::Conflict("Email already in use".into()));
        }
        active.email = Set(email);
    }
    if body.display_name.is_some() {
        active.display_name = Set(non_empty(body.display_name));
    }
    active.updated_at = Set(chrono::Utc::now().fixed_offset());

    let updated = active.update(&state.db).await?;
    Ok(Json(updated.into()))
}

/// POST /api/users/listening-time
pub async fn add_listening_time(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> ApiResult<Json<ListeningTime>> {
    let seconds = parse_listening_seconds(&body)?;
    let user_id = auth_user.0.sub;

    let result = user::Entity::update_many()
        .col_expr(
            user::Column::ListeningTime,
            Expr::col(user::Column::ListeningTime).add(seconds),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(ApiError::not_found("User"));
    }

    let total = find_user(&state, user_id).await?.listening_time;
    tracing::debug!(%user_id, added = seconds, total, "listening time recorded");
    Ok(Json(ListeningTime::new(total)))
}

/// GET /api/users/listening-time
pub async fn get_listening_time(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<ListeningTime>> {
    let found = find_user(&state, auth_user.0.sub).await?;
    Ok(Json(ListeningTime::new(found.listening_time)))
}
