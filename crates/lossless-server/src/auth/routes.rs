use axum::{extract::State, http::StatusCode, Extension, Json};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::jwt::{generate_token_pair, validate_token, TokenPair, TokenType};
use super::middleware::AuthUser;
use super::password::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use lossless_db::entities::{playlist, playlist_song, song, user};
use lossless_db::AppState;

// ─── Request/Response DTOs ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub listening_time: f64,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            display_name: u.display_name,
            listening_time: u.listening_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

// ─── Validation ────────────────────────────────────────────────────

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 64 {
        return Err(ApiError::Validation(
            "Username must be between 3 and 64 characters".into(),
        ));
    }
    if username.contains(['@', '/', ' ']) {
        return Err(ApiError::Validation(
            "Username cannot contain @, / or spaces".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email.len() <= 254
        && !email.starts_with('@')
        && !email.ends_with('@')
        && email
            .split_once('@')
            .is_some_and(|(_, domain)| domain.contains('.'));
    if !valid {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    Ok(())
}

fn issue_tokens(user: &user::Model, secret: &str) -> ApiResult<TokenPair> {
    generate_token_pair(user.id, &user.username, secret)
        .map_err(|e| ApiError::Internal(format!("token error: {e}")))
}

// ─── Handlers ──────────────────────────────────────────────────────

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    validate_username(&body.username)?;
    if body.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    validate_email(&body.email)?;

    let existing = user::Entity::find()
        .filter(
            user::Column::Username
                .eq(&body.username)
                .or(user::Column::Email.eq(&body.email)),
        )
        .one(&state.db)
        .await?;

    if existing.is_some() {
        return Err(ApiError::Conflict("Username or email already taken".into()));
    }

    let password_hash =
        hash_password(&body.password).map_err(|e| ApiError::Internal(format!("hash error: {e}")))?;

    let now = chrono::Utc::now().fixed_offset();
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(body.username),
        email: Set(body.email),
        password_hash: Set(password_hash),
        display_name: Set(body.display_name),
        listening_time: Set(0.0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    tracing::info!(user_id = %created.id, username = %created.username, "user registered");

    let tokens = issue_tokens(&created, &state.jwt_secret)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: created.into(),
            tokens,
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(&body.username))
        .one(&state.db)
        .await?
        .ok_or_else(invalid)?;

    let valid = verify_password(&body.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(format!("verify error: {e}")))?;
    if !valid {
        return Err(invalid());
    }

    let tokens = issue_tokens(&user, &state.jwt_secret)?;
    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let claims = validate_token(&body.refresh_token, &state.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Invalid token type".into()));
    }

    let user = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()))?;

    Ok(Json(issue_tokens(&user, &state.jwt_secret)?))
}

/// GET /api/auth/me (requires auth)
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    let user = user::Entity::find_by_id(auth_user.0.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(user.into()))
}

/// DELETE /api/auth/account: removes the user, their uploads (records and
/// files) and their playlists. Requires the current password.
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<DeleteAccountRequest>,
) -> ApiResult<StatusCode> {
    let user_id = auth_user.0.sub;

    let found = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let valid = verify_password(&body.password, &found.password_hash)
        .map_err(|e| ApiError::Internal(format!("verify error: {e}")))?;
    if !valid {
        return Err(ApiError::Unauthorized("Incorrect password".into()));
    }

    let uploads = song::Entity::find()
        .filter(song::Column::AddedBy.eq(user_id))
        .all(&state.db)
        .await?;
    let upload_ids: Vec<Uuid> = uploads.iter().map(|s| s.id).collect();

    let playlist_ids: Vec<Uuid> = playlist::Entity::find()
        .filter(playlist::Column::OwnerId.eq(user_id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();

    let txn = state.db.begin().await?;
    playlist_song::Entity::delete_many()
        .filter(
            playlist_song::Column::SongId
                .is_in(upload_ids.clone())
                .or(playlist_song::Column::PlaylistId.is_in(playlist_ids.clone())),
        )
        .exec(&txn)
        .await?;
    playlist::Entity::delete_many()
        .filter(playlist::Column::Id.is_in(playlist_ids))
        .exec(&txn)
        .await?;
    song::Entity::delete_many()
        .filter(song::Column::Id.is_in(upload_ids))
        .exec(&txn)
        .await?;
    user::Entity::delete_by_id(user_id).exec(&txn).await?;
    txn.commit().await?;

    // Files go last: a failed removal leaves an orphan file, never a dangling record
    for upload in &uploads {
        crate::api::songs::remove_song_files(&state, upload).await;
    }

    tracing::info!(%user_id, songs = uploads.len(), "account deleted");
    Ok(StatusCode::NO_CONTENT)
}
