use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use lossless_models::{PaginatedResponse, Song, DEFAULT_COVER};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{paginate, PaginationParams};
use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiResult};
use lossless_db::entities::{playlist_song, song};
use lossless_db::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateSongRequest {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<String>,
}

pub(crate) async fn find_song(state: &AppState, id: Uuid) -> ApiResult<song::Model> {
    song::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Song"))
}

/// Load a song and make sure the caller uploaded it.
async fn find_owned_song(state: &AppState, id: Uuid, user_id: Uuid) -> ApiResult<song::Model> {
    let song = find_song(state, id).await?;
    if song.added_by != user_id {
        return Err(ApiError::Forbidden("Not your song".into()));
    }
    Ok(song)
}

/// Best-effort removal of a song's audio file and cover art.
pub(crate) async fn remove_song_files(state: &AppState, song: &song::Model) {
    if let Err(e) = state.storage.delete_file(&song.file_path).await {
        tracing::warn!(song_id = %song.id, path = %song.file_path, "failed to delete audio file: {e}");
    }
    if let Some(cover) = song.cover_art.as_deref().filter(|c| *c != DEFAULT_COVER) {
        if let Err(e) = state.storage.delete_file(&format!("covers/{cover}")).await {
            tracing::warn!(song_id = %song.id, cover, "failed to delete cover art: {e}");
        }
    }
}

/// Non-empty trimmed text, or `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// GET /api/songs
pub async fn list_songs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<Song>>> {
    let select = song::Entity::find().order_by_desc(song::Column::CreatedAt);
    Ok(Json(paginate(&state.db, select, &params, Song::from).await?))
}

/// GET /api/songs/my-uploads
pub async fn my_uploads(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<Song>>> {
    let select = song::Entity::find()
        .filter(song::Column::AddedBy.eq(user.0.sub))
        .order_by_desc(song::Column::CreatedAt);
    Ok(Json(paginate(&state.db, select, &params, Song::from).await?))
}

/// GET /api/songs/{id}
pub async fn get_song(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Song>> {
    Ok(Json(find_song(&state, id).await?.into()))
}

/// PUT /api/songs/{id} (owner only)
pub async fn update_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateSongRequest>,
) -> ApiResult<Json<Song>> {
    let existing = find_owned_song(&state, id, user.0.sub).await?;

    let mut active: song::ActiveModel = existing.into();
    if let Some(title) = body.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::Validation("Title cannot be empty".into()));
        }
        active.title = Set(title);
    }
    if let Some(artist) = body.artist {
        let artist = artist.trim().to_string();
        if artist.is_empty() {
            return Err(ApiError::Validation("Artist cannot be empty".into()));
        }
        active.artist = Set(artist);
    }
    if body.album.is_some() {
        active.album = Set(non_empty(body.album));
    }
    if body.genre.is_some() {
        active.genre = Set(non_empty(body.genre));
    }
    if body.release_date.is_some() {
        active.release_date = Set(non_empty(body.release_date));
    }

    let updated = active.update(&state.db).await?;
    Ok(Json(updated.into()))
}

/// DELETE /api/songs/{id} (owner only): removes the record, every playlist
/// entry pointing at it, and its files.
pub async fn delete_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let existing = find_owned_song(&state, id, user.0.sub).await?;

    let txn = state.db.begin().await?;
    playlist_song::Entity::delete_many()
        .filter(playlist_song::Column::SongId.eq(id))
        .exec(&txn)
        .await?;
    song::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    remove_song_files(&state, &existing).await;

    tracing::info!(song_id = %id, user_id = %user.0.sub, "song deleted");
    Ok(StatusCode::NO_CONTENT)
}
