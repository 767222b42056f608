use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use lossless_models::{PaginatedResponse, Playlist, PlaylistDetail, PlaylistEntry, Song};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::songs::non_empty;
use super::{paginate, PaginationParams};
use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiResult};
use lossless_db::entities::{playlist, playlist_song, song};
use lossless_db::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddSongRequest {
    pub song_id: Uuid,
}

fn validate_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() || name.len() > 255 {
        return Err(ApiError::Validation(
            "Playlist name must be between 1 and 255 characters".into(),
        ));
    }
    Ok(name.to_string())
}

async fn find_playlist(state: &AppState, id: Uuid) -> ApiResult<playlist::Model> {
    playlist::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist"))
}

/// Load a playlist and make sure the caller owns it.
async fn find_owned_playlist(
    state: &AppState,
    id: Uuid,
    user_id: Uuid,
) -> ApiResult<playlist::Model> {
    let existing = find_playlist(state, id).await?;
    if existing.owner_id != user_id {
        return Err(ApiError::Forbidden("Not your playlist".into()));
    }
    Ok(existing)
}

async fn song_count(state: &AppState, playlist_id: Uuid) -> ApiResult<u64> {
    Ok(playlist_song::Entity::find()
        .filter(playlist_song::Column::PlaylistId.eq(playlist_id))
        .count(&state.db)
        .await?)
}

/// Entry counts for a page of playlists in one grouped query.
async fn song_counts(state: &AppState, ids: Vec<Uuid>) -> ApiResult<HashMap<Uuid, u64>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = playlist_song::Entity::find()
        .select_only()
        .column(playlist_song::Column::PlaylistId)
        .column_as(playlist_song::Column::Id.count(), "song_count")
        .filter(playlist_song::Column::PlaylistId.is_in(ids))
        .group_by(playlist_song::Column::PlaylistId)
        .into_tuple()
        .all(&state.db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, count)| (id, count.max(0) as u64))
        .collect())
}

async fn with_counts(
    state: &AppState,
    page: PaginatedResponse<playlist::Model>,
) -> ApiResult<PaginatedResponse<Playlist>> {
    let counts = song_counts(state, page.data.iter().map(|p| p.id).collect()).await?;
    let data = page
        .data
        .into_iter()
        .map(|p| {
            let count = counts.get(&p.id).copied().unwrap_or(0);
            p.into_summary(Some(count))
        })
        .collect();
    Ok(PaginatedResponse {
        data,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        total_pages: page.total_pages,
    })
}

/// Entries of a playlist in position order, joined with their songs.
pub(crate) async fn load_entries(
    state: &AppState,
    playlist_id: Uuid,
) -> ApiResult<Vec<PlaylistEntry>> {
    let rows = playlist_song::Entity::find()
        .filter(playlist_song::Column::PlaylistId.eq(playlist_id))
        .order_by_asc(playlist_song::Column::Position)
        .order_by_asc(playlist_song::Column::AddedAt)
        .all(&state.db)
        .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let song_ids: Vec<Uuid> = rows.iter().map(|r| r.song_id).collect();
    let songs: HashMap<Uuid, song::Model> = song::Entity::find()
        .filter(song::Column::Id.is_in(song_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            songs.get(&row.song_id).map(|s| PlaylistEntry {
                position: row.position,
                added_at: row.added_at,
                song: Song::from(s.clone()),
            })
        })
        .collect())
}

async fn touch(state: &AppState, existing: playlist::Model) -> ApiResult<()> {
    let mut active: playlist::ActiveModel = existing.into();
    active.updated_at = Set(chrono::Utc::now().fixed_offset());
    active.update(&state.db).await?;
    Ok(())
}

/// GET /api/playlists/public
pub async fn list_public_playlists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<Playlist>>> {
    let select = playlist::Entity::find()
        .filter(playlist::Column::IsPublic.eq(true))
        .order_by_desc(playlist::Column::UpdatedAt);
    let page = paginate(&state.db, select, &params, |p| p).await?;
    Ok(Json(with_counts(&state, page).await?))
}

/// GET /api/playlists/my-playlists
pub async fn my_playlists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<PaginatedResponse<Playlist>>> {
    let select = playlist::Entity::find()
        .filter(playlist::Column::OwnerId.eq(user.0.sub))
        .order_by_desc(playlist::Column::UpdatedAt);
    let page = paginate(&state.db, select, &params, |p| p).await?;
    Ok(Json(with_counts(&state, page).await?))
}

/// GET /api/playlists/{id}: private playlists are visible to their owner only
pub async fn get_playlist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    auth_user: Option<Extension<AuthUser>>,
) -> ApiResult<Json<PlaylistDetail>> {
    let model = find_playlist(&state, id).await?;

    if !model.is_public {
        let is_owner = auth_user
            .as_ref()
            .is_some_and(|Extension(u)| u.0.sub == model.owner_id);
        if !is_owner {
            return Err(ApiError::Forbidden("This playlist is private".into()));
        }
    }

    let songs = load_entries(&state, id).await?;
    let count = songs.len() as u64;
    Ok(Json(PlaylistDetail {
        playlist: model.into_summary(Some(count)),
        songs,
    }))
}

/// POST /api/playlists
pub async fn create_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreatePlaylistRequest>,
) -> ApiResult<(StatusCode, Json<Playlist>)> {
    let name = validate_name(&body.name)?;
    let now = chrono::Utc::now().fixed_offset();

    let created = playlist::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(non_empty(body.description)),
        is_public: Set(body.is_public.unwrap_or(false)),
        owner_id: Set(user.0.sub),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    tracing::debug!(playlist_id = %created.id, owner = %user.0.sub, "playlist created");
    Ok((StatusCode::CREATED, Json(created.into_summary(Some(0)))))
}

/// PUT /api/playlists/{id} (owner only)
pub async fn update_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePlaylistRequest>,
) -> ApiResult<Json<Playlist>> {
    let existing = find_owned_playlist(&state, id, user.0.sub).await?;

    let mut active: playlist::ActiveModel = existing.into();
    if let Some(name) = body.name {
        active.name = Set(validate_name(&name)?);
    }
    if body.description.is_some() {
        active.description = Set(non_empty(body.description));
    }
    if let Some(is_public) = body.is_public {
        active.is_public = Set(is_public);
    }
    active.updated_at = Set(chrono::Utc::now().fixed_offset());

    let updated = active.update(&state.db).await?;
    let count = song_count(&state, id).await?;
    Ok(Json(updated.into_summary(Some(count))))
}

/// DELETE /api/playlists/{id} (owner only)
pub async fn delete_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    find_owned_playlist(&state, id, user.0.sub).await?;

    let txn = state.db.begin().await?;
    playlist_song::Entity::delete_many()
        .filter(playlist_song::Column::PlaylistId.eq(id))
        .exec(&txn)
        .await?;
    playlist::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::debug!(playlist_id = %id, owner = %user.0.sub, "playlist deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/playlists/{id}/songs (owner only): appends; duplicates allowed
pub async fn add_song_to_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<AddSongRequest>,
) -> ApiResult<(StatusCode, Json<PlaylistDetail>)> {
    let existing = find_owned_playlist(&state, id, user.0.sub).await?;

    song::Entity::find_by_id(body.song_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Song"))?;

    let max_pos: Option<i32> = playlist_song::Entity::find()
        .select_only()
        .column_as(playlist_song::Column::Position.max(), "max_pos")
        .filter(playlist_song::Column::PlaylistId.eq(id))
        .into_tuple::<Option<i32>>()
        .one(&state.db)
        .await?
        .flatten();

    playlist_song::ActiveModel {
        id: Set(Uuid::new_v4()),
        playlist_id: Set(id),
        song_id: Set(body.song_id),
        position: Set(max_pos.map_or(0, |p| p + 1)),
        added_at: Set(chrono::Utc::now().fixed_offset()),
    }
    .insert(&state.db)
    .await?;

    touch(&state, existing).await?;
    detail_response(&state, id, StatusCode::CREATED).await
}

/// DELETE /api/playlists/{id}/songs/{song_id} (owner only): drops every entry of that song
pub async fn remove_song_from_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, song_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<(StatusCode, Json<PlaylistDetail>)> {
    let existing = find_owned_playlist(&state, id, user.0.sub).await?;

    let removed = playlist_song::Entity::delete_many()
        .filter(playlist_song::Column::PlaylistId.eq(id))
        .filter(playlist_song::Column::SongId.eq(song_id))
        .exec(&state.db)
        .await?;
    tracing::debug!(playlist_id = %id, %song_id, removed = removed.rows_affected, "song removed from playlist");

    touch(&state, existing).await?;
    detail_response(&state, id, StatusCode::OK).await
}

async fn detail_response(
    state: &AppState,
    id: Uuid,
    status: StatusCode,
) -> ApiResult<(StatusCode, Json<PlaylistDetail>)> {
    let model = find_playlist(state, id).await?;
    let songs = load_entries(state, id).await?;
    let count = songs.len() as u64;
    Ok((
        status,
        Json(PlaylistDetail {
            playlist: model.into_summary(Some(count)),
            songs,
        }),
    ))
}
