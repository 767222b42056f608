use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use lossless_audio::{
    content_type_for_path, extract_metadata_from_file, image_content_type, resolve_range,
    AudioFormat, AudioMetadata,
};
use lossless_models::{Song, DEFAULT_COVER};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::songs::{find_song, non_empty};
use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiResult};
use lossless_db::entities::song;
use lossless_db::AppState;

/// 1x1 transparent PNG served when not even the default cover is on disk.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const UNKNOWN_ARTIST: &str = "Unknown Artist";

// ─── Upload ────────────────────────────────────────────────────────

/// The audio part of an upload form.
struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    data: bytes::Bytes,
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    release_date: Option<String>,
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::Validation(format!("Malformed multipart body: {}", err.body_text()))
    }
}

async fn read_upload_form(multipart: &mut Multipart, limit: usize) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "audioFile" | "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                form.file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            "title" | "artist" | "album" | "genre" | "release_date" | "releaseDate" => {
                let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
                let value = non_empty(Some(text));
                match name.as_str() {
                    "title" => form.title = value,
                    "artist" => form.artist = value,
                    "album" => form.album = value,
                    "genre" => form.genre = value,
                    _ => form.release_date = value,
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Reject anything that is not a whitelisted audio file before touching storage.
fn validate_upload(file: &UploadedFile, limit: usize) -> ApiResult<AudioFormat> {
    if file.data.len() > limit {
        return Err(ApiError::PayloadTooLarge { limit });
    }

    let ext = std::path::Path::new(&file.filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let format = AudioFormat::from_extension(ext).ok_or_else(|| {
        ApiError::UploadRejected(format!(
            "Unsupported file type '{ext}'. Only FLAC, WAV and MP3 are allowed"
        ))
    })?;

    if let Some(mime) = file.content_type.as_deref() {
        if !format.accepts_mime(mime) {
            return Err(ApiError::UploadRejected(format!(
                "Content type '{mime}' does not match a .{} file",
                format.extension()
            )));
        }
    }

    // SECURITY: validate audio magic bytes to prevent disguised file uploads
    if !format.matches_magic_bytes(&file.data) {
        return Err(ApiError::UploadRejected(
            "File content does not match its audio format".into(),
        ));
    }

    Ok(format)
}

fn file_stem(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
}

/// POST /api/songs/upload: multipart audio upload
pub async fn upload_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Song>)> {
    let user_id = user.0.sub;
    let limit = state.max_upload_bytes;

    let form = read_upload_form(&mut multipart, limit).await?;
    let file = form
        .file
        .as_ref()
        .ok_or_else(|| ApiError::Validation("No audio file provided".into()))?;
    let format = validate_upload(file, limit)?;

    let relative_path = state
        .storage
        .store_file(user_id, &file.filename, &file.data)
        .await?;

    let full_path = state.storage.full_path(&relative_path);
    let extracted = tokio::task::spawn_blocking(move || extract_metadata_from_file(&full_path))
        .await
        .map_err(|e| ApiError::Internal(format!("metadata task failed: {e}")))?;

    let meta = match extracted {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!(path = %relative_path, "unreadable audio upload: {e}");
            if let Err(e) = state.storage.delete_file(&relative_path).await {
                tracing::warn!(path = %relative_path, "failed to remove rejected upload: {e}");
            }
            return Err(ApiError::UploadRejected(
                "Could not read audio metadata from file".into(),
            ));
        }
    };

    let cover_art = store_cover_art(&state, &meta).await;

    let title = form
        .title
        .clone()
        .or_else(|| meta.title.clone())
        .or_else(|| file_stem(&file.filename))
        .unwrap_or_else(|| "Untitled".to_string());
    let artist = form
        .artist
        .clone()
        .or_else(|| meta.artist.clone())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    let record = song::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        artist: Set(artist),
        album: Set(form.album.clone().or_else(|| meta.album.clone())),
        genre: Set(form.genre.clone().or_else(|| meta.genre.clone())),
        release_date: Set(form
            .release_date
            .clone()
            .or_else(|| meta.year.map(|y| y.to_string()))),
        duration_secs: Set(meta.duration_secs),
        file_path: Set(relative_path.clone()),
        file_size: Set(file.data.len() as i64),
        cover_art: Set(cover_art.clone()),
        format: Set(format.as_tag().to_string()),
        bitrate: Set(meta.bitrate_or_default() as i32),
        has_dolby_atmos: Set(meta.has_dolby_atmos()),
        play_count: Set(0),
        added_by: Set(user_id),
        created_at: Set(chrono::Utc::now().fixed_offset()),
    };

    let created = match record.insert(&state.db).await {
        Ok(created) => created,
        Err(e) => {
            let orphan = song::Model {
                file_path: relative_path,
                cover_art,
                ..song_placeholder(user_id)
            };
            super::songs::remove_song_files(&state, &orphan).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        song_id = %created.id,
        %user_id,
        format = %created.format,
        bytes = created.file_size,
        "song uploaded"
    );

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Minimal model used to clean up files when the insert fails.
fn song_placeholder(user_id: Uuid) -> song::Model {
    song::Model {
        id: Uuid::nil(),
        title: String::new(),
        artist: String::new(),
        album: None,
        genre: None,
        release_date: None,
        duration_secs: 0.0,
        file_path: String::new(),
        file_size: 0,
        cover_art: None,
        format: String::new(),
        bitrate: 0,
        has_dolby_atmos: false,
        play_count: 0,
        added_by: user_id,
        created_at: chrono::Utc::now().fixed_offset(),
    }
}

/// Persist embedded artwork; any failure falls back to the default cover.
async fn store_cover_art(state: &AppState, meta: &AudioMetadata) -> Option<String> {
    let cover = meta.cover_art.as_ref()?;
    match state.storage.store_cover(&cover.data, &cover.extension).await {
        Ok(filename) => Some(filename),
        Err(e) => {
            tracing::warn!("failed to store cover art: {e}");
            None
        }
    }
}

// ─── Streaming ─────────────────────────────────────────────────────

/// GET /api/songs/{id}/stream: audio bytes with HTTP Range support.
/// HEAD gets the same headers and does not count as a play.
pub async fn stream_song(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    method: Method,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let song = find_song(&state, id).await?;

    let file_path = state.storage.full_path(&song.file_path);
    let file_size = match tokio::fs::metadata(&file_path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            tracing::warn!(song_id = %id, path = %song.file_path, "audio file missing from storage");
            return Err(ApiError::AudioFileMissing);
        }
    };

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let range = resolve_range(range_header, file_size)?;

    let (start, content_length) = match range {
        Some(r) => (r.start, r.len()),
        None => (0, file_size),
    };

    let mut file = tokio::fs::File::open(&file_path).await.map_err(|e| {
        tracing::warn!(song_id = %id, "cannot open audio file: {e}");
        ApiError::AudioFileMissing
    })?;
    if start > 0 {
        file.seek(std::io::SeekFrom::Start(start))
            .await
            .map_err(|e| ApiError::Internal(format!("seek error: {e}")))?;
    }

    let body = Body::from_stream(ReaderStream::new(file.take(content_length)));

    if method != Method::HEAD {
        bump_play_count(&state, id).await;
    }

    let content_type = content_type_for_path(&file_path);
    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes");

    response = match range {
        Some(r) => response
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, r.content_range(file_size)),
        None => response.status(StatusCode::OK),
    };

    response
        .body(body)
        .map_err(|e| ApiError::Internal(format!("response build error: {e}")))
}

/// Single atomic `play_count = play_count + 1`; failures never break playback.
async fn bump_play_count(state: &AppState, id: Uuid) {
    let result = song::Entity::update_many()
        .col_expr(
            song::Column::PlayCount,
            Expr::col(song::Column::PlayCount).add(1),
        )
        .filter(song::Column::Id.eq(id))
        .exec(&state.db)
        .await;
    if let Err(e) = result {
        tracing::warn!(song_id = %id, "failed to increment play count: {e}");
    }
}

// ─── Cover art ─────────────────────────────────────────────────────

/// GET /api/songs/cover/{filename}: cover image, falling back to the default
pub async fn serve_cover(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Response {
    if let Ok(path) = state.storage.cover_path(&filename) {
        if let Ok(data) = tokio::fs::read(&path).await {
            return image_response(data, image_content_type(&path), true);
        }
    }

    if filename != DEFAULT_COVER {
        tracing::debug!(%filename, "cover not found, serving default");
    }

    match state.storage.cover_path(DEFAULT_COVER) {
        Ok(path) => match tokio::fs::read(&path).await {
            Ok(data) => image_response(data, "image/png", false),
            Err(_) => image_response(PLACEHOLDER_PNG.to_vec(), "image/png", false),
        },
        Err(_) => image_response(PLACEHOLDER_PNG.to_vec(), "image/png", false),
    }
}

fn image_response(data: Vec<u8>, content_type: &'static str, immutable: bool) -> Response {
    let cache = if immutable {
        "public, max-age=31536000, immutable"
    } else {
        "public, max-age=3600"
    };
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CACHE_CONTROL, HeaderValue::from_static(cache)),
        ],
        data,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, content_type: Option<&str>, data: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: filename.to_string(),
            content_type: content_type.map(str::to_string),
            data: bytes::Bytes::copy_from_slice(data),
        }
    }

    fn flac_bytes() -> Vec<u8> {
        let mut data = b"fLaC".to_vec();
        data.resize(64, 0);
        data
    }

    #[test]
    fn test_validate_upload_accepts_flac() {
        let file = upload("track.FLAC", Some("audio/flac"), &flac_bytes());
        assert_eq!(validate_upload(&file, 1024).unwrap(), AudioFormat::Flac);
    }

    #[test]
    fn test_validate_upload_rejects_extension() {
        let file = upload("track.ogg", Some("audio/ogg"), b"OggS0000000000000000");
        assert!(matches!(
            validate_upload(&file, 1024),
            Err(ApiError::UploadRejected(_))
        ));
    }

    #[test]
    fn test_validate_upload_rejects_mime_mismatch() {
        let file = upload("track.flac", Some("image/png"), &flac_bytes());
        assert!(matches!(
            validate_upload(&file, 1024),
            Err(ApiError::UploadRejected(_))
        ));
    }

    #[test]
    fn test_validate_upload_rejects_disguised_content() {
        let file = upload("track.mp3", Some("audio/mpeg"), b"<html>not audio at all</html>");
        assert!(matches!(
            validate_upload(&file, 1024),
            Err(ApiError::UploadRejected(_))
        ));
    }

    #[test]
    fn test_validate_upload_too_large() {
        let file = upload("track.flac", None, &flac_bytes());
        assert!(matches!(
            validate_upload(&file, 10),
            Err(ApiError::PayloadTooLarge { limit: 10 })
        ));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Blue in Green.flac").as_deref(), Some("Blue in Green"));
        assert_eq!(file_stem(".flac").as_deref(), Some(".flac"));
        assert_eq!(file_stem(""), None);
    }

    #[test]
    fn test_placeholder_png_signature() {
        assert!(PLACEHOLDER_PNG.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
