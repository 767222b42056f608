// Shared test utilities for integration tests
#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use lossless_audio::{AudioStorage, StorageBackend};
use lossless_db::entities::song;
use lossless_db::AppState;
use lossless_server::{build_router, ServerConfig};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-for-testing-only";
pub const MULTIPART_BOUNDARY: &str = "lossless-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    // Keeps the storage directory alive for the duration of the test
    pub storage_dir: TempDir,
}

/// Fresh in-memory SQLite with the full schema applied.
pub async fn test_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.expect("connect sqlite");
    lossless_migration::Migrator::up(&db, None)
        .await
        .expect("run migrations");
    db
}

/// Create a test AppState with an in-memory database and temporary storage
pub fn test_app_state(db: DatabaseConnection, tmp_dir: &std::path::Path) -> Arc<AppState> {
    Arc::new(AppState {
        db,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        storage: Arc::new(AudioStorage::new(tmp_dir)),
        max_upload_bytes: 1024 * 1024,
    })
}

pub async fn spawn_app() -> TestApp {
    let storage_dir = TempDir::new().expect("temp dir");
    let state = test_app_state(test_db().await, storage_dir.path());

    let mut config = ServerConfig::for_tests(TEST_JWT_SECRET);
    config.max_upload_bytes = state.max_upload_bytes;

    TestApp {
        router: build_router(state.clone(), &config),
        state,
        storage_dir,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn header(&self, name: header::HeaderName) -> &str {
        self.headers
            .get(&name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_else(|| panic!("missing header {name}"))
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request("GET", uri, token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request("DELETE", uri, token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send_json("POST", uri, token, body).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> TestResponse {
        self.send(
            request(method, uri, token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Register a user and return its id and access token.
    pub async fn register_user(&self, username: &str) -> TestUser {
        let response = self
            .post_json(
                "/api/auth/register",
                None,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "correct-horse-battery",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);

        let body = response.json();
        TestUser {
            id: body["user"]["id"]
                .as_str()
                .and_then(|s| s.parse().ok())
                .expect("user id"),
            token: body["tokens"]["access_token"]
                .as_str()
                .expect("access token")
                .to_string(),
        }
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

/// A multipart part: (field name, optional filename and content type, bytes).
pub struct Part<'a> {
    pub name: &'a str,
    pub file: Option<(&'a str, &'a str)>,
    pub data: &'a [u8],
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        match part.file {
            Some((filename, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n\
                     Content-Type: {content_type}\r\n\r\n",
                    part.name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    part.name
                )
                .as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

impl TestApp {
    pub async fn upload(&self, token: &str, parts: &[Part<'_>]) -> TestResponse {
        self.send(
            request("POST", "/api/songs/upload", Some(token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap(),
        )
        .await
    }
}

/// Store `data` as an audio file and insert a song row pointing at it.
pub async fn insert_song(app: &TestApp, owner: Uuid, title: &str, data: &[u8]) -> song::Model {
    let file_path = app
        .state
        .storage
        .store_file(owner, &format!("{title}.flac"), data)
        .await
        .expect("store file");

    song::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title.to_string()),
        artist: Set("Test Artist".to_string()),
        album: Set(None),
        genre: Set(Some("Jazz".to_string())),
        release_date: Set(None),
        duration_secs: Set(180.0),
        file_path: Set(file_path),
        file_size: Set(data.len() as i64),
        cover_art: Set(None),
        format: Set("FLAC".to_string()),
        bitrate: Set(1411),
        has_dolby_atmos: Set(false),
        play_count: Set(0),
        added_by: Set(owner),
        created_at: Set(chrono::Utc::now().fixed_offset()),
    }
    .insert(&app.state.db)
    .await
    .expect("insert song")
}

/// Deterministic payload where byte `i` is `i % 251`.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// 16-bit stereo PCM WAV of `seconds` length at 44.1 kHz, all silence.
pub fn wav_bytes(seconds: u32) -> Vec<u8> {
    let sample_rate: u32 = 44_100;
    let channels: u16 = 2;
    let bits: u16 = 16;
    let block_align = channels * bits / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = byte_rate * seconds;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(44 + data_len as usize, 0);
    out
}
