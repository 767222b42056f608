mod common;

use axum::body::Body;
use axum::http::{header, StatusCode};
use common::{request, spawn_app, wav_bytes, Part, MULTIPART_BOUNDARY};
use lossless_db::entities::song;
use sea_orm::{EntityTrait, PaginatorTrait};

fn song_files(app: &common::TestApp) -> usize {
    let dir = app.storage_dir.path().join("songs");
    walk(&dir)
}

fn walk(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                walk(&path)
            } else {
                1
            }
        })
        .sum()
}

async fn song_rows(app: &common::TestApp) -> u64 {
    song::Entity::find().count(&app.state.db).await.unwrap()
}

#[tokio::test]
async fn test_upload_wav_creates_song() {
    let app = spawn_app().await;
    let user = app.register_user("uploader").await;
    let wav = wav_bytes(1);

    let res = app
        .upload(
            &user.token,
            &[
                Part {
                    name: "audioFile",
                    file: Some(("Take Five.wav", "audio/wav")),
                    data: &wav,
                },
                Part {
                    name: "artist",
                    file: None,
                    data: b"Dave Brubeck",
                },
                Part {
                    name: "genre",
                    file: None,
                    data: b"Jazz",
                },
            ],
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&res.body));
    let created = res.json();
    assert_eq!(created["title"], "Take Five");
    assert_eq!(created["artist"], "Dave Brubeck");
    assert_eq!(created["genre"], "Jazz");
    assert_eq!(created["format"], "WAV");
    assert_eq!(created["has_dolby_atmos"], false);
    assert_eq!(created["play_count"], 0);
    assert_eq!(created["added_by"], user.id.to_string());
    assert_eq!(created["cover_url"], "/api/songs/cover/default-cover.png");
    let duration = created["duration_secs"].as_f64().unwrap();
    assert!((duration - 1.0).abs() < 0.1, "duration {duration}");

    assert_eq!(song_rows(&app).await, 1);
    assert_eq!(song_files(&app), 1);

    let mine = app
        .get("/api/songs/my-uploads", Some(&user.token))
        .await
        .json();
    assert_eq!(mine["total"], 1);

    // The stored bytes stream back unchanged
    let streamed = app
        .get(
            &format!("/api/songs/{}/stream", created["id"].as_str().unwrap()),
            None,
        )
        .await;
    assert_eq!(streamed.status, StatusCode::OK);
    assert_eq!(streamed.body, wav);
}

#[tokio::test]
async fn test_upload_accepts_release_date_alias() {
    let app = spawn_app().await;
    let user = app.register_user("archivist").await;
    let wav = wav_bytes(1);

    let res = app
        .upload(
            &user.token,
            &[
                Part {
                    name: "audioFile",
                    file: Some(("Blue.wav", "audio/wav")),
                    data: &wav,
                },
                Part {
                    name: "releaseDate",
                    file: None,
                    data: b"1971-06-22",
                },
            ],
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&res.body));
    let created = res.json();
    assert_eq!(created["release_date"], "1971-06-22");
    assert!(created["genre"].is_null());
}

#[tokio::test]
async fn test_upload_truncated_text_field_is_rejected() {
    let app = spawn_app().await;
    let user = app.register_user("cutoff").await;
    let body = format!(
        "--{MULTIPART_BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"title\"\r\n\r\n\
         half a ti"
    );

    let res = app
        .send(
            request("POST", "/api/songs/upload", Some(&user.token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let error = res.json()["error"].as_str().unwrap().to_string();
    assert!(error.starts_with("Malformed multipart body"), "{error}");
    assert_eq!(song_rows(&app).await, 0);
}

#[tokio::test]
async fn test_upload_oversized_text_field_is_413() {
    let app = spawn_app().await;
    let user = app.register_user("verbose").await;
    let wav = wav_bytes(1);
    let title = vec![b'a'; app.state.max_upload_bytes * 3];

    let res = app
        .upload(
            &user.token,
            &[
                Part {
                    name: "title",
                    file: None,
                    data: &title,
                },
                Part {
                    name: "audioFile",
                    file: Some(("small.wav", "audio/wav")),
                    data: &wav,
                },
            ],
        )
        .await;

    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(song_rows(&app).await, 0);
    assert_eq!(song_files(&app), 0);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_extension() {
    let app = spawn_app().await;
    let user = app.register_user("sneaky").await;

    let res = app
        .upload(
            &user.token,
            &[Part {
                name: "audioFile",
                file: Some(("notes.txt", "text/plain")),
                data: b"definitely not audio, just some notes",
            }],
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json()["error"]
        .as_str()
        .unwrap()
        .contains("Unsupported file type"));
    assert_eq!(song_rows(&app).await, 0);
    assert_eq!(song_files(&app), 0);
}

#[tokio::test]
async fn test_upload_rejects_disguised_file() {
    let app = spawn_app().await;
    let user = app.register_user("disguise").await;

    let res = app
        .upload(
            &user.token,
            &[Part {
                name: "audioFile",
                file: Some(("evil.flac", "audio/flac")),
                data: b"<script>alert(1)</script> padding padding",
            }],
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(song_rows(&app).await, 0);
    assert_eq!(song_files(&app), 0);
}

#[tokio::test]
async fn test_upload_unreadable_audio_is_cleaned_up() {
    let app = spawn_app().await;
    let user = app.register_user("corrupt").await;
    let mut data = b"fLaC".to_vec();
    data.extend(std::iter::repeat(0xAB).take(512));

    let res = app
        .upload(
            &user.token,
            &[Part {
                name: "audioFile",
                file: Some(("broken.flac", "audio/flac")),
                data: &data,
            }],
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(song_rows(&app).await, 0);
    assert_eq!(song_files(&app), 0);
}

#[tokio::test]
async fn test_upload_without_file_or_auth() {
    let app = spawn_app().await;
    let user = app.register_user("empty").await;

    let res = app
        .upload(
            &user.token,
            &[Part {
                name: "title",
                file: None,
                data: b"Nothing",
            }],
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "No audio file provided");

    let res = app.upload("not-a-token", &[]).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_over_limit_is_413() {
    let app = spawn_app().await;
    let user = app.register_user("bulky").await;
    let mut data = b"fLaC".to_vec();
    data.resize(app.state.max_upload_bytes + 1, 0);

    let res = app
        .upload(
            &user.token,
            &[Part {
                name: "audioFile",
                file: Some(("huge.flac", "audio/flac")),
                data: &data,
            }],
        )
        .await;

    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(song_rows(&app).await, 0);
}

#[tokio::test]
async fn test_owner_deletes_song_and_files() {
    let app = spawn_app().await;
    let owner = app.register_user("tidy").await;
    let other = app.register_user("meddler").await;
    let wav = wav_bytes(1);

    let created = app
        .upload(
            &owner.token,
            &[Part {
                name: "file",
                file: Some(("clip.wav", "audio/x-wav")),
                data: &wav,
            }],
        )
        .await
        .json();
    let uri = format!("/api/songs/{}", created["id"].as_str().unwrap());

    let res = app.delete(&uri, Some(&other.token)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(song_files(&app), 1);

    let res = app.delete(&uri, Some(&owner.token)).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(song_rows(&app).await, 0);
    assert_eq!(song_files(&app), 0);
    assert_eq!(app.get(&uri, None).await.status, StatusCode::NOT_FOUND);
}
