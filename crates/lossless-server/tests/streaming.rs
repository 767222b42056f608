mod common;

use axum::body::Body;
use axum::http::{header, StatusCode};
use common::{insert_song, patterned_bytes, request, spawn_app};
use lossless_audio::StorageBackend;
use lossless_db::entities::song;
use sea_orm::EntityTrait;

async fn range_get(app: &common::TestApp, uri: &str, range: &str) -> common::TestResponse {
    app.send(
        request("GET", uri, None)
            .header(header::RANGE, range)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_range_request_returns_partial_content() {
    let app = spawn_app().await;
    let owner = app.register_user("streamer").await;
    let data = patterned_bytes(1000);
    let song = insert_song(&app, owner.id, "ranged", &data).await;

    let res = range_get(&app, &format!("/api/songs/{}/stream", song.id), "bytes=0-99").await;

    assert_eq!(res.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.header(header::CONTENT_RANGE), "bytes 0-99/1000");
    assert_eq!(res.header(header::CONTENT_LENGTH), "100");
    assert_eq!(res.header(header::ACCEPT_RANGES), "bytes");
    assert_eq!(res.header(header::CONTENT_TYPE), "audio/flac");
    assert_eq!(res.body, &data[..100]);
}

#[tokio::test]
async fn test_open_ended_ranges() {
    let app = spawn_app().await;
    let owner = app.register_user("seeker").await;
    let data = patterned_bytes(1000);
    let song = insert_song(&app, owner.id, "seek", &data).await;
    let uri = format!("/api/songs/{}/stream", song.id);

    let res = range_get(&app, &uri, "bytes=900-").await;
    assert_eq!(res.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.header(header::CONTENT_RANGE), "bytes 900-999/1000");
    assert_eq!(res.body, &data[900..]);

    // A missing start means the beginning of the file
    let res = range_get(&app, &uri, "bytes=-10").await;
    assert_eq!(res.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.header(header::CONTENT_RANGE), "bytes 0-10/1000");
    assert_eq!(res.body, &data[..=10]);

    // End past the file is clamped
    let res = range_get(&app, &uri, "bytes=500-5000").await;
    assert_eq!(res.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.header(header::CONTENT_RANGE), "bytes 500-999/1000");
    assert_eq!(res.body.len(), 500);
}

#[tokio::test]
async fn test_full_stream_without_range() {
    let app = spawn_app().await;
    let owner = app.register_user("listener").await;
    let data = patterned_bytes(4096);
    let song = insert_song(&app, owner.id, "whole", &data).await;

    let res = app
        .get(&format!("/api/songs/{}/stream", song.id), None)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header(header::CONTENT_LENGTH), "4096");
    assert_eq!(res.header(header::ACCEPT_RANGES), "bytes");
    assert!(res.headers.get(header::CONTENT_RANGE).is_none());
    assert_eq!(res.body, data);
}

#[tokio::test]
async fn test_unsatisfiable_range() {
    let app = spawn_app().await;
    let owner = app.register_user("overshoot").await;
    let song = insert_song(&app, owner.id, "short", &patterned_bytes(1000)).await;

    let res = range_get(
        &app,
        &format!("/api/songs/{}/stream", song.id),
        "bytes=1000-1100",
    )
    .await;

    assert_eq!(res.status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(res.header(header::CONTENT_RANGE), "bytes */1000");
}

#[tokio::test]
async fn test_stream_unknown_song_is_404() {
    let app = spawn_app().await;
    let res = app
        .get(&format!("/api/songs/{}/stream", uuid::Uuid::new_v4()), None)
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["error"], "Song not found");
}

#[tokio::test]
async fn test_stream_missing_file_is_404() {
    let app = spawn_app().await;
    let owner = app.register_user("ghost").await;
    let song = insert_song(&app, owner.id, "vanished", &patterned_bytes(64)).await;
    std::fs::remove_file(app.state.storage.full_path(&song.file_path)).unwrap();

    let res = app
        .get(&format!("/api/songs/{}/stream", song.id), None)
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["error"], "Audio file not found");
}

#[tokio::test]
async fn test_stream_counts_plays() {
    let app = spawn_app().await;
    let owner = app.register_user("fan").await;
    let song = insert_song(&app, owner.id, "hit", &patterned_bytes(256)).await;
    let uri = format!("/api/songs/{}/stream", song.id);

    app.get(&uri, None).await;
    range_get(&app, &uri, "bytes=0-15").await;

    let stored = song::Entity::find_by_id(song.id)
        .one(&app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.play_count, 2);
}

#[tokio::test]
async fn test_head_does_not_count_as_play() {
    let app = spawn_app().await;
    let owner = app.register_user("prober").await;
    let song = insert_song(&app, owner.id, "peek", &patterned_bytes(256)).await;
    let uri = format!("/api/songs/{}/stream", song.id);

    let res = app
        .send(request("HEAD", &uri, None).body(Body::empty()).unwrap())
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header(header::CONTENT_LENGTH), "256");
    assert_eq!(res.header(header::ACCEPT_RANGES), "bytes");
    assert!(res.body.is_empty());

    let stored = song::Entity::find_by_id(song.id)
        .one(&app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.play_count, 0);

    app.get(&uri, None).await;
    let stored = song::Entity::find_by_id(song.id)
        .one(&app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.play_count, 1);
}

#[tokio::test]
async fn test_stream_is_readable_cross_origin() {
    let app = spawn_app().await;
    let owner = app.register_user("embedder").await;
    let song = insert_song(&app, owner.id, "embedded", &patterned_bytes(32)).await;

    let res = app
        .send(
            request("GET", &format!("/api/songs/{}/stream", song.id), None)
                .header(header::ORIGIN, "https://elsewhere.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
    assert!(res
        .header(header::ACCESS_CONTROL_EXPOSE_HEADERS)
        .to_lowercase()
        .contains("content-range"));
}

#[tokio::test]
async fn test_cover_falls_back_to_placeholder() {
    let app = spawn_app().await;

    let res = app.get("/api/songs/cover/missing-cover.jpg", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header(header::CONTENT_TYPE), "image/png");
    assert!(res.body.starts_with(&[0x89, b'P', b'N', b'G']));

    // Traversal attempts never leave the covers directory
    let res = app.get("/api/songs/cover/..%2F..%2Fsecret.png", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header(header::CONTENT_TYPE), "image/png");
}

#[tokio::test]
async fn test_cover_served_from_storage() {
    let app = spawn_app().await;
    let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];
    let filename = app.state.storage.store_cover(&jpeg, "jpg").await.unwrap();

    let res = app.get(&format!("/api/songs/cover/{filename}"), None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header(header::CONTENT_TYPE), "image/jpeg");
    assert!(res.header(header::CACHE_CONTROL).contains("immutable"));
    assert_eq!(res.body, jpeg);
}
