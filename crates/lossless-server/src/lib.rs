//! HTTP service for the lossless catalog: auth, songs, playlists, users,
//! range-based audio streaming and cover art.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use lossless_db::AppState;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};

/// Headroom over the file limit for the multipart envelope and text fields.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Serialize)]
struct ApiStatus {
    status: &'static str,
    version: &'static str,
}

async fn healthz() -> Json<ApiStatus> {
    Json(ApiStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn api_cors(config: &ServerConfig) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers(Any)
        .expose_headers(Any);

    if origins.is_empty() {
        tracing::warn!("CORS_ORIGINS not set, cross-origin API requests will be refused");
        layer.allow_origin(AllowOrigin::list(Vec::<HeaderValue>::new()))
    } else {
        tracing::info!(?origins, "CORS allowed origins");
        layer.allow_origin(origins)
    }
}

/// Media elements on other origins must be able to seek, so stream and cover
/// routes are open to any origin.
fn media_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::RANGE, header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::CONTENT_LENGTH,
            header::ACCEPT_RANGES,
        ])
        .max_age(Duration::from_secs(86400))
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let require_auth =
        axum_middleware::from_fn_with_state(state.clone(), auth::middleware::require_auth);

    // Auth routes (public, optionally rate-limited per client IP)
    let mut auth_public = Router::new()
        .route("/register", post(auth::routes::register))
        .route("/login", post(auth::routes::login))
        .route("/refresh", post(auth::routes::refresh));

    if config.auth_rate_limit {
        match GovernorConfigBuilder::default()
            .per_second(6)
            .burst_size(10)
            .finish()
        {
            Some(governor_conf) => {
                auth_public = auth_public.layer(GovernorLayer::new(Arc::new(governor_conf)));
            }
            None => tracing::error!("invalid rate limiter config, auth routes are not rate-limited"),
        }
    }

    let auth_protected = Router::new()
        .route("/me", get(auth::routes::me))
        .route("/account", delete(auth::routes::delete_account))
        .layer(require_auth.clone());

    let public_api = Router::new()
        .route("/songs", get(api::songs::list_songs))
        .route("/songs/search", get(api::search::search_songs))
        .route("/songs/{id}", get(api::songs::get_song))
        .route("/playlists/public", get(api::playlists::list_public_playlists))
        .route("/playlists/search", get(api::search::search_playlists))
        .route("/users/{id}", get(api::users::get_user_profile));

    // Owner checks happen in the handler; the caller is optional here
    let optional_auth_api = Router::new()
        .route("/playlists/{id}", get(api::playlists::get_playlist))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::attach_auth,
        ));

    let protected_api = Router::new()
        .route(
            "/songs/upload",
            post(api::audio::upload_song).layer(DefaultBodyLimit::max(
                config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
            )),
        )
        .route("/songs/my-uploads", get(api::songs::my_uploads))
        .route(
            "/songs/{id}",
            put(api::songs::update_song).delete(api::songs::delete_song),
        )
        .route("/playlists", post(api::playlists::create_playlist))
        .route("/playlists/my-playlists", get(api::playlists::my_playlists))
        .route(
            "/playlists/{id}",
            put(api::playlists::update_playlist).delete(api::playlists::delete_playlist),
        )
        .route(
            "/playlists/{id}/songs",
            post(api::playlists::add_song_to_playlist),
        )
        .route(
            "/playlists/{id}/songs/{song_id}",
            delete(api::playlists::remove_song_from_playlist),
        )
        .route("/users/profile", put(api::users::update_profile))
        .route(
            "/users/listening-time",
            get(api::users::get_listening_time).post(api::users::add_listening_time),
        )
        .layer(require_auth);

    let json_api = Router::new()
        .nest("/auth", auth_public.merge(auth_protected))
        .merge(public_api)
        .merge(optional_auth_api)
        .merge(protected_api)
        .layer(api_cors(config));

    let media_api = Router::new()
        .route("/songs/{id}/stream", get(api::audio::stream_song))
        .route("/songs/cover/{filename}", get(api::audio::serve_cover))
        .layer(media_cors());

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", json_api.merge(media_api))
        .layer(TraceLayer::new_for_http())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains; preload"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("camera=(), microphone=(), geolocation=(), payment=()"),
        ))
        .with_state(state)
}
