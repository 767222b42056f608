use lossless_server::{build_router, ServerConfig};
use lossless_db::AppState;
use sea_orm_migration::MigratorTrait;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;

    let db_config = lossless_db::DatabaseConfig::from_env();
    tracing::info!("connecting to database...");
    let db = lossless_db::connect(&db_config).await?;

    tracing::info!("running database migrations...");
    lossless_migration::Migrator::up(&db, None).await?;
    tracing::info!("migrations complete");

    let storage = lossless_audio::AudioStorage::from_env();
    tracing::info!(path = %storage.base().display(), "using local filesystem storage");

    let state = Arc::new(AppState {
        db,
        jwt_secret: config.jwt_secret.clone(),
        storage: Arc::new(storage),
        max_upload_bytes: config.max_upload_bytes,
    });

    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, production = config.production, "server started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
