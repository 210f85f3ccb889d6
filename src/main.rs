//! Library Management API server

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_api::{
    app::create_router,
    config::AppConfig,
    database::{spawn_event_logger, ConnectOptions, Connector},
    repository::books::MongoBookRepository,
    shutdown::ShutdownHook,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("library_api={},tower_http=debug", config.logging.level).into());
    let json = config.logging.format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting Library Management API v{}", env!("CARGO_PKG_VERSION"));

    // Store connection; a failure is logged and the server keeps running
    let connector = Connector::new(ConnectOptions::from(&config.database));
    let _event_logger = spawn_event_logger(&connector);
    let _shutdown = ShutdownHook::install(connector.clone());

    match config.database.uri.as_deref() {
        Some(uri) => match connector.connect(uri).await {
            Ok(()) => {
                if let Err(e) = MongoBookRepository::new(connector.clone()).ensure_indexes().await {
                    tracing::warn!("Failed to create book indexes: {}", e);
                }
            }
            Err(e) => tracing::error!("MongoDB connection failed: {}", e),
        },
        None => tracing::error!("MONGODB_URI is not set; data endpoints will fail"),
    }

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );
    let environment = config.server.environment.clone();

    let state = AppState::new(config, connector);
    let app = create_router(state)?;

    tracing::info!(%environment, "Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
