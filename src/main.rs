use sea_orm_migration::MigratorTrait;
use slug_board::{
    app::create_app,
    config::{self, BoardConfig, StoreBackend},
    migration,
    services::reconcile::spawn_reconciler,
    store::{MemoryStore, PgStore, SharedStore},
    utils,
};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slug_board=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration before doing anything else
    let jwt_config = config::jwt::JwtConfig::from_env()?;
    utils::jwt::init_jwt_config(jwt_config)?;

    let board = BoardConfig::from_env();
    tracing::info!(
        "Starting Slug Board API v{} ({:?} store, {:?} counters)...",
        env!("CARGO_PKG_VERSION"),
        board.backend,
        board.counter_mode
    );

    let store = open_store(&board).await?;

    if let Some(every) = board.reconcile_interval {
        tracing::info!("Counter reconciliation every {}s", every.as_secs());
        spawn_reconciler(store.clone(), every);
    }

    let app = create_app(store, board);

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn open_store(board: &BoardConfig) -> anyhow::Result<SharedStore> {
    match board.backend {
        StoreBackend::Postgres => {
            let db = config::database::get_database().await?;
            tracing::info!("Database connected successfully");

            migration::Migrator::up(&db, None).await?;
            tracing::info!("Database migrations applied successfully");

            Ok(Arc::new(PgStore::new(db)))
        }
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            if board.seed_demo_events {
                store.seed_demo_events();
            }
            tracing::warn!("Running offline with an in-memory store, nothing will persist");
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
