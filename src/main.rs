//! Codenames sync gateway entrypoint wiring REST, SSE, and the shared game store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codenames_sync::{
    config::AppConfig,
    dao::game_store::{GameStore, memory::MemoryGameStore},
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState, board::BoardGenerator},
};

/// Environment variable selecting the storage backend.
const STORE_ENV: &str = "CODENAMES_STORE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let boards = BoardGenerator::new(config.vocabulary().clone())
        .context("building the board generator from the configured vocabulary")?;
    let app_state = AppState::new(config, boards);

    install_store(&app_state).await?;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the backend named by [`STORE_ENV`]; remote backends are connected by the supervisor.
async fn install_store(state: &SharedState) -> anyhow::Result<()> {
    let backend = env::var(STORE_ENV).unwrap_or_else(|_| "memory".into());
    info!(backend = %backend, "selecting game store");

    match backend.as_str() {
        "memory" => {
            state
                .set_game_store(Arc::new(MemoryGameStore::new()))
                .await;
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use codenames_sync::dao::game_store::couchdb::{CouchConfig, CouchGameStore};

            let config = CouchConfig::from_env().context("reading CouchDB configuration")?;
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                let config = config.clone();
                async move {
                    let store = CouchGameStore::connect(config).await?;
                    Ok(Arc::new(store) as Arc<dyn GameStore>)
                }
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use codenames_sync::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

            let poll_interval = state.config().watch_poll_interval();
            tokio::spawn(storage_supervisor::run(state.clone(), move || async move {
                let config = MongoConfig::from_env().await?.with_poll_interval(poll_interval);
                let store = MongoGameStore::connect(config).await?;
                Ok(Arc::new(store) as Arc<dyn GameStore>)
            }));
        }
        other => anyhow::bail!("unknown {STORE_ENV} value `{other}` (expected memory, couch or mongo)"),
    }

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
