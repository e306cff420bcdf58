//! Bible games backend entrypoint wiring the REST API, SQLite storage, the
//! question generator and the expiration sweeper.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bible_games_back::{
    config::AppConfig,
    dao::game_store::{
        GameStore,
        sqlite::{SqliteConfig, SqliteGameStore},
    },
    generation::{QuestionGenerator, pool::builtin_pool},
    routes,
    services::expiration_service,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store = SqliteGameStore::open(SqliteConfig::from_env()).context("opening database")?;
    let seeded = store
        .seed_pool(builtin_pool())
        .await
        .context("seeding question pool")?;
    if seeded > 0 {
        info!(seeded, "question pool seeded");
    }

    let generator = build_generator();
    let app_state = AppState::new(Arc::new(store), generator, config);
    expiration_service::spawn_sweeper(app_state.clone());

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

#[cfg(feature = "openai-generator")]
fn build_generator() -> Option<Arc<dyn QuestionGenerator>> {
    use bible_games_back::generation::openai::{OpenAiConfig, OpenAiGenerator};

    let Some(config) = OpenAiConfig::from_env() else {
        warn!("OPENAI_API_KEY not set; questions will come from the built-in pool");
        return None;
    };
    let model = config.model.clone();
    match OpenAiGenerator::new(config) {
        Ok(generator) => {
            info!(%model, "question generator ready");
            Some(Arc::new(generator))
        }
        Err(err) => {
            warn!(error = %err, "question generator unavailable; using the built-in pool");
            None
        }
    }
}

#[cfg(not(feature = "openai-generator"))]
fn build_generator() -> Option<Arc<dyn QuestionGenerator>> {
    warn!("built without a question generator; questions will come from the built-in pool");
    None
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
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
