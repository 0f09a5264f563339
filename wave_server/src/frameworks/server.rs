// Framework bootstrap for the wave server runtime.

use crate::domain::skills::SkillCatalog;
use crate::frameworks::config;
use crate::interface_adapters::net::{create_lobby_handler, spawn_lobby_serializer, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{LobbyRegistry, LobbySettings};

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::{collections::HashSet, io::Result, sync::Arc, time::Duration};

fn init_runtime() {
    // A missing .env is normal outside local development.
    let _ = dotenvy::dotenv();
    init_tracing();
    install_panic_hook();
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json")) {
        builder.json().with_current_span(true).init();
    } else {
        builder.compact().init();
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Public socket route plus the internal lobby route.
fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/lobbies", post(create_lobby_handler))
        .with_state(state)
}

/// Serves on an already bound listener until the process exits.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let app = router(build_state().await?);

    tracing::info!(%address, "listening");
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

/// Binary entry point: env, logging, then bind `GAME_SERVER_PORT` on localhost.
pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

async fn build_state() -> Result<Arc<AppState>> {
    let tuning = Arc::new(config::load_tuning().inspect_err(|e| {
        tracing::error!(error = %e, "failed to load game tuning");
    })?);
    let catalog = Arc::new(SkillCatalog::standard());
    tracing::debug!(
        skills = catalog.len(),
        draw_cost = tuning.skill.draw_cost,
        replication_interval_ticks = tuning.replication.interval_ticks,
        "game tuning ready"
    );

    // Owns every lobby world task.
    let lobby_registry = Arc::new(LobbyRegistry::new(LobbySettings {
        input_channel_capacity: config::INPUT_CHANNEL_CAPACITY,
        world_broadcast_capacity: config::WORLD_BROADCAST_CAPACITY,
        tick_interval: config::TICK_INTERVAL,
        default_match_time_limit: config::DEFAULT_MATCH_TIME_LIMIT,
        start_countdown: config::MATCH_START_COUNTDOWN,
        tuning,
        catalog,
    }));

    // Pinned, open and untimed: the lobby clients land in without `lobby_id`.
    let test_lobby_id = "test".to_string();
    let test_lobby = lobby_registry
        .create_lobby(
            test_lobby_id.clone(),
            HashSet::new(),
            true,
            Duration::from_secs(0),
        )
        .await
        .map_err(|e| std::io::Error::other(format!("default lobby: {e:?}")))?;
    spawn_lobby_serializer(&test_lobby);
    lobby_registry.clone().spawn_match_end_watcher(
        test_lobby.lobby_id.clone(),
        test_lobby.server_state_tx.subscribe(),
    );

    Ok(Arc::new(AppState {
        lobby_registry,
        default_lobby_id: Arc::from(test_lobby_id.as_str()),
    }))
}
