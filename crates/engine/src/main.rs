//! dropfour engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dropfour_engine::api::{self, ConnectionManager, WsState};
use dropfour_engine::infrastructure::{
    clock::SystemClock,
    config::{AppConfig, PersistenceBackend},
    persistence::{InMemoryGameRecordRepo, SqliteGameRecordRepo},
    ports::{ClockPort, GameRecordRepo, MessageSender},
};
use dropfour_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine may be started from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dropfour_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting dropfour engine");

    let config = AppConfig::from_env()?;
    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());

    let game_records: Arc<dyn GameRecordRepo> = match config.persistence.backend {
        PersistenceBackend::Memory => {
            tracing::info!("Using in-memory game records");
            Arc::new(InMemoryGameRecordRepo::new())
        }
        PersistenceBackend::Sqlite => {
            let path = &config.persistence.sqlite_path;
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            tracing::info!(path = %path, "Opening SQLite game records");
            Arc::new(SqliteGameRecordRepo::new(path).await?)
        }
    };

    let connections = Arc::new(ConnectionManager::new(config.connection.send_timeout));
    let sender: Arc<dyn MessageSender> = connections.clone();

    let app = Arc::new(App::new(
        &config.bot_name,
        config.board,
        &config.matchmaking,
        game_records,
        sender,
        clock,
    ));

    let ws_state = Arc::new(WsState {
        app: app.clone(),
        connections: connections.clone(),
        settings: config.connection.clone(),
    });

    let cancel_token = CancellationToken::new();
    setup_shutdown_signal(cancel_token.clone());

    // Spawn matchmaking loop
    let matchmaker = app.use_cases.matchmaking.clone();
    let matchmaking_task = tokio::spawn(matchmaker.run(cancel_token.clone()));

    // Build router with separate states for HTTP and WebSocket
    let mut router = api::http::routes()
        .with_state(app)
        .route("/ws", get(api::ws_handler).with_state(ws_state))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = build_cors_layer(&config.cors_allowed_origins) {
        router = router.layer(cors);
    }

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = cancel_token.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    });

    cancel_token.cancelled().await;

    // Upgraded sockets do not end with the listener; close them explicitly.
    connections.shutdown(config.connection.shutdown_grace).await;

    server.await??;
    if let Err(e) = matchmaking_task.await {
        tracing::warn!(error = %e, "Matchmaking task ended abnormally");
    }

    tracing::info!("dropfour engine stopped");
    Ok(())
}

fn setup_shutdown_signal(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        cancel_token.cancel();
    });
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer(allowed_origins: &[String]) -> Option<CorsLayer> {
    if allowed_origins.is_empty() {
        return None;
    }

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return Some(cors.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(cors.allow_origin(origins))
}
