//! livepoll server entry point.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware, routing::get};
use livepoll_api::{
    RedisRelay, StreamingState, health_check, middleware::AppState, router as api_router,
    streaming_handler,
};
use livepoll_common::Config;
use livepoll_core::{
    EventPublisherService, HostService, ParticipantService, PollService, ResponseService,
    ResultsService, SessionService,
};
use livepoll_db::repositories::{
    HostRepository, ParticipantRepository, PollRepository, ResponseRepository, SessionRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle session channels are dropped.
const CHANNEL_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "livepoll=debug,tower_http=debug".into());

    if json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    init_tracing(config.logging.json);
    info!("Starting livepoll server...");

    // Connect to database
    let db = livepoll_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    livepoll_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);

    // Initialize repositories
    let host_repo = HostRepository::new(Arc::clone(&db));
    let session_repo = SessionRepository::new(Arc::clone(&db));
    let participant_repo = ParticipantRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let response_repo = ResponseRepository::new(Arc::clone(&db));

    // Realtime fan-out: local hub, relayed through Redis when configured
    let streaming = StreamingState::new();
    let mut relay = None;

    let event_publisher: EventPublisherService = match &config.redis {
        Some(redis) => {
            info!("Connecting to Redis...");
            let redis_relay = RedisRelay::new(&redis.url, &redis.prefix).await?;
            redis_relay.start(streaming.clone()).await?;
            relay = Some(redis_relay.clone());
            Arc::new(redis_relay)
        }
        None => {
            warn!("Redis not configured; realtime events stay on this instance");
            Arc::new(streaming.clone())
        }
    };

    // Initialize services
    let host_service = HostService::new(host_repo);
    let session_service =
        SessionService::new(session_repo.clone(), poll_repo.clone(), &config.polling);
    let participant_service =
        ParticipantService::new(participant_repo.clone(), session_repo.clone());

    let mut poll_service = PollService::new(poll_repo.clone(), session_repo.clone(), &config.polling);
    poll_service.set_event_publisher(Arc::clone(&event_publisher));

    let mut response_service = ResponseService::new(
        response_repo.clone(),
        poll_repo.clone(),
        participant_repo.clone(),
        config.polling.resubmission,
    );
    response_service.set_event_publisher(event_publisher);

    let results_service =
        ResultsService::new(poll_repo, session_repo, response_repo, participant_repo);

    let state = AppState {
        host_service,
        session_service,
        participant_service,
        poll_service,
        response_service,
        results_service,
        streaming: streaming.clone(),
    };

    // Drop session channels nobody listens to anymore
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHANNEL_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            streaming.cleanup().await;
        }
    });

    // Build router
    let app = Router::new()
        .route("/streaming", get(streaming_handler))
        .route("/health", get(health_check))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            livepoll_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(relay) = relay
        && let Err(e) = relay.shutdown().await
    {
        warn!(error = %e, "Failed to close Redis connections");
    }

    info!("Server shutdown complete");
    Ok(())
}
