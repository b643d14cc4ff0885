use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_core::{
    load_config, validate_config, EventCallback, GenerationBackend, LogBackend, Orchestrator,
    SchedulerEvent, WebhookBackend, WorkerRegistry,
};
use atelier_core::config::BackendKind;

use atelier_server::api::create_router;
use atelier_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("ATELIER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Backend: {:?}", config.backend.kind);

    // Create generation backend
    let backend: Arc<dyn GenerationBackend> = match config.backend.kind {
        BackendKind::Log => Arc::new(LogBackend::new()),
        BackendKind::Webhook => {
            // validate_config guarantees the webhook section is present
            let webhook_config = config
                .backend
                .webhook
                .clone()
                .ok_or_else(|| anyhow!("backend kind is webhook but [backend.webhook] is missing"))?;
            info!("Initializing webhook backend at {}", webhook_config.url);
            Arc::new(WebhookBackend::new(webhook_config)?)
        }
    };

    // Create worker registry and orchestrator
    let registry = Arc::new(WorkerRegistry::new(config.orchestrator.overload_ratio));

    let event_callback: EventCallback = Arc::new(|event: SchedulerEvent| match event {
        SchedulerEvent::ScaleUpRequested {
            resource,
            shortfall,
        } => {
            warn!(
                "Scale-up requested: {} short by {:.2}",
                resource.as_label(),
                shortfall
            );
        }
        SchedulerEvent::TaskAssigned { task_id, worker_id } => {
            info!("Task {} assigned to worker {}", task_id, worker_id);
        }
        SchedulerEvent::TaskTerminal { task_id, status } => {
            info!("Task {} reached {}", task_id, status.as_label());
        }
    });

    let orchestrator = Arc::new(
        Orchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&registry),
            backend,
        )
        .with_event_callback(event_callback),
    );

    // Start scheduling loops if enabled
    if config.orchestrator.enabled {
        Arc::clone(&orchestrator).start();
        info!("Scheduler started");
    } else {
        info!("Scheduler disabled in config");
    }

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&orchestrator)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop scheduler loops
    info!("Server shutting down...");
    orchestrator.shutdown().await;
    info!("Scheduler stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
