mod auth;
mod db;
mod error;
mod notification;
mod routes;
mod settings;
mod state;
mod task;
mod telegram;
mod timezone;

use db::{create_pool, run_migrations};
use notification::ReminderService;
use routes::create_router;
use settings::SettingsRepository;
use state::{AppState, Config};
use std::sync::Arc;
use task::TaskRepository;
use telegram::{CommandBot, TelegramClient};
use timezone::TimezoneTable;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tgdailybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    tracing::info!("Connecting to database...");
    let db = create_pool(&config.db_path).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    // Create repositories
    let zones = TimezoneTable::russian();
    let settings_repository = SettingsRepository::new(db.clone(), zones.clone());
    let task_repository = TaskRepository::new(db.clone());

    let state = AppState {
        config: config.clone(),
        settings_repository,
        task_repository: task_repository.clone(),
    };

    // One token tears down every long-running piece. The bot holds the root
    // so a 409 from Telegram stops the whole process, not just polling.
    let cancel = CancellationToken::new();
    let telegram = TelegramClient::new(&config.bot_token)?;

    let reminder_service = ReminderService::new(
        task_repository,
        Arc::new(telegram.clone()),
        zones,
        config.reminder_poll_secs,
        cancel.child_token(),
    );
    tokio::spawn(reminder_service.run());

    let bot = CommandBot::new(
        telegram,
        config.mini_app_url.clone(),
        config.public_api_base_url.clone(),
        cancel.clone(),
    );
    tokio::spawn(bot.run());

    // Create router
    let app = create_router(state)?;

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    Ok(())
}

/// Resolves on Ctrl-C, SIGTERM, or internal cancellation, then cancels the
/// shared token so background tasks stop alongside the HTTP server.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
    tracing::info!("Shutting down");
}
