//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{self, Method, header};
use learning::application::events::UserRegisteredEvent;
use learning::consumer::run_registration_consumer;
use learning::domain::repository::{ReplicationHook, Store};
use learning::presentation::panic_response;
use learning::{
    Dependencies, MemoryStore, NoReplication, PgStore, ReadStoreMirror, WriteStore, build_mediator,
    learning_router,
};
use platform::cache::{CacheService, MemoryCacheService};
use platform::mail::{EmailSender, SmtpEmailSender};
use platform::messaging::InMemoryBus;
use platform::messaging::{BrokerConfig, DomainEvent, EventConsumer, EventPublisher};
use platform::password::{HasherConfig, PasswordHasher};
use platform::token::TokenIssuer;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,learning=info,platform=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    match config.database.clone() {
        Some(urls) => {
            let write_pool = connect(&urls.write).await?;
            tracing::info!("Connected to write database");

            if urls.is_shared() {
                let store = Arc::new(PgStore::new(write_pool));
                return serve(config, store.clone(), store, Arc::new(NoReplication)).await;
            }

            let read_pool = connect(&urls.read).await?;
            tracing::info!("Connected to read database");

            let read = Arc::new(PgStore::new(read_pool));
            let hook = Arc::new(ReadStoreMirror::new(read.clone()));
            serve(config, Arc::new(PgStore::new(write_pool)), read, hook).await
        }
        None => {
            tracing::warn!("No database configured, using in-memory stores; data is lost on exit");
            let read = Arc::new(MemoryStore::new());
            let hook = Arc::new(ReadStoreMirror::new(read.clone()));
            serve(config, Arc::new(MemoryStore::new()), read, hook).await
        }
    }
}

/// Open a pool and bring its schema up to date
async fn connect(url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;

    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");
    Ok(pool)
}

async fn serve<S: Store>(
    config: AppConfig,
    write: Arc<S>,
    read: Arc<S>,
    hook: Arc<dyn ReplicationHook>,
) -> anyhow::Result<()> {
    let cache: Arc<dyn CacheService> = Arc::new(MemoryCacheService::new(config.cache.clone()));
    let hasher = Arc::new(PasswordHasher::new(HasherConfig::default(), None)?);
    let tokens = Arc::new(TokenIssuer::new(config.tokens.clone()));
    let mailer: Arc<dyn EmailSender> = Arc::new(SmtpEmailSender::new(&config.mail)?);
    let (publisher, consumer) = event_bus(&config.broker).await?;

    let deps = Dependencies {
        write: WriteStore::new(write, hook),
        read: read.clone(),
        cache,
        hasher,
        tokens: tokens.clone(),
        publisher,
        mailer: mailer.clone(),
        config: Arc::new(config.learning.clone()),
    };
    let mediator = build_mediator(&deps);

    // Registration consumer runs until shutdown
    let shutdown = CancellationToken::new();
    let consumer_task = tokio::spawn(run_registration_consumer(
        consumer,
        read,
        tokens.clone(),
        mailer,
        deps.config.clone(),
        shutdown.clone(),
    ));

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = config
        .frontend_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = learning_router(mediator, tokens)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = config.bind_addr;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    shutdown.cancel();
    if let Err(e) = consumer_task.await {
        tracing::error!(error = %e, "Registration consumer task failed");
    }

    Ok(())
}

type EventBus = (Arc<dyn EventPublisher>, Arc<dyn EventConsumer>);

/// Kafka when enabled and compiled in, otherwise the in-process bus
async fn event_bus(broker: &BrokerConfig) -> anyhow::Result<EventBus> {
    if broker.enabled {
        #[cfg(feature = "kafka")]
        {
            use platform::messaging::kafka::{KafkaConsumer, KafkaPublisher};

            let publisher = KafkaPublisher::new(broker)?;
            let consumer = KafkaConsumer::new(broker, &[UserRegisteredEvent::NAME])?;
            tracing::info!(servers = %broker.bootstrap_servers, "Using Kafka event bus");
            return Ok((Arc::new(publisher), Arc::new(consumer)));
        }

        #[cfg(not(feature = "kafka"))]
        tracing::warn!("KAFKA_ENABLED is set but the server was built without the kafka feature");
    }

    let bus = InMemoryBus::new();
    let consumer = bus
        .subscribe(UserRegisteredEvent::NAME)
        .await
        .ok_or_else(|| anyhow::anyhow!("registration topic already has a consumer"))?;
    tracing::info!("Using in-process event bus");
    Ok((Arc::new(bus), Arc::new(consumer)))
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
