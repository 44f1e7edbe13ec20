//! conference-review server entry point.
//!
//! Connects to PostgreSQL, wires the review engines and starts the Axum
//! HTTP server.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use conference_review::api;
use conference_review::app_state::AppState;
use conference_review::config::{LogFormat, ReviewConfig};
use conference_review::persistence::{
    AuditWriter, FileStore, LocalFileStore, PostgresStore, ReviewStore, RoleStore,
};
use conference_review::service::{
    MembershipCheck, MembershipVerdict, PostgresMembershipCheck, StaticMembershipCheck,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ReviewConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting conference-review");

    // Persistence
    let postgres = Arc::new(
        PostgresStore::connect(
            &config.database_url,
            config.database_max_connections,
            config.database_min_connections,
            Duration::from_secs(config.database_connect_timeout_secs),
        )
        .await?,
    );
    if config.run_migrations {
        postgres.migrate().await?;
        tracing::info!("migrations applied");
    }
    let store: Arc<dyn ReviewStore> = Arc::clone(&postgres) as Arc<dyn ReviewStore>;
    let roles: Arc<dyn RoleStore> = postgres;
    let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(config.upload_dir.clone()));
    let membership = membership_check(&config)?;

    // Engines
    let app_state = AppState::new(Arc::clone(&store), roles, files, membership, &config);
    let audit_writer = config
        .audit_persist_enabled
        .then(|| AuditWriter::new(store, &app_state.audit_bus).spawn());

    // Build router
    let app = Router::new()
        .merge(api::build_router(config.max_upload_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::openapi::ApiDoc::openapi()),
        )
    };
    let app = app.with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    if let Some(writer) = audit_writer {
        writer.abort();
    }
    Ok(())
}

fn membership_check(config: &ReviewConfig) -> anyhow::Result<Arc<dyn MembershipCheck>> {
    if !config.membership_enforce {
        return Ok(Arc::new(StaticMembershipCheck::new(
            MembershipVerdict::unconfigured(),
        )));
    }
    match &config.membership_database_url {
        Some(url) => Ok(Arc::new(PostgresMembershipCheck::connect_lazy(url)?)),
        None => {
            tracing::warn!(
                "membership enforcement on without MEMBERSHIP_DATABASE_URL; final uploads will be refused"
            );
            Ok(Arc::new(StaticMembershipCheck::unavailable()))
        }
    }
}
