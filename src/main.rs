use std::sync::Arc;

use clinic_scheduling::{
    config::Config,
    db,
    models::AppState,
    notify::{LogNotifier, Notifier, SmtpNotifier},
    routes,
    store::PgStore,
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;
    if cfg.run_migrations {
        db::migrate(&pool).await?;
    }

    let notifier: Arc<dyn Notifier> = match &cfg.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "sending notifications over SMTP");
            Arc::new(SmtpNotifier::new(smtp)?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set; notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    tracing::info!(
        cancel_requires_ownership = cfg.policy.cancel_requires_ownership,
        reschedule_conflicts = ?cfg.policy.reschedule_conflicts,
        "scheduling policy"
    );

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        notifier,
        policy: cfg.policy,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
