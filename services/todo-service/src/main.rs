use clap::Parser;
use std::sync::Arc;
use storeguard_datastore::{ConnectionInitializer, Datastore, PgConnector};
use todo_service::config::Cli;
use todo_service::{telemetry, AppState, PgTodoStore};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    telemetry::init_logging(cli.log_format)?;
    let metrics = telemetry::install_metrics()?;

    let db_config = cli.database.load()?;
    tracing::info!(config = ?db_config, "database configuration loaded");

    let router = match ConnectionInitializer::new(PgConnector).initialize(&db_config).await {
        Ok(router) => router,
        Err(e) => {
            tracing::error!(error = %e, "cannot start without the primary database");
            std::process::exit(1);
        }
    };
    tracing::info!(
        replica = router.replica_status().as_str(),
        reads_use_primary = router.reads_use_primary(),
        "database connections established"
    );
    let datastore = Datastore::new(router);

    let state = AppState::new(Arc::new(PgTodoStore::new(datastore.clone())))
        .with_metrics(metrics)
        .expose_errors(cli.expose_errors);
    let app = todo_service::router(state, &cli.templates_dir, &cli.static_dir);

    let listener = TcpListener::bind(("0.0.0.0", cli.port)).await?;
    tracing::info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    datastore.close();
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
