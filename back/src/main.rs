mod auth;
mod config;
mod error;
#[cfg(feature = "metrics")]
mod metrics;
mod persistence;
#[cfg(test)]
mod test_support;
mod todo;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    auth::{Authorizer, IntrospectionAuthorizer},
    config::{Config, LogFormat},
    persistence::ToDoEntityManager,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let config = Config::parse();
    init_tracing(config.log_format);

    let manager = ToDoEntityManager::connect(&config.db).await?;

    #[cfg(feature = "metrics")]
    let metrics = Arc::new(metrics::Metrics::new()?);
    #[cfg(feature = "metrics")]
    let manager = manager.metered(metrics.clone());

    let authorizer: Arc<dyn Authorizer> =
        Arc::new(IntrospectionAuthorizer::from_config(&config.auth));

    let state = Arc::new(AppState {
        manager: manager.clone(),
    });

    let app = Router::new().nest("/api", todo::router(&authorizer));

    #[cfg(feature = "metrics")]
    let app = metrics::instrument(app, metrics);

    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    let handle = Handle::new();
    tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

    let addr = SocketAddr::from(([0; 4], config.port));

    match (&config.tls_cert, &config.tls_key) {
        (Some(cert), Some(key)) => {
            // reqwest and axum-server pull in different rustls backends
            let _ = rustls::crypto::ring::default_provider().install_default();

            let tls = RustlsConfig::from_pem_file(cert, key).await?;

            info!(%addr, "serving https");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        _ => {
            info!(%addr, "serving http");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    manager.close().await;
    info!("server stopped");

    Ok(())
}

#[derive(Debug)]
pub struct AppState {
    pub manager: ToDoEntityManager,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn shutdown_on_ctrl_c(handle: Handle) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {:?}", err);
        return;
    }

    info!("shutting down");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
