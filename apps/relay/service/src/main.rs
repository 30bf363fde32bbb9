use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use toaklink_relay_service::build_router;
use toaklink_relay_service::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter.clone()))
        .init();

    if config.api_key_pepper.is_none() {
        tracing::warn!(
            "TL_RELAY_API_KEY_PEPPER is not set; every signed route will fail closed"
        );
    }

    let bind_addr = config.bind_addr;
    let app = build_router(config);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, %bind_addr, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%bind_addr, "toaklink relay listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(error) = serve.await {
        tracing::error!(%error, "server exited with error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install ctrl-c handler; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
