use crate::config::Config;
use crate::ort_service::OrtModelService;
use crate::server::HttpServer;

use std::error::Error;
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    // a missing or unloadable model is not fatal: the service stays up and
    // serves fallback predictions instead
    let model_service = match OrtModelService::new(&config.model) {
        Ok(service) => {
            tracing::info!("Model loaded from {:?}", config.model.get_model_path());
            Some(service)
        }
        Err(e) => {
            tracing::error!(
                "Failed to load model from {:?}, serving fallback predictions: {}",
                config.model.get_model_path(),
                e
            );
            None
        }
    };

    let server = HttpServer::new(model_service, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
