use cider_github_status::config::{DEFAULT_CONFIG_PATH, ServiceConfig, read_config_file};
use cider_github_status::error::Result;
use cider_github_status::ingress::{self, IngressState};
use cider_github_status::logging::setup_logging;
use cider_github_status::{EventBus, GithubStatusClient, StatusNotifier};
use std::sync::Arc;
use tracing::{self, error, info};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Signal received, exiting...");
}

async fn run(config: ServiceConfig) -> Result<()> {
    let client = Arc::new(GithubStatusClient::new(&config.github)?);
    let bus = EventBus::new(config.bus.capacity);

    let notifier = Arc::new(StatusNotifier::new(config.product.clone(), client));
    notifier.subscribe(&bus)?;
    info!(
        "Subscribed to '{}' and '{}'",
        config.product.enqueued_topic(),
        config.product.finished_topic()
    );

    let secret = config.ingress.active_secret().map(str::to_string);
    if secret.is_none() {
        info!("No ingress secret configured, event signatures are not checked");
    }
    let app = ingress::router(Arc::new(IngressState { bus, secret }));

    let listener = tokio::net::TcpListener::bind(config.bind_address.as_str()).await?;
    info!("Listening on {}", config.bind_address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config_path = std::env::var("CIDER_STATUS_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    // Logging is configured from the file, so failures before it exists go to stderr.
    let file_config = match read_config_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    let found = file_config.is_some();
    let mut config = file_config.unwrap_or_default();

    let log_guard = match setup_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Logging setup failed: {}", e);
            std::process::exit(1);
        }
    };

    if found {
        info!("Using config at {:?}", config_path);
    } else {
        info!("No config file at {:?}, using defaults", config_path);
    }

    config.apply_env(|key| std::env::var(key).ok());
    let outcome = match config.validate() {
        Ok(()) => run(config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        error!("{}", e);
        // Flush file logs before exiting.
        drop(log_guard);
        std::process::exit(1);
    }
}
