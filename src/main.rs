//! Picture Proxy - on-demand picture transformation server.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use picture_proxy::{
    config::Config,
    create_s3_client,
    server::{create_router, RouterConfig},
    S3ObjectStore, TransformService,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Settings may come from a local .env file, like the environment proper
    let dotenv = dotenvy::dotenv();

    let config = Config::parse();

    init_logging(config.verbose);

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Picture Proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  S3 bucket: {}", config.s3_bucket);
    info!("  S3 prefix: {:?}", config.s3_prefix);
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.s3_region);
    info!(
        "  Timeouts: store {}ms, transform {}ms",
        config.store_timeout_ms, config.transform_timeout_ms
    );

    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
    let store = S3ObjectStore::with_prefix(
        s3_client,
        config.s3_bucket.clone(),
        config.s3_prefix.clone(),
    );

    info!("Connecting to S3...");
    if let Err(e) = store.check_bucket().await {
        error!("  Failed to connect to S3: {}", e);
        error!("  Please check:");
        error!("    - Your AWS credentials are configured correctly");
        error!(
            "    - The bucket '{}' exists and is accessible",
            config.s3_bucket
        );
        error!("    - The S3 endpoint is correct (if using MinIO/custom S3)");
        return ExitCode::FAILURE;
    }
    info!("  Connected successfully");

    let service = TransformService::new(store)
        .with_timeouts(config.store_timeout(), config.transform_timeout());

    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  Try: curl -o out.jpg 'http://{}/pictures/<name>?w=200'", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "picture_proxy=debug,tower_http=debug"
    } else {
        "picture_proxy=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
