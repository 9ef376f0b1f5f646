use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use chatgate::api::{self, middleware::RateLimit};
use chatgate::cli::{
    commands::{Cli, Commands},
    run_sessions,
};
use chatgate::config::AppConfig;
use chatgate::proxy::GatewayClient;
use chatgate::storage::StorageServiceFactory;
use chatgate::tools::{FetchPageTool, SearchTool, Tool, ToolRegistry};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(Commands::Sessions { action }) = cli.command {
        if let Err(e) = run_sessions(action, &config).await {
            error!("Session command failed: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting chatgate...");

    let factory = match StorageServiceFactory::from_config(&config) {
        Ok(f) => web::Data::new(f),
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };

    let gateway = GatewayClient::new(&config.gateway);
    if !gateway.is_configured() {
        warn!("No gateway url configured, chat completions will fail");
    }
    let gateway = web::Data::new(gateway);

    let (search, fetch_page) = match (SearchTool::new(&config.search.base_url), FetchPageTool::new()) {
        (Ok(s), Ok(f)) => (Arc::new(s), Arc::new(f)),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to initialize tools: {}", e);
            std::process::exit(1);
        }
    };
    let registry = web::Data::new(ToolRegistry::new(vec![
        search.clone() as Arc<dyn Tool>,
        fetch_page.clone() as Arc<dyn Tool>,
    ]));
    let search = web::Data::from(search);
    let fetch_page = web::Data::from(fetch_page);

    let rate_limit = RateLimit::from_config(&config.rate_limit);
    if config.rate_limit.enabled {
        info!(
            window_ms = config.rate_limit.window_ms,
            max_requests = config.rate_limit.max_requests,
            "Rate limiting enabled"
        );
    }

    info!(storage_type = %config.storage_type(), "Storage backend selected");

    let host = config.server.host.clone();
    let port = config.server.port;
    let config = web::Data::new(config);

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(config.clone())
            .app_data(factory.clone())
            .app_data(gateway.clone())
            .app_data(registry.clone())
            .app_data(search.clone())
            .app_data(fetch_page.clone())
            .configure(api::configure(rate_limit.clone()))
    })
    .bind((host, port))?
    .run()
    .await
}
