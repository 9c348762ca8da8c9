use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use deoss_gateway::app_state::AppState;
use deoss_gateway::config::AppConfig;
use deoss_gateway::service;
use deoss_gateway::track::TrackSweeper;

fn init_logging(config_file: &str) {
    if Path::new(config_file).exists() {
        match log4rs::init_file(config_file, Default::default()) {
            Ok(()) => return,
            Err(e) => eprintln!("Failed to load {}: {}, falling back to env_logger", config_file, e),
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::load().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    init_logging(&config.logging.config_file);

    let state = AppState::from_config(config.clone()).map_err(|e| {
        error!("Failed to initialize application state: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let sweeper = TrackSweeper::new(
        Arc::clone(&state.track_store),
        Duration::from_secs(config.track.sweep_interval_secs),
        Duration::from_secs(config.track.retention_secs),
    )
    .start_background();

    info!("Starting server on {}:{}", config.server.host, config.server.port);
    let data = web::Data::new(state);
    let result = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(data.clone())
            .configure(service::configure)
    })
    .workers(config.server.workers.max(1))
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await;

    sweeper.abort();
    if let Err(e) = &result {
        warn!("Server stopped with error: {}", e);
    }
    result
}
