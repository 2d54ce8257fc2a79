mod config;
mod publish;
mod services;
mod site;
mod state;
#[cfg(test)]
mod testing;

use crate::config::Config;
use crate::state::AppState;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use env_logger::Env;
use log::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = Config::parse();

    let state = AppState::from_config(&config).map_err(|e| {
        error!("Startup failed: {e}");
        std::io::Error::other(e.to_string())
    })?;

    info!(
        "Serving {} (locator table v{})",
        state.site.document_path().display(),
        site::locators::LOCATOR_TABLE_VERSION
    );
    info!("Server running at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(services::json_config())
            .app_data(web::Data::new(state.clone()))
            .service(services::configure_routes())
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
