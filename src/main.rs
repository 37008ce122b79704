use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{http, App, HttpServer};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use services::db_utils::{init_store, AppState};
use settings::Settings;
use types::StartupError;

mod error;
mod services;
mod settings;
mod types;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[actix_web::main]
async fn main() -> Result<(), StartupError> {
    dotenv().ok();
    init_tracing();

    let settings = Settings::load()?;
    let store = init_store(&settings).await?;
    let state = Data::new(AppState::new(store, settings.strict_not_found));

    info!(host = %settings.bind_host, port = settings.port, "starting http server");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PATCH"])
            .allowed_headers(vec![http::header::CONTENT_TYPE, http::header::ACCEPT])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(services::configure)
    })
    .bind((settings.bind_host.as_str(), settings.port))?
    .run()
    .await?;

    Ok(())
}
