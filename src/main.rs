use actix_web::web;
use dotenvy::dotenv;
use voucher_service::config::AppConfig;
use voucher_service::{build_server, build_service};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().expect("Invalid configuration");
    let service = build_service(&config).expect("Failed to set up the table service");

    if let Err(e) = service.refresh().await {
        log::warn!("Initial voucher load failed, starting with empty state: {}", e);
    }

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(web::Data::new(service), &config.host, config.port)?.await
}
