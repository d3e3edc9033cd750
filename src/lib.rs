pub mod application;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod openapi;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::VoucherService;
use config::AppConfig;
use domain::errors::DomainError;
use infrastructure::{
    ChatNotifier, HttpTableClient, MemoryTableClient, TableBackend, TableNames,
    TableVoucherRepository,
};

/// The lifecycle manager as wired for the HTTP surface.
pub type AppService = VoucherService<TableVoucherRepository<TableBackend>, ChatNotifier>;

const JSON_LIMIT: usize = 4 * 1024 * 1024;

/// Wires the service to the remote table API, or to the in-memory store when
/// no API credentials are configured.
pub fn build_service(config: &AppConfig) -> Result<AppService, DomainError> {
    let notifier = ChatNotifier::new(&config.chat_api_url, config.chat.clone());
    let backend = match &config.table_api {
        Some(api) => TableBackend::Remote(HttpTableClient::new(
            &api.base_url,
            &api.app_id,
            &api.access_key,
        )?),
        None => {
            log::warn!("TABLE_APP_ID/TABLE_ACCESS_KEY not set, vouchers are kept in memory only");
            TableBackend::Memory(Arc::new(config.tables.memory_client()))
        }
    };
    Ok(VoucherService::new(
        TableVoucherRepository::new(backend, config.tables.clone()),
        notifier,
    ))
}

/// Service over a fresh in-memory store; the returned handle reaches the
/// same tables.
pub fn in_memory_service(
    tables: TableNames,
    notifier: ChatNotifier,
) -> (Arc<MemoryTableClient>, AppService) {
    let client = Arc::new(tables.memory_client());
    let repo = TableVoucherRepository::new(TableBackend::Memory(Arc::clone(&client)), tables);
    (client, VoucherService::new(repo, notifier))
}

/// Registers the voucher routes, JSON limits and API docs on an app.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(JSON_LIMIT))
        .configure(handlers::vouchers::configure)
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    service: web::Data<AppService>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(Logger::default())
            .configure(configure_app)
    })
    .bind((host.to_string(), port))?
    .run())
}
