use actix_web::{web, App, HttpServer};
use formdb::{FormSchema, RecordStore, StoreConfig, Validator};
use std::sync::{Arc, RwLock};

mod config;
mod handlers;

use config::ServerConfig;

/// Shared application state.
///
/// The store sits behind a `RwLock`: writes (append, update, delete) are
/// serialized, and queries read the collection under a read guard so they
/// never observe a half-applied mutation. The validator is compiled once and
/// shares the served schema.
pub struct AppState {
    pub schema: Arc<FormSchema>,
    pub validator: Validator,
    pub store: RwLock<RecordStore>,
    pub revalidate_updates: bool,
}

impl AppState {
    pub fn new(schema: FormSchema, config: &ServerConfig) -> formdb::Result<Self> {
        let schema = Arc::new(schema);
        let validator = Validator::new(Arc::clone(&schema))?.with_mode(config.error_mode);

        Ok(AppState {
            schema,
            validator,
            store: RwLock::new(RecordStore::with_config(StoreConfig {
                id_strategy: config.id_strategy,
            })),
            revalidate_updates: config.revalidate_updates,
        })
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    log::info!("Starting FormDB server");

    let config = ServerConfig::from_env();

    match &config.schema_path {
        Some(path) => log::info!("Loading schema from: {path}"),
        None => log::info!("Using bundled schema"),
    }
    let state = config
        .load_schema()
        .and_then(|schema| AppState::new(schema, &config))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    log::info!(
        "Serving form '{}' with {} fields",
        state.schema.title,
        state.schema.fields.len()
    );
    let state = web::Data::new(state);

    let cors_origin = config.cors_origin.clone();
    match &cors_origin {
        Some(origin) => log::info!("CORS allowed origin: {origin}"),
        None => log::info!("CORS allows any origin"),
    }

    log::info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(handlers::cors(cors_origin.as_deref()))
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
