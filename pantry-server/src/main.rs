mod auth;
mod config;
mod db;
mod handlers;
mod models;
mod store;
mod templates;
mod theme;

use actix_files::Files;
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{web, App, HttpServer, middleware::Logger};
use anyhow::Result;
use pantry_core::{ExpiryAggregator, ItemStore, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub items: Arc<dyn ItemStore>,
    pub aggregator: ExpiryAggregator,
    pub config: Arc<config::Config>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::Config::from_env()?;

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    // Run migrations
    sqlx::migrate!()
        .run(&db_pool)
        .await?;

    let items: Arc<dyn ItemStore> =
        Arc::new(store::PgItemStore::start(db_pool.clone(), &config.database_url).await?);
    let aggregator = ExpiryAggregator::new(Arc::clone(&items), Arc::new(SystemClock))
        .with_horizon(config.expiry_horizon_days);
    let session_key = config.session_key();

    let state = AppState {
        db_pool,
        items,
        aggregator,
        config: Arc::new(config.clone()),
    };

    log::info!(
        "Starting server at http://{}:{} (expiry horizon {} days)",
        config.host,
        config.port,
        config.expiry_horizon_days
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
                    .cookie_secure(state.config.cookie_secure)
                    .build()
            )
            .service(Files::new("/static", &state.config.static_dir))
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
