use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{anyhow, Context};
use dotenv::dotenv;
use fulfillment_engine::{
    auth::JwtVerifier,
    chain,
    config::{Config, LoggingConfig},
    database::{self, Database, FulfillmentStore},
    handlers,
    services::FulfillmentService,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    init_tracing(&config.logging);
    info!(
        "Starting Fulfillment Engine {} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port
    );

    let pool = database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    if config.database.run_migrations {
        database::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;
    }
    let store: Arc<dyn FulfillmentStore> = Arc::new(Database::new(pool));

    let resolver = chain::build_resolver(&config)
        .await
        .context("Failed to build transaction resolver")?;

    let service = Arc::new(FulfillmentService::new(
        resolver,
        store,
        config.server.default_network.clone(),
    ));
    let verifier = web::Data::new(JwtVerifier::new(&config.auth.jwt_secret));

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(service.clone()))
            .app_data(verifier.clone())
            .configure(handlers::configure_routes)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
