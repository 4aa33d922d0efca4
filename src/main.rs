use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vqaserve::config::Settings;
use vqaserve::fetch;
use vqaserve::server;
use vqaserve::server::routes::{self, AppState, HealthInfo};
use vqaserve::torch::ModelContext;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load().context("loading configuration")?;
    info!(?settings, "starting vqaserve");

    let ctx = Arc::new(ModelContext::load(&settings)?);
    let health = HealthInfo {
        device: ctx.device_name(),
        cuda_available: tch::Cuda::is_available(),
    };
    let client = fetch::build_client(Duration::from_secs(settings.fetch_timeout_secs))?;
    let state = web::Data::new(AppState { ctx, client });

    let addr = (settings.host.clone(), settings.port);
    info!(host = %settings.host, port = settings.port, "listening");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::Data::new(health.clone()))
            .app_data(web::JsonConfig::default().error_handler(server::json_error_handler))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .service(routes::predict)
            .service(routes::health)
            .service(routes::home)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
