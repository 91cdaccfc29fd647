mod config;
mod error;
mod pipeline;
mod routes;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use config::ServiceConfig;
use pipeline::{ClassTaxonomy, Classifier, InferencePipeline};
use routes::{UploadLimit, configure_routes};
use std::env;
use std::sync::Arc;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[cfg(feature = "torch")]
fn load_classifier(
    config: &ServiceConfig,
    taxonomy: &ClassTaxonomy,
) -> std::io::Result<Arc<dyn Classifier>> {
    let model = pipeline::classifier::TorchClassifier::load(&config.model_path, taxonomy.len())
        .map_err(|e| startup_error("Model loading failed", e))?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "torch"))]
fn load_classifier(
    config: &ServiceConfig,
    _taxonomy: &ClassTaxonomy,
) -> std::io::Result<Arc<dyn Classifier>> {
    Err(startup_error(
        "Model loading failed",
        format!(
            "cannot load {} without the `torch` feature",
            config.model_path.display()
        ),
    ))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = ServiceConfig::load().map_err(|e| startup_error("Invalid configuration", e))?;
    let taxonomy = ClassTaxonomy::new(&config.class_names)
        .map_err(|e| startup_error("Invalid class taxonomy", e))?;
    log::info!("Class taxonomy: {}", config.class_names.join(", "));

    let classifier = load_classifier(&config, &taxonomy)?;
    let pipeline = web::Data::new(InferencePipeline::new(classifier, Arc::new(taxonomy)));
    let upload_limit = web::Data::new(UploadLimit(config.max_upload_bytes));

    let bind_address = config.bind_address();
    let static_dir = config.static_dir.clone();
    log::info!("Starting server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(pipeline.clone())
            .app_data(upload_limit.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await
}
