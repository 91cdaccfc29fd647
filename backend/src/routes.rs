use actix_files::{Files, NamedFile};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use shared::{HealthResponse, PredictionResponse, ServiceStatus};
use std::path::PathBuf;

use crate::error::{ApiError, UploadError};
use crate::pipeline::{InferenceError, InferencePipeline, UploadedAsset};

/// Multipart part holding the image.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

#[derive(Debug, Clone)]
struct StaticDir(PathBuf);

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: Option<PathBuf>) {
    cfg.service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/health").route(web::get().to(health)));

    match static_dir {
        Some(dir) if dir.is_dir() => {
            cfg.app_data(web::Data::new(StaticDir(dir.clone())))
                .service(web::resource("/").route(web::get().to(index)))
                .service(Files::new("/static", dir));
        }
        Some(dir) => {
            log::warn!("Static directory {} not found, not serving it", dir.display());
        }
        None => {}
    }
}

async fn predict(
    pipeline: web::Data<InferencePipeline>,
    limit: web::Data<UploadLimit>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let asset = read_upload(&mut payload, limit.0).await?;

    let pipeline = pipeline.into_inner();
    let result = web::block(move || pipeline.handle(asset))
        .await
        .map_err(|e| InferenceError::Unclassified(e.to_string()))??;

    Ok(HttpResponse::Ok().json(PredictionResponse::from(result)))
}

/// Reads the first `file` part into memory, enforcing the size limit while streaming.
async fn read_upload(payload: &mut Multipart, limit: usize) -> Result<UploadedAsset, UploadError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| UploadError::Malformed(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_default();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| UploadError::Malformed(e.to_string()))?;
            if bytes.len() + data.len() > limit {
                return Err(UploadError::TooLarge { limit });
            }
            bytes.extend_from_slice(&data);
        }

        let asset = UploadedAsset::new(bytes, content_type);
        return Ok(match file_name {
            Some(name) => asset.with_file_name(name),
            None => asset,
        });
    }
    Err(UploadError::MissingFile)
}

async fn health(pipeline: web::Data<InferencePipeline>) -> HttpResponse {
    let model_loaded = pipeline.model_loaded();
    let status = if model_loaded {
        ServiceStatus::Healthy
    } else {
        ServiceStatus::Degraded
    };
    HttpResponse::Ok().json(HealthResponse {
        status,
        model_loaded,
    })
}

async fn index(dir: web::Data<StaticDir>) -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open_async(dir.0.join("index.html")).await?)
}
