mod config;
mod detection;
mod feedback;
mod models;
mod reality;
mod routes;
mod video;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use config::AppConfig;
use detection::{ImageDetector, RemoteFetcher, VideoDetector};
use feedback::feedback_service::FeedbackService;
use reality::RealityAssessor;
use routes::{UploadLimits, configure_routes};
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let captioner = match models::load_captioner(&config) {
        Ok(captioner) => {
            log::info!("Captioning endpoint configured");
            Some(captioner)
        }
        Err(e) => {
            log::warn!("Contextual check disabled: {}", e);
            None
        }
    };

    let image_detector = Arc::new(ImageDetector::new(
        models::load_classifier(&config),
        RealityAssessor::new(captioner),
        RemoteFetcher::new(Duration::from_secs(config.fetch.timeout_secs)),
        config.reality.check_remote_images,
    ));
    let video_detector = web::Data::new(VideoDetector::new(
        image_detector.clone(),
        config.video.clone(),
    ));
    let image_detector = web::Data::from(image_detector);
    let feedback_service = web::Data::new(FeedbackService::new(config.feedback.path.clone()));
    let upload_limits = web::Data::new(UploadLimits {
        max_bytes: config.server.max_upload_bytes,
    });

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
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
            .app_data(image_detector.clone())
            .app_data(video_detector.clone())
            .app_data(feedback_service.clone())
            .app_data(upload_limits.clone())
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
