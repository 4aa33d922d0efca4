//! HTTP routes: the inference endpoint, the liveness probe, and the static
//! landing page.

use super::protocol::{HealthResponse, InferenceRequest, InferenceResult};
use super::WebError;
use crate::pipeline;
use crate::torch::ModelContext;
use actix_web::http::header::ContentType;
use actix_web::{get, post, web, HttpResponse, Responder};
use std::sync::Arc;
use tracing::info;

/// Shared per-process state: the model context and the outbound HTTP client.
pub struct AppState {
    pub ctx: Arc<ModelContext>,
    pub client: reqwest::Client,
}

/// Snapshot of device capabilities taken at startup for the probe endpoint.
#[derive(Debug, Clone)]
pub struct HealthInfo {
    pub device: String,
    pub cuda_available: bool,
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>vqaserve</title></head>
<body>
<h1>vqaserve</h1>
<p>Visual question answering. POST {"image_url", "question"} to /predict.</p>
</body>
</html>
"#;

/// Handle an inference request end to end.
#[post("/predict")]
pub async fn predict(
    req: web::Json<InferenceRequest>,
    state: web::Data<AppState>,
) -> Result<impl Responder, WebError> {
    info!(url = %req.image_url, "got inference request");
    let answer = pipeline::run(&state.client, state.ctx.clone(), req.into_inner()).await?;
    Ok(web::Json(InferenceResult { answer }))
}

/// Liveness probe: which device is in use and which runtime backs it.
#[get("/test")]
pub async fn health(info: web::Data<HealthInfo>) -> impl Responder {
    web::Json(HealthResponse {
        status: "ok".into(),
        device: info.device.clone(),
        cuda_available: info.cuda_available,
        runtime: crate::RUNTIME_VERSION.into(),
    })
}

/// Static informational page.
#[get("/")]
pub async fn home() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(INDEX_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn health_reports_device_and_runtime() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(HealthInfo {
                    device: "cpu".into(),
                    cuda_available: false,
                }))
                .service(health),
        )
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.device, "cpu");
        assert!(!body.cuda_available);
        assert_eq!(body.runtime, crate::RUNTIME_VERSION);
    }

    #[actix_web::test]
    async fn home_serves_the_landing_page() {
        let app = test::init_service(App::new().service(home)).await;
        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("/predict"));
    }
}
