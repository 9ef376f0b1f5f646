pub mod middleware;
pub mod models;
pub mod models_openai;
pub mod routes;
pub mod routes_cache;
pub mod routes_openai;
pub mod routes_tools;

use actix_web::{web, HttpResponse, Responder};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::api::middleware::RateLimit;

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "service": "ui"
    }))
}

/// Mounts every route. Only the `/api/v1` scope sits behind the rate limiter.
pub fn configure(rate_limit: RateLimit) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.route("/health", web::get().to(health))
            .route("/api/health", web::get().to(health))
            .configure(routes_cache::configure)
            .service(
                web::scope("/api/v1")
                    .wrap(rate_limit)
                    .configure(routes::configure)
                    .configure(routes_openai::configure)
                    .configure(routes_tools::configure),
            );
    }
}
