use actix_web::{
    get,
    http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
    http::StatusCode,
    post, web, HttpResponse, Result as WebResult,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::api::models_openai::ChatCompletionRequest;
use crate::proxy::{GatewayClient, ProxyError};

fn proxy_error(e: ProxyError) -> HttpResponse {
    match e {
        ProxyError::MissingGatewayUrl => {
            error!("Gateway URL is not configured");
            HttpResponse::InternalServerError()
                .json(json!({ "error": "Gateway URL configuration missing" }))
        }
        ProxyError::Upstream { status, body } => {
            let status = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            error!(status = status.as_u16(), body = %body, "Gateway returned an error");
            HttpResponse::build(status).json(json!({
                "error": format!("Upstream gateway error: {}", status),
                "status": status.as_u16(),
            }))
        }
        ProxyError::EmptyBody => HttpResponse::BadGateway().json(json!({
            "error": "Upstream gateway returned no response body",
            "status": StatusCode::BAD_GATEWAY.as_u16(),
        })),
        ProxyError::Transport(e) => {
            error!(error = %e, "Failed to connect to inference gateway");
            HttpResponse::BadGateway().json(json!({
                "error": "Failed to connect to inference gateway",
                "status": StatusCode::BAD_GATEWAY.as_u16(),
            }))
        }
    }
}

/// Relays a streamed completion from the gateway byte-for-byte.
#[post("/chat/completions")]
pub async fn chat_completions(gateway: web::Data<GatewayClient>, body: Bytes) -> WebResult<HttpResponse> {
    let request: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Rejected malformed chat completion request");
            return Ok(HttpResponse::BadRequest().json(json!({ "error": "Invalid request body" })));
        }
    };

    if !request.is_streaming() {
        return Ok(HttpResponse::BadRequest().json(json!({ "error": "Only streaming requests are supported" })));
    }

    debug!(
        model = %request.model,
        messages = request.messages.len(),
        "Starting chat completions request"
    );

    let upstream = match gateway.stream_chat_completion(body).await {
        Ok(resp) => resp,
        Err(e) => return Ok(proxy_error(e)),
    };

    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/event-stream"))
        .insert_header((CACHE_CONTROL, "no-cache, no-transform"))
        .insert_header((CONNECTION, "keep-alive"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(upstream.bytes_stream()))
}

#[get("/models")]
pub async fn list_models(gateway: web::Data<GatewayClient>) -> WebResult<HttpResponse> {
    match gateway.list_models().await {
        Ok(models) => Ok(HttpResponse::Ok().json(models)),
        Err(ProxyError::MissingGatewayUrl) => Ok(proxy_error(ProxyError::MissingGatewayUrl)),
        Err(e) => {
            error!(error = %e, "Error fetching models from gateway");
            Ok(HttpResponse::InternalServerError()
                .json(json!({ "error": "Failed to fetch models from inference gateway" })))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chat_completions).service(list_models);
}
