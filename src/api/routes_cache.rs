use actix_web::{delete, get, post, web, HttpResponse, Result as WebResult};
use serde_json::{json, Value};
use tracing::error;

use crate::api::middleware::UserIdentity;
use crate::api::models::{ActiveIdRequest, SessionsBlobRequest};
use crate::models::BaseKey;
use crate::storage::StorageServiceFactory;

const DEFAULT_ACTIVE_ID: &str = "1";

fn unavailable() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(json!({ "error": "Redis service unavailable" }))
}

fn failed(message: &str) -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(json!({ "error": message }))
}

// --- Active chat id ---

#[get("/active-id")]
pub async fn get_active_id(
    factory: web::Data<StorageServiceFactory>,
    identity: UserIdentity,
) -> WebResult<HttpResponse> {
    let store = factory.cache_store();
    if !store.is_available() {
        return Ok(unavailable());
    }

    match store.get(identity.user_id(), BaseKey::ActiveChatId).await {
        Ok(value) => {
            let id = value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_ACTIVE_ID.to_string());
            Ok(HttpResponse::Ok().json(json!({ "id": id })))
        }
        Err(e) => {
            error!(error = %e, user_id = ?identity.user_id(), "Failed to get active chat ID");
            Ok(failed("Failed to get active chat ID"))
        }
    }
}

#[post("/active-id")]
pub async fn save_active_id(
    factory: web::Data<StorageServiceFactory>,
    identity: UserIdentity,
    req: web::Json<ActiveIdRequest>,
) -> WebResult<HttpResponse> {
    let store = factory.cache_store();
    if !store.is_available() {
        return Ok(unavailable());
    }

    match store.set(identity.user_id(), BaseKey::ActiveChatId, &req.id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => {
            error!(error = %e, user_id = ?identity.user_id(), "Failed to save active chat ID");
            Ok(failed("Failed to save active chat ID"))
        }
    }
}

// --- Session blob ---

#[get("/sessions")]
pub async fn get_sessions(
    factory: web::Data<StorageServiceFactory>,
    identity: UserIdentity,
) -> WebResult<HttpResponse> {
    let store = factory.cache_store();
    if !store.is_available() {
        return Ok(unavailable());
    }

    let raw = match store.get(identity.user_id(), BaseKey::ChatSessions).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, user_id = ?identity.user_id(), "Failed to get chat sessions");
            return Ok(failed("Failed to get chat sessions"));
        }
    };

    let sessions = match raw.as_deref() {
        None | Some("") => Value::Array(Vec::new()),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(error = %e, user_id = ?identity.user_id(), "Stored chat sessions are not valid JSON");
                return Ok(failed("Failed to get chat sessions"));
            }
        },
    };

    Ok(HttpResponse::Ok().json(json!({ "sessions": sessions })))
}

#[post("/sessions")]
pub async fn save_sessions(
    factory: web::Data<StorageServiceFactory>,
    identity: UserIdentity,
    req: web::Json<SessionsBlobRequest>,
) -> WebResult<HttpResponse> {
    let store = factory.cache_store();
    if !store.is_available() {
        return Ok(unavailable());
    }

    // Clients usually send the list pre-serialized; a raw list is stored as JSON.
    let value = match &req.value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    match store.set(identity.user_id(), BaseKey::ChatSessions, &value).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => {
            error!(error = %e, user_id = ?identity.user_id(), "Failed to save chat sessions");
            Ok(failed("Failed to save chat sessions"))
        }
    }
}

#[delete("/sessions")]
pub async fn delete_sessions(
    factory: web::Data<StorageServiceFactory>,
    identity: UserIdentity,
) -> WebResult<HttpResponse> {
    let store = factory.cache_store();
    if !store.is_available() {
        return Ok(unavailable());
    }

    match store.delete(identity.user_id(), BaseKey::ChatSessions).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => {
            error!(error = %e, user_id = ?identity.user_id(), "Failed to delete chat sessions");
            Ok(failed("Failed to delete chat sessions"))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/storage")
            .service(get_active_id)
            .service(save_active_id)
            .service(get_sessions)
            .service(save_sessions)
            .service(delete_sessions),
    );
}
