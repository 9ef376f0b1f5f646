use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse, Result as WebResult};
use serde_json::json;
use tracing::{debug, error};

use crate::api::middleware::UserIdentity;
use crate::api::models::{ActiveChatPayload, ChatSessionsPayload, SelectedModelPayload};
use crate::config::AppConfig;
use crate::storage::{StorageError, StorageService, StorageServiceFactory};

/// Per-request storage service, or the `401` to send back when auth is on
/// and the caller sent no token.
fn storage_for(
    factory: &StorageServiceFactory,
    config: &AppConfig,
    identity: &UserIdentity,
) -> Result<Arc<dyn StorageService>, HttpResponse> {
    let Some(user_id) = identity.storage_user(&config.auth) else {
        return Err(HttpResponse::Unauthorized().json(json!({ "error": "Unauthorized" })));
    };
    Ok(factory.create_service(&config.storage_options(Some(user_id))))
}

fn storage_error(e: &StorageError, context: &str) -> HttpResponse {
    error!(error = %e, "{}", context);
    match e {
        StorageError::Validation(message) => {
            HttpResponse::BadRequest().json(json!({ "error": message }))
        }
        StorageError::Unavailable => {
            HttpResponse::ServiceUnavailable().json(json!({ "error": "Storage service unavailable" }))
        }
        _ => HttpResponse::InternalServerError().json(json!({ "error": "Internal server error" })),
    }
}

fn missing_field(field: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "error": format!("{} is required", field) }))
}

// --- Chat sessions ---

#[get("/chat-sessions")]
pub async fn get_chat_sessions(
    factory: web::Data<StorageServiceFactory>,
    config: web::Data<AppConfig>,
    identity: UserIdentity,
) -> WebResult<HttpResponse> {
    let storage = match storage_for(&factory, &config, &identity) {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };

    match storage.get_chat_sessions().await {
        Ok(sessions) => Ok(HttpResponse::Ok().json(ChatSessionsPayload {
            chat_sessions: Some(sessions),
        })),
        Err(e) => Ok(storage_error(&e, "Error fetching chat sessions")),
    }
}

#[post("/chat-sessions")]
pub async fn save_chat_sessions(
    factory: web::Data<StorageServiceFactory>,
    config: web::Data<AppConfig>,
    identity: UserIdentity,
    req: web::Json<ChatSessionsPayload>,
) -> WebResult<HttpResponse> {
    let storage = match storage_for(&factory, &config, &identity) {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };
    let Some(sessions) = req.into_inner().chat_sessions else {
        return Ok(missing_field("chatSessions"));
    };

    debug!(count = sessions.len(), "Saving chat sessions");
    match storage.save_chat_sessions(&sessions).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => Ok(storage_error(&e, "Error saving chat sessions")),
    }
}

// --- Active chat ---

#[get("/active-chat")]
pub async fn get_active_chat(
    factory: web::Data<StorageServiceFactory>,
    config: web::Data<AppConfig>,
    identity: UserIdentity,
) -> WebResult<HttpResponse> {
    let storage = match storage_for(&factory, &config, &identity) {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };

    match storage.get_active_chat_id().await {
        Ok(id) => Ok(HttpResponse::Ok().json(ActiveChatPayload {
            active_chat_id: Some(id),
        })),
        Err(e) => Ok(storage_error(&e, "Error fetching active chat ID")),
    }
}

#[post("/active-chat")]
pub async fn save_active_chat(
    factory: web::Data<StorageServiceFactory>,
    config: web::Data<AppConfig>,
    identity: UserIdentity,
    req: web::Json<ActiveChatPayload>,
) -> WebResult<HttpResponse> {
    let storage = match storage_for(&factory, &config, &identity) {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };
    let Some(id) = req.into_inner().active_chat_id else {
        return Ok(missing_field("activeChatId"));
    };

    match storage.save_active_chat_id(&id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => Ok(storage_error(&e, "Error saving active chat ID")),
    }
}

// --- Selected model ---

#[get("/selected-model")]
pub async fn get_selected_model(
    factory: web::Data<StorageServiceFactory>,
    config: web::Data<AppConfig>,
    identity: UserIdentity,
) -> WebResult<HttpResponse> {
    let storage = match storage_for(&factory, &config, &identity) {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };

    match storage.get_selected_model().await {
        Ok(model) => Ok(HttpResponse::Ok().json(SelectedModelPayload {
            selected_model: Some(model),
        })),
        Err(e) => Ok(storage_error(&e, "Error fetching selected model")),
    }
}

#[post("/selected-model")]
pub async fn save_selected_model(
    factory: web::Data<StorageServiceFactory>,
    config: web::Data<AppConfig>,
    identity: UserIdentity,
    req: web::Json<SelectedModelPayload>,
) -> WebResult<HttpResponse> {
    let storage = match storage_for(&factory, &config, &identity) {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };
    let Some(model) = req.into_inner().selected_model else {
        return Ok(missing_field("selectedModel"));
    };

    match storage.save_selected_model(&model).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => Ok(storage_error(&e, "Error saving selected model")),
    }
}

// --- Config ---

#[get("/config")]
pub async fn storage_config(config: web::Data<AppConfig>) -> WebResult<HttpResponse> {
    let storage_type = config.storage_type();
    debug!(configured = %config.storage.storage_type, %storage_type, "Storage config requested");
    Ok(HttpResponse::Ok().json(json!({ "type": storage_type.as_str() })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/storage")
            .service(get_chat_sessions)
            .service(save_chat_sessions)
            .service(get_active_chat)
            .service(save_active_chat)
            .service(get_selected_model)
            .service(save_selected_model)
            .service(storage_config),
    );
}
