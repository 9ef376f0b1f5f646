use actix_web::{get, post, web, HttpResponse, Result as WebResult};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::api::models::{FetchPageQuery, SearchQuery};
use crate::tools::{FetchPageTool, SearchTool, ToolRegistry};

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[get("")]
pub async fn list_tools(registry: web::Data<ToolRegistry>) -> WebResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({ "tools": registry.get_definitions() })))
}

#[post("/call")]
pub async fn call_tool(
    registry: web::Data<ToolRegistry>,
    req: web::Json<ToolCallRequest>,
) -> WebResult<HttpResponse> {
    let req = req.into_inner();
    match registry.call_tool(&req.name, &req.arguments).await {
        Some(result) => Ok(HttpResponse::Ok().json(result)),
        None => {
            warn!(tool = %req.name, "Unknown tool requested");
            Ok(HttpResponse::NotFound().json(json!({ "error": format!("Tool '{}' not found", req.name) })))
        }
    }
}

#[get("/search")]
pub async fn search(
    tool: web::Data<SearchTool>,
    query: web::Query<SearchQuery>,
) -> WebResult<HttpResponse> {
    let Some(q) = query.query.as_deref().filter(|q| !q.is_empty()) else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Query parameter is required",
            "results": []
        })));
    };

    Ok(HttpResponse::Ok().json(tool.search(q, query.limit()).await))
}

#[get("/fetch-page")]
pub async fn fetch_page(
    tool: web::Data<FetchPageTool>,
    query: web::Query<FetchPageQuery>,
) -> WebResult<HttpResponse> {
    let Some(url) = query.url.as_deref().filter(|u| !u.is_empty()) else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "URL parameter is required",
            "title": "",
            "content": ""
        })));
    };

    Ok(HttpResponse::Ok().json(tool.fetch(url).await))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tools")
            .service(list_tools)
            .service(call_tool)
            .service(search)
            .service(fetch_page),
    );
}
