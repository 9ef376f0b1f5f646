use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::tools::{FunctionDefinition, Tool, ToolDefinition, ToolError, BROWSER_USER_AGENT};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const SEARCH_HOST: &str = "https://html.duckduckgo.com";
const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Body of the search endpoint. Only `query` is always present.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl SearchResponse {
    fn found(query: &str, results: Vec<SearchResult>) -> Self {
        Self {
            query: query.to_string(),
            results: Some(results),
            source: Some("duckduckgo"),
            error: None,
        }
    }

    fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            results: None,
            source: None,
            error: None,
        }
    }

    fn failed(query: &str) -> Self {
        Self {
            query: query.to_string(),
            results: None,
            source: None,
            error: Some("Search service unavailable"),
        }
    }
}

#[derive(Deserialize)]
struct SearchArguments {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// Web search backed by the DuckDuckGo HTML endpoint.
pub struct SearchTool {
    client: Client,
    base_url: String,
}

impl SearchTool {
    pub fn new(base_url: &str) -> Result<Self, ToolError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(SEARCH_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Never fails: transport and parse problems come back as a degraded body.
    pub async fn search(&self, query: &str, limit: usize) -> SearchResponse {
        match self.scrape_search_results(query, limit).await {
            Ok(results) if results.is_empty() => {
                warn!(query, "No search results found");
                SearchResponse::empty(query)
            }
            Ok(results) => SearchResponse::found(query, results),
            Err(e) => {
                error!(error = %e, query, "Error during server-side web search");
                SearchResponse::failed(query)
            }
        }
    }

    async fn scrape_search_results(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ToolError> {
        let url = format!(
            "{}/html/?q={}&limit={}",
            self.base_url,
            urlencoding::encode(query),
            limit
        );
        debug!(url = %url, "Server-side search request");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/html")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::Status(response.status().as_u16()));
        }

        let html = response.text().await?;
        parse_results(&html, limit)
    }
}

fn selector(css: &str) -> Result<Selector, ToolError> {
    Selector::parse(css).map_err(|e| ToolError::Parse(format!("{}: {:?}", css, e)))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// DuckDuckGo wraps targets as `/l/?uddg=<encoded>`; returns the decoded target.
fn decode_redirect(href: &str) -> Option<String> {
    let base = Url::parse(SEARCH_HOST).ok()?;
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())
}

/// Extracts up to `limit` results from a DuckDuckGo HTML page, falling back to
/// plain outbound links when the result markup is missing.
pub fn parse_results(html: &str, limit: usize) -> Result<Vec<SearchResult>, ToolError> {
    let document = Html::parse_document(html);
    let result_sel = selector(".result")?;
    let title_sel = selector(".result__title")?;
    let anchor_sel = selector("a")?;
    let url_sel = selector(".result__url")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        if results.len() >= limit {
            break;
        }

        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };
        let title_link = title_el.select(&anchor_sel).next();
        let title = title_link.map(text_of).unwrap_or_default();

        let mut url = if let Some(link) = element.select(&url_sel).next() {
            let shown = text_of(link);
            if shown.starts_with("http") {
                shown
            } else {
                format!("https://{}", shown)
            }
        } else if let Some(link) = title_link {
            link.value().attr("href").unwrap_or_default().to_string()
        } else {
            String::new()
        };

        if url.starts_with('/') || url.contains("duckduckgo.com/l/?") {
            match decode_redirect(&url) {
                Some(target) => url = target,
                None => debug!(url = %url, "Failed to parse URL"),
            }
        }

        let snippet = element.select(&snippet_sel).next().map(text_of).unwrap_or_default();

        if !title.is_empty() && !url.is_empty() {
            results.push(SearchResult { title, url, snippet });
        }
    }

    debug!(count = results.len(), "Found search results");

    if results.is_empty() {
        debug!("No results found with primary selector, trying fallback selectors");
        let fallback_sel = selector(r#"a[href^="http"]"#)?;

        for link in document.select(&fallback_sel) {
            if results.len() >= limit {
                break;
            }
            let title = text_of(link);
            let url = link.value().attr("href").unwrap_or_default();
            if title.chars().count() > 15 && url.starts_with("http") {
                results.push(SearchResult {
                    title,
                    url: url.to_string(),
                    snippet: String::new(),
                });
            }
        }

        debug!(count = results.len(), "Found results with fallback selector");
    }

    Ok(results)
}

#[async_trait]
impl Tool for SearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: "web_search".to_string(),
                description: "Search the web for information.".to_string(),
                strict: Some(true),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query."
                        }
                    },
                    "required": ["query"]
                }),
            },
        }
    }

    async fn call(&self, arguments: &Value) -> Value {
        let args: SearchArguments = match serde_json::from_value(arguments.clone()) {
            Ok(a) => a,
            Err(e) => return json!({ "error": format!("Error parsing arguments: {}", e) }),
        };

        let response = self.search(&args.query, args.limit.unwrap_or(DEFAULT_LIMIT)).await;
        serde_json::to_value(response).unwrap_or_else(|e| json!({ "error": e.to_string() }))
    }
}
