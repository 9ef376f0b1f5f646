use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::tools::{FunctionDefinition, Tool, ToolDefinition, ToolError, BROWSER_USER_AGENT};

const FETCH_TIMEOUT: Duration = Duration::from_secs(8);
const MAX_CONTENT_CHARS: usize = 8000;
const TRUNCATION_SUFFIX: &str = "... (content truncated)";

const SKIPPED_ELEMENTS: [&str; 7] = ["script", "style", "iframe", "nav", "footer", "header", "aside"];
const CONTENT_SELECTORS: [&str; 4] = ["article", "main", "#content", ".content"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageContent {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchPageResponse {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub title: String,
    pub content: String,
}

#[derive(Deserialize)]
struct FetchPageArguments {
    url: String,
}

pub struct FetchPageTool {
    client: Client,
}

impl FetchPageTool {
    pub fn new() -> Result<Self, ToolError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> FetchPageResponse {
        debug!(url, "Fetching page content");
        match self.fetch_page(url).await {
            Ok(page) => {
                debug!(url, chars = page.content.chars().count(), "Fetched page content");
                FetchPageResponse {
                    url: url.to_string(),
                    error: None,
                    title: page.title,
                    content: page.content,
                }
            }
            Err(e) => {
                error!(error = %e, url, "Error fetching page content");
                FetchPageResponse {
                    url: url.to_string(),
                    error: Some("Failed to fetch page content"),
                    title: String::new(),
                    content: String::new(),
                }
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<PageContent, ToolError> {
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
        extract_page(&html)
    }
}

fn is_skipped(element: ElementRef<'_>) -> bool {
    SKIPPED_ELEMENTS.contains(&element.value().name())
}

/// True when the element or one of its ancestors is page chrome.
fn is_hidden(element: ElementRef<'_>) -> bool {
    is_skipped(element) || element.ancestors().filter_map(ElementRef::wrap).any(is_skipped)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    if is_skipped(element) {
        return;
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            collect_text(child, out);
        }
    }
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn select_visible<'a>(document: &'a Html, css: &str) -> Result<Vec<ElementRef<'a>>, ToolError> {
    let selector = Selector::parse(css).map_err(|e| ToolError::Parse(format!("{}: {:?}", css, e)))?;
    Ok(document.select(&selector).filter(|el| !is_hidden(*el)).collect())
}

/// Readable title and body text of an HTML page.
///
/// Body text comes from the first of `article`, `main`, `#content`, `.content`
/// present on the page, otherwise from all paragraphs. Whitespace runs collapse
/// to one space and the result is capped at 8000 chars.
pub fn extract_page(html: &str) -> Result<PageContent, ToolError> {
    let document = Html::parse_document(html);

    let title: String = select_visible(&document, "title")?
        .into_iter()
        .map(visible_text)
        .collect::<String>()
        .trim()
        .to_string();

    let mut content = None;
    for css in CONTENT_SELECTORS {
        let matches = select_visible(&document, css)?;
        if !matches.is_empty() {
            content = Some(matches.into_iter().map(visible_text).collect::<String>());
            break;
        }
    }

    let content = match content {
        Some(content) => content,
        None => select_visible(&document, "p")?
            .into_iter()
            .map(|p| visible_text(p).trim().to_string())
            .collect::<Vec<_>>()
            .join("\n\n"),
    };

    Ok(PageContent {
        title,
        content: truncate(collapse_whitespace(&content)),
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(content: String) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content;
    }
    let mut truncated: String = content.chars().take(MAX_CONTENT_CHARS).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}

#[async_trait]
impl Tool for FetchPageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: "fetch_page".to_string(),
                description: "Fetch a web page and return its readable text content.".to_string(),
                strict: Some(true),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "The absolute URL of the page to fetch."
                        }
                    },
                    "required": ["url"]
                }),
            },
        }
    }

    async fn call(&self, arguments: &Value) -> Value {
        let args: FetchPageArguments = match serde_json::from_value(arguments.clone()) {
            Ok(a) => a,
            Err(e) => return json!({ "error": format!("Error parsing arguments: {}", e) }),
        };

        let response = self.fetch(&args.url).await;
        serde_json::to_value(response).unwrap_or_else(|e| json!({ "error": e.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_wins_over_paragraphs() {
        let html = r#"
            <html><head><title> My Page </title><style>body { color: red; }</style></head>
            <body>
              <nav>Home | About</nav>
              <article><h1>Heading</h1><p>First   line.</p>
                <script>var x = 1;</script>
                <p>Second
                line.</p>
              </article>
              <footer>Copyright</footer>
            </body></html>
        "#;
        let page = extract_page(html).unwrap();
        assert_eq!(page.title, "My Page");
        assert_eq!(page.content, "HeadingFirst line. Second line.");
    }

    #[test]
    fn test_paragraph_fallback_skips_chrome() {
        let html = r#"
            <html><body>
              <header><p>Site banner</p></header>
              <p>One.</p>
              <aside><p>Sidebar</p></aside>
              <p>Two.</p>
            </body></html>
        "#;
        let page = extract_page(html).unwrap();
        assert_eq!(page.title, "");
        assert_eq!(page.content, "One. Two.");
    }

    #[test]
    fn test_content_class_selector() {
        let html = r#"<html><body><div class="content">Body text</div><p>ignored</p></body></html>"#;
        let page = extract_page(html).unwrap();
        assert_eq!(page.content, "Body text");
    }

    #[test]
    fn test_truncation_suffix() {
        let long = "word ".repeat(3000);
        let html = format!("<html><body><main>{}</main></body></html>", long);
        let page = extract_page(&html).unwrap();
        assert!(page.content.ends_with(TRUNCATION_SUFFIX));
        assert_eq!(page.content.chars().count(), MAX_CONTENT_CHARS + TRUNCATION_SUFFIX.chars().count());
    }
}
