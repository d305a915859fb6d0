use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::ContentResolver;
use crate::config::Config;
use crate::{Result, WikicastError};

/// MediaWiki `action=query` response (formatversion=2)
#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryBody>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    original: Option<ImageSource>,
    thumbnail: Option<ImageSource>,
    extract: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageSource {
    source: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    info: String,
}

/// Wikipedia content resolver backed by the MediaWiki API
pub struct WikipediaClient {
    client: Client,
    api_base: String,
}

impl WikipediaClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: crate::utils::http_client(config)?,
            api_base: config.content.api_base.clone(),
        })
    }

    /// Run a single-title query and return the raw JSON body
    async fn query(&self, title: &str, props: &[(&str, &str)]) -> Result<String> {
        tracing::debug!("Querying {} for '{}' ({:?})", self.api_base, title, props);

        let mut params: Vec<(&str, &str)> = vec![
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
            ("redirects", "1"),
            ("titles", title),
        ];
        params.extend_from_slice(props);

        let response = self
            .client
            .get(&self.api_base)
            .query(&params)
            .send()
            .await
            .map_err(|e| WikicastError::ContentService(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WikicastError::ContentService(format!("HTTP {}", status)).into());
        }

        let body = response.text().await.map_err(|e| {
            WikicastError::ContentService(format!("Failed to read response: {}", e))
        })?;

        Ok(body)
    }
}

/// Pick the single page of a query response, mapping missing/invalid titles to `NotFound`
fn single_page(body: &str, title: &str) -> Result<Page> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|e| WikicastError::ContentService(format!("Malformed response: {}", e)))?;

    if let Some(error) = response.error {
        let message = format!("{}: {}", error.code, error.info);
        return Err(WikicastError::ContentService(message).into());
    }

    let page = response
        .query
        .and_then(|q| q.pages.into_iter().next())
        .ok_or_else(|| WikicastError::NotFound(title.to_string()))?;

    if page.missing || page.invalid {
        return Err(WikicastError::NotFound(title.to_string()).into());
    }

    Ok(page)
}

/// Extract the primary image URL from a `prop=pageimages` response
fn parse_image_url(body: &str, title: &str) -> Result<String> {
    let page = single_page(body, title)?;

    page.original
        .or(page.thumbnail)
        .map(|image| image.source)
        .filter(|source| !source.is_empty())
        .ok_or_else(|| WikicastError::NoImage(page.title).into())
}

/// Extract the plain-text introduction from a `prop=extracts` response
fn parse_summary(body: &str, title: &str) -> Result<String> {
    let page = single_page(body, title)?;
    Ok(page.extract.unwrap_or_default().trim().to_string())
}

#[async_trait]
impl ContentResolver for WikipediaClient {
    async fn resolve_image(&self, title: &str) -> Result<String> {
        let body = self
            .query(title, &[("prop", "pageimages"), ("piprop", "original")])
            .await?;
        parse_image_url(&body, title)
    }

    async fn resolve_summary(&self, title: &str) -> Result<String> {
        let body = self
            .query(title, &[("prop", "extracts"), ("exintro", "1"), ("explaintext", "1")])
            .await?;
        parse_summary(&body, title)
    }

    fn service_name(&self) -> &'static str {
        "Wikipedia"
    }
}
