// Trieve-style knowledge provider client (HTTP direct, no SDK)

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{FileUpload, ScoredChunk};
use super::KnowledgeBase;

pub const DEFAULT_KNOWLEDGE_BASE_URL: &str = "https://api.trieve.ai";

const DATASET_HEADER: &str = "TR-Dataset";
const ORGANIZATION_HEADER: &str = "TR-Organization";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    pub base_url: String,
    pub api_key: String,
    pub organization_id: String,
}

impl KnowledgeConfig {
    pub fn new(api_key: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_KNOWLEDGE_BASE_URL.to_string(),
            api_key: api_key.into(),
            organization_id: organization_id.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

pub struct TrieveClient {
    http_client: reqwest::Client,
    /// Unauthenticated client for fetching third-party pages
    fetch_client: reqwest::Client,
    base_url: String,
}

impl TrieveClient {
    pub fn new(config: KnowledgeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&config.api_key).context("Invalid knowledge API key format")?,
        );
        headers.insert(
            ORGANIZATION_HEADER,
            HeaderValue::from_str(&config.organization_id).context("Invalid organization id")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let fetch_client = reqwest::Client::builder()
            .user_agent(concat!("chatsa-ingest/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create fetch client")?;

        Ok(Self {
            http_client,
            fetch_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, action: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {}", action))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Knowledge provider error while trying to {} ({}): {}", action, status, error_text);
        }

        Ok(response)
    }
}

/// File name used for an ingested page
pub(crate) fn file_name_for_url(url: &str, is_html: bool) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let without_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let trimmed = without_scheme.trim_end_matches('/');
    let name = trimmed
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("page");

    if is_html && !(name.ends_with(".html") || name.ends_with(".htm")) {
        format!("{}.html", name)
    } else {
        name.to_string()
    }
}

/// Pull an id out of the provider's response, whichever wrapper it uses
fn extract_id(value: &Value, wrappers: &[&str]) -> Option<String> {
    wrappers
        .iter()
        .filter_map(|key| value.get(*key))
        .chain(std::iter::once(value))
        .find_map(|v| {
            v.get("id")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| v.get(0).and_then(|first| first.get("id")).and_then(Value::as_str).map(String::from))
        })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    chunks: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    chunk: ChunkDto,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct ChunkDto {
    id: String,
    #[serde(default)]
    chunk_html: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl From<SearchHit> for ScoredChunk {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.chunk.id,
            content: hit.chunk.chunk_html.unwrap_or_default(),
            link: hit.chunk.link,
            score: hit.score,
        }
    }
}

#[async_trait]
impl KnowledgeBase for TrieveClient {
    async fn create_dataset(&self, name: &str) -> Result<String> {
        let body: Value = self
            .send(
                self.http_client
                    .post(self.url("/api/dataset"))
                    .json(&serde_json::json!({ "dataset_name": name })),
                "create dataset",
            )
            .await?
            .json()
            .await
            .context("Failed to parse dataset response")?;

        extract_id(&body, &["dataset"]).context("Dataset response has no id")
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<()> {
        self.send(
            self.http_client
                .delete(self.url(&format!("/api/dataset/{}", dataset_id)))
                .header(DATASET_HEADER, dataset_id),
            "delete dataset",
        )
        .await?;
        Ok(())
    }

    async fn upload_file(&self, dataset_id: &str, upload: FileUpload) -> Result<String> {
        let payload = serde_json::json!({
            "base64_file": URL_SAFE_NO_PAD.encode(&upload.bytes),
            "file_name": upload.file_name,
        });

        let body: Value = self
            .send(
                self.http_client
                    .post(self.url("/api/file"))
                    .header(DATASET_HEADER, dataset_id)
                    .json(&payload),
                "upload file",
            )
            .await?
            .json()
            .await
            .context("Failed to parse upload response")?;

        extract_id(&body, &["file_metadata"]).context("Upload response has no file id")
    }

    async fn ingest_url(&self, dataset_id: &str, url: &str) -> Result<String> {
        let response = self
            .fetch_client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Fetching {} returned {}", url, response.status());
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(true);
        let bytes = response.bytes().await.context("Failed to read page body")?;

        tracing::debug!(url = %url, size = bytes.len(), "Fetched page for ingestion");
        self.upload_file(dataset_id, FileUpload::new(file_name_for_url(url, is_html), bytes.to_vec()))
            .await
    }

    async fn add_text(&self, dataset_id: &str, name: &str, text: &str) -> Result<String> {
        let payload = serde_json::json!({
            "chunk_html": text,
            "metadata": { "source": name },
        });

        let body: Value = self
            .send(
                self.http_client
                    .post(self.url("/api/chunk"))
                    .header(DATASET_HEADER, dataset_id)
                    .json(&payload),
                "create chunk",
            )
            .await?
            .json()
            .await
            .context("Failed to parse chunk response")?;

        extract_id(&body, &["chunk_metadata"]).context("Chunk response has no id")
    }

    async fn delete_file(&self, dataset_id: &str, file_id: &str) -> Result<()> {
        self.send(
            self.http_client
                .delete(self.url(&format!("/api/file/{}", file_id)))
                .header(DATASET_HEADER, dataset_id),
            "delete file",
        )
        .await?;
        Ok(())
    }

    async fn search(&self, dataset_id: &str, query: &str, limit: u32) -> Result<Vec<ScoredChunk>> {
        let payload = serde_json::json!({
            "query": query,
            "search_type": "hybrid",
            "page_size": limit,
        });

        let body: SearchResponse = self
            .send(
                self.http_client
                    .post(self.url("/api/chunk/search"))
                    .header(DATASET_HEADER, dataset_id)
                    .json(&payload),
                "search chunks",
            )
            .await?
            .json()
            .await
            .context("Failed to parse search response")?;

        Ok(body.chunks.into_iter().map(ScoredChunk::from).collect())
    }
}
