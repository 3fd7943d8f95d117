mod client;
mod types;

pub use client::{KnowledgeConfig, TrieveClient, DEFAULT_KNOWLEDGE_BASE_URL};
pub use types::{FileUpload, ScoredChunk};

use anyhow::Result;
use async_trait::async_trait;

/// Document-ingestion and vector-search provider holding each chatbot's dataset
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Create an empty dataset, returning its provider id
    async fn create_dataset(&self, name: &str) -> Result<String>;

    async fn delete_dataset(&self, dataset_id: &str) -> Result<()>;

    /// Upload a document for parsing and chunking, returning the provider file id
    async fn upload_file(&self, dataset_id: &str, upload: FileUpload) -> Result<String>;

    /// Fetch a web page and ingest it as a document
    async fn ingest_url(&self, dataset_id: &str, url: &str) -> Result<String>;

    /// Store plain text as a single chunk, returning the chunk id
    async fn add_text(&self, dataset_id: &str, name: &str, text: &str) -> Result<String>;

    async fn delete_file(&self, dataset_id: &str, file_id: &str) -> Result<()>;

    /// Hybrid search over a dataset, best match first
    async fn search(&self, dataset_id: &str, query: &str, limit: u32) -> Result<Vec<ScoredChunk>>;
}
