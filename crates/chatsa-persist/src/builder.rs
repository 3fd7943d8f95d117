use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PersistError, Result};
use crate::memory::InMemoryPersistenceClient;
use crate::trait_client::PersistenceClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Mongodb,
    Memory,
}

pub struct PersistClientBuilder {
    backend: StorageBackend,
    mongodb_uri: Option<String>,
    database: Option<String>,
    create_indexes: bool,
}

impl PersistClientBuilder {
    pub fn new() -> Self {
        Self {
            backend: StorageBackend::default(),
            mongodb_uri: None,
            database: None,
            create_indexes: true,
        }
    }

    pub fn backend(mut self, backend: StorageBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    pub fn database(mut self, db: impl Into<String>) -> Self {
        self.database = Some(db.into());
        self
    }

    pub fn create_indexes(mut self, enabled: bool) -> Self {
        self.create_indexes = enabled;
        self
    }

    pub async fn build(self) -> Result<Arc<dyn PersistenceClient>> {
        match self.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Arc::new(InMemoryPersistenceClient::new()))
            }
            StorageBackend::Mongodb => self.build_mongo().await,
        }
    }

    #[cfg(feature = "mongodb")]
    async fn build_mongo(self) -> Result<Arc<dyn PersistenceClient>> {
        let mongodb_uri = self
            .mongodb_uri
            .ok_or_else(|| PersistError::Internal("mongodb_uri is required".to_string()))?;
        let database = self
            .database
            .ok_or_else(|| PersistError::Internal("database is required".to_string()))?;

        let client = crate::dbs::mongo::MongoPersistenceClient::connect(&mongodb_uri, &database).await?;
        if self.create_indexes {
            client.create_indexes().await?;
        }
        tracing::info!(database = %database, "Connected to MongoDB");
        Ok(Arc::new(client))
    }

    #[cfg(not(feature = "mongodb"))]
    async fn build_mongo(self) -> Result<Arc<dyn PersistenceClient>> {
        Err(PersistError::Internal(
            "MongoDB backend requested but the `mongodb` feature is disabled".to_string(),
        ))
    }
}

impl Default for PersistClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend() {
        let client = PersistClientBuilder::new()
            .backend(StorageBackend::Memory)
            .build()
            .await
            .unwrap();
        assert_eq!(client.backend_name(), "memory");
        client.ping().await.unwrap();
    }

    #[cfg(feature = "mongodb")]
    #[tokio::test]
    async fn test_mongo_backend_requires_uri() {
        let err = PersistClientBuilder::new()
            .database("chatsa")
            .build()
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("mongodb_uri"));
    }

    #[test]
    fn test_backend_names() {
        let backend: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StorageBackend::Memory);
    }
}
