use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileSource {
    Text,
    Url { url: String },
    Upload { content_type: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Processing,
    Ready,
    Failed,
}

/// Source document ingested into a chatbot's dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFile {
    pub id: String,
    pub chatbot_id: String,
    pub team_id: String,
    pub name: String,
    pub source: FileSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_file_id: Option<String>,
    pub status: FileStatus,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DatasetFile {
    pub fn new(
        chatbot_id: impl Into<String>,
        team_id: impl Into<String>,
        name: impl Into<String>,
        source: FileSource,
        size_bytes: u64,
    ) -> Self {
        Self {
            id: crate::new_id(),
            chatbot_id: chatbot_id.into(),
            team_id: team_id.into(),
            name: name.into(),
            source,
            provider_file_id: None,
            status: FileStatus::Processing,
            size_bytes,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn mark_ready(&mut self, provider_file_id: impl Into<String>) {
        self.provider_file_id = Some(provider_file_id.into());
        self.status = FileStatus::Ready;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = FileStatus::Failed;
        self.error = Some(error.into());
    }
}
