use chatsa_llm::ProviderType;
use chatsa_persist::PersistError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Message quota exceeded for this billing period")]
    QuotaExceeded,

    #[error("Invalid flow: {0}")]
    InvalidFlow(String),

    #[error("No LLM provider configured for {0}")]
    ProviderUnavailable(ProviderType),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Upstream service error: {0}")]
    Provider(#[from] anyhow::Error),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
