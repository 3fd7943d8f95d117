pub mod chatbot;
pub mod conversation;
pub mod file;
pub mod flow;
pub mod integration;
pub mod message;
pub mod processed;
pub mod team;

pub use chatbot::MongoChatbotRepository;
pub use conversation::MongoConversationRepository;
pub use file::MongoFileRepository;
pub use flow::MongoFlowRepository;
pub use integration::MongoIntegrationRepository;
pub use message::MongoMessageRepository;
pub use processed::MongoProcessedMessageRepository;
pub use team::MongoTeamRepository;

use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};

use crate::error::Result;

/// Filter on a record id
pub(crate) fn by_id(id: &str) -> Document {
    doc! { "_id": id }
}

pub(crate) async fn ensure_index<T: Send + Sync>(
    collection: &Collection<T>,
    keys: Document,
    options: Option<IndexOptions>,
) -> Result<()> {
    let model = IndexModel::builder().keys(keys).options(options).build();
    collection.create_index(model).await?;
    Ok(())
}
