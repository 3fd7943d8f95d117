use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection};

use super::{by_id, ensure_index};
use crate::dbs::mongo::models::MongoMessage;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoMessageRepository {
    collection: Collection<MongoMessage>,
}

impl MongoMessageRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("messages");
        Self { collection }
    }

    pub async fn create_indexes(&self) -> Result<()> {
        ensure_index(&self.collection, doc! { "conversation_id": 1, "created_at": 1 }, None).await
    }

    pub async fn save(&self, message: MongoMessage) -> Result<()> {
        self.collection
            .replace_one(by_id(&message.id), &message)
            .upsert(true)
            .await?;
        Ok(())
    }

    /// All messages for a conversation, oldest first
    pub async fn list(&self, conversation_id: &str) -> Result<Vec<MongoMessage>> {
        let messages = self
            .collection
            .find(doc! { "conversation_id": conversation_id })
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    /// Last `limit` messages, oldest first
    pub async fn recent(&self, conversation_id: &str, limit: i64) -> Result<Vec<MongoMessage>> {
        let mut messages: Vec<MongoMessage> = self
            .collection
            .find(doc! { "conversation_id": conversation_id })
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn delete_for_conversations(&self, conversation_ids: &[String]) -> Result<()> {
        if conversation_ids.is_empty() {
            return Ok(());
        }
        self.collection
            .delete_many(doc! { "conversation_id": { "$in": conversation_ids.to_vec() } })
            .await?;
        Ok(())
    }
}
