use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection};

use chatsa_types::Channel;

use super::{by_id, ensure_index};
use crate::dbs::mongo::models::MongoConversation;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoConversationRepository {
    collection: Collection<MongoConversation>,
}

impl MongoConversationRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("conversations");
        Self { collection }
    }

    pub async fn create_indexes(&self) -> Result<()> {
        ensure_index(
            &self.collection,
            doc! { "chatbot_id": 1, "channel": 1, "external_user_id": 1 },
            Some(IndexOptions::builder().unique(true).build()),
        )
        .await?;
        ensure_index(&self.collection, doc! { "chatbot_id": 1, "last_message_at": -1 }, None).await
    }

    pub async fn save(&self, conversation: MongoConversation) -> Result<()> {
        self.collection
            .replace_one(by_id(&conversation.id), &conversation)
            .upsert(true)
            .await?;
        Ok(())
    }

    pub async fn get(&self, conversation_id: &str) -> Result<Option<MongoConversation>> {
        Ok(self.collection.find_one(by_id(conversation_id)).await?)
    }

    pub async fn find_by_user(
        &self,
        chatbot_id: &str,
        channel: Channel,
        external_user_id: &str,
    ) -> Result<Option<MongoConversation>> {
        let filter = doc! {
            "chatbot_id": chatbot_id,
            "channel": channel.as_str(),
            "external_user_id": external_user_id,
        };
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn list_for_chatbot(
        &self,
        chatbot_id: &str,
        limit: Option<i64>,
        skip: Option<u64>,
    ) -> Result<Vec<MongoConversation>> {
        let mut find = self
            .collection
            .find(doc! { "chatbot_id": chatbot_id })
            .sort(doc! { "last_message_at": -1 });

        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        if let Some(skip) = skip {
            find = find.skip(skip);
        }

        let conversations = find.await?.try_collect().await?;
        Ok(conversations)
    }

    /// Ids of every conversation of a chatbot
    pub async fn ids_for_chatbot(&self, chatbot_id: &str) -> Result<Vec<String>> {
        let conversations: Vec<MongoConversation> = self
            .collection
            .find(doc! { "chatbot_id": chatbot_id })
            .await?
            .try_collect()
            .await?;
        Ok(conversations.into_iter().map(|c| c.id).collect())
    }

    pub async fn delete_for_chatbot(&self, chatbot_id: &str) -> Result<()> {
        self.collection.delete_many(doc! { "chatbot_id": chatbot_id }).await?;
        Ok(())
    }
}
