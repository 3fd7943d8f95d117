use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection};

use super::{by_id, ensure_index};
use crate::dbs::mongo::models::MongoChatbot;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoChatbotRepository {
    collection: Collection<MongoChatbot>,
}

impl MongoChatbotRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("chatbots");
        Self { collection }
    }

    pub async fn create_indexes(&self) -> Result<()> {
        ensure_index(&self.collection, doc! { "team_id": 1, "created_at": 1 }, None).await
    }

    pub async fn save(&self, chatbot: MongoChatbot) -> Result<()> {
        self.collection
            .replace_one(by_id(&chatbot.id), &chatbot)
            .upsert(true)
            .await?;
        Ok(())
    }

    pub async fn get(&self, chatbot_id: &str) -> Result<Option<MongoChatbot>> {
        Ok(self.collection.find_one(by_id(chatbot_id)).await?)
    }

    pub async fn list_for_team(&self, team_id: &str) -> Result<Vec<MongoChatbot>> {
        let chatbots = self
            .collection
            .find(doc! { "team_id": team_id })
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(chatbots)
    }

    pub async fn count_for_team(&self, team_id: &str) -> Result<u64> {
        Ok(self.collection.count_documents(doc! { "team_id": team_id }).await?)
    }

    pub async fn delete(&self, chatbot_id: &str) -> Result<()> {
        self.collection.delete_one(by_id(chatbot_id)).await?;
        Ok(())
    }
}
