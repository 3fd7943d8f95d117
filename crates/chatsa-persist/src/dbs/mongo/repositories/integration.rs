use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection};

use chatsa_types::Channel;

use super::{by_id, ensure_index};
use crate::dbs::mongo::models::MongoIntegration;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoIntegrationRepository {
    collection: Collection<MongoIntegration>,
}

impl MongoIntegrationRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("integrations");
        Self { collection }
    }

    pub async fn create_indexes(&self) -> Result<()> {
        ensure_index(
            &self.collection,
            doc! { "channel": 1, "account_id": 1 },
            Some(IndexOptions::builder().unique(true).build()),
        )
        .await?;
        ensure_index(&self.collection, doc! { "chatbot_id": 1 }, None).await
    }

    pub async fn save(&self, integration: MongoIntegration) -> Result<()> {
        self.collection
            .replace_one(by_id(&integration.id), &integration)
            .upsert(true)
            .await?;
        Ok(())
    }

    pub async fn get(&self, integration_id: &str) -> Result<Option<MongoIntegration>> {
        Ok(self.collection.find_one(by_id(integration_id)).await?)
    }

    pub async fn list_for_chatbot(&self, chatbot_id: &str) -> Result<Vec<MongoIntegration>> {
        let integrations = self
            .collection
            .find(doc! { "chatbot_id": chatbot_id })
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(integrations)
    }

    pub async fn find_by_account(&self, channel: Channel, account_id: &str) -> Result<Option<MongoIntegration>> {
        let filter = doc! { "channel": channel.as_str(), "account_id": account_id };
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn delete(&self, integration_id: &str) -> Result<()> {
        self.collection.delete_one(by_id(integration_id)).await?;
        Ok(())
    }

    pub async fn delete_for_chatbot(&self, chatbot_id: &str) -> Result<()> {
        self.collection.delete_many(doc! { "chatbot_id": chatbot_id }).await?;
        Ok(())
    }
}
