use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection};

use super::{by_id, ensure_index};
use crate::dbs::mongo::models::MongoFlow;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoFlowRepository {
    collection: Collection<MongoFlow>,
}

impl MongoFlowRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("question_flows");
        Self { collection }
    }

    pub async fn create_indexes(&self) -> Result<()> {
        ensure_index(&self.collection, doc! { "chatbot_id": 1, "created_at": 1 }, None).await
    }

    pub async fn save(&self, flow: MongoFlow) -> Result<()> {
        self.collection
            .replace_one(by_id(&flow.id), &flow)
            .upsert(true)
            .await?;
        Ok(())
    }

    pub async fn get(&self, flow_id: &str) -> Result<Option<MongoFlow>> {
        Ok(self.collection.find_one(by_id(flow_id)).await?)
    }

    pub async fn list_for_chatbot(&self, chatbot_id: &str) -> Result<Vec<MongoFlow>> {
        let flows = self
            .collection
            .find(doc! { "chatbot_id": chatbot_id })
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(flows)
    }

    pub async fn delete(&self, flow_id: &str) -> Result<()> {
        self.collection.delete_one(by_id(flow_id)).await?;
        Ok(())
    }

    pub async fn delete_for_chatbot(&self, chatbot_id: &str) -> Result<()> {
        self.collection.delete_many(doc! { "chatbot_id": chatbot_id }).await?;
        Ok(())
    }
}
