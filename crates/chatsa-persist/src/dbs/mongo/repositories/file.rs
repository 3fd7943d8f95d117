use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection};

use super::{by_id, ensure_index};
use crate::dbs::mongo::models::MongoDatasetFile;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoFileRepository {
    collection: Collection<MongoDatasetFile>,
}

impl MongoFileRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("dataset_files");
        Self { collection }
    }

    pub async fn create_indexes(&self) -> Result<()> {
        ensure_index(&self.collection, doc! { "chatbot_id": 1, "created_at": 1 }, None).await
    }

    pub async fn save(&self, file: MongoDatasetFile) -> Result<()> {
        self.collection
            .replace_one(by_id(&file.id), &file)
            .upsert(true)
            .await?;
        Ok(())
    }

    pub async fn get(&self, file_id: &str) -> Result<Option<MongoDatasetFile>> {
        Ok(self.collection.find_one(by_id(file_id)).await?)
    }

    pub async fn list_for_chatbot(&self, chatbot_id: &str) -> Result<Vec<MongoDatasetFile>> {
        let files = self
            .collection
            .find(doc! { "chatbot_id": chatbot_id })
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(files)
    }

    pub async fn delete(&self, file_id: &str) -> Result<()> {
        self.collection.delete_one(by_id(file_id)).await?;
        Ok(())
    }

    pub async fn delete_for_chatbot(&self, chatbot_id: &str) -> Result<()> {
        self.collection.delete_many(doc! { "chatbot_id": chatbot_id }).await?;
        Ok(())
    }
}
