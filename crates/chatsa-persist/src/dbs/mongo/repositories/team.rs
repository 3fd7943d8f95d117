use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection};

use super::{by_id, ensure_index};
use crate::dbs::mongo::models::MongoTeam;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoTeamRepository {
    collection: Collection<MongoTeam>,
}

impl MongoTeamRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("teams");
        Self { collection }
    }

    pub async fn create_indexes(&self) -> Result<()> {
        ensure_index(
            &self.collection,
            doc! { "api_key": 1 },
            Some(IndexOptions::builder().unique(true).build()),
        )
        .await
    }

    pub async fn save(&self, team: MongoTeam) -> Result<()> {
        self.collection
            .replace_one(by_id(&team.id), &team)
            .upsert(true)
            .await?;
        Ok(())
    }

    pub async fn get(&self, team_id: &str) -> Result<Option<MongoTeam>> {
        Ok(self.collection.find_one(by_id(team_id)).await?)
    }

    pub async fn find_by_api_key(&self, api_key: &str) -> Result<Option<MongoTeam>> {
        Ok(self.collection.find_one(doc! { "api_key": api_key }).await?)
    }

    /// `$inc` guarded by the limit; `false` when nothing was updated
    pub async fn consume_credit(&self, team_id: &str, limit: i64) -> Result<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": team_id, "messages_used": { "$lt": limit } },
                doc! {
                    "$inc": { "messages_used": 1_i64 },
                    "$set": { "updated_at": bson::DateTime::now() }
                },
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    pub async fn reset_usage(&self, team_id: &str, period_started_at: bson::DateTime) -> Result<bool> {
        let result = self
            .collection
            .update_one(
                by_id(team_id),
                doc! {
                    "$set": {
                        "messages_used": 0_i64,
                        "period_started_at": period_started_at,
                        "updated_at": bson::DateTime::now()
                    }
                },
            )
            .await?;
        Ok(result.matched_count == 1)
    }
}
