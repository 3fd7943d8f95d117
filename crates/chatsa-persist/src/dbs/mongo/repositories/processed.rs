use std::time::Duration;

use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection};

use super::ensure_index;
use crate::dbs::mongo::models::MongoProcessedMessage;
use crate::error::Result;

const DUPLICATE_KEY: i32 = 11000;

/// Dedup keys expire after this long
const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Clone)]
pub struct MongoProcessedMessageRepository {
    collection: Collection<MongoProcessedMessage>,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

impl MongoProcessedMessageRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("processed_messages");
        Self { collection }
    }

    pub async fn create_indexes(&self) -> Result<()> {
        ensure_index(
            &self.collection,
            doc! { "processed_at": 1 },
            Some(IndexOptions::builder().expire_after(RETENTION).build()),
        )
        .await
    }

    /// Insert the key; `false` if another insert already claimed it
    pub async fn mark(&self, key: &str) -> Result<bool> {
        let record = MongoProcessedMessage {
            key: key.to_string(),
            processed_at: bson::DateTime::now(),
        };

        match self.collection.insert_one(&record).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
