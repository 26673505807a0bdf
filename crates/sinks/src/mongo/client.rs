//! MongoDB-backed document store
//!
//! The only place that talks to the driver. Bulk write errors are split
//! into per-document [`WriteFailure`]s; everything else is a transport
//! failure.

use async_trait::async_trait;
use mongodb::bson::Document;
use mongodb::error::{Error, ErrorKind};
use mongodb::options::{Acknowledgment, CreateCollectionOptions, InsertManyOptions, WriteConcern};
use mongodb::{Client, Collection, Database};

use super::config::{CappedCollection, MongoConfig};
use super::error::MongoSinkError;
use super::store::{DocumentStore, StoreError, WriteFailure, WriteOptions};

/// [`DocumentStore`] over a single MongoDB collection
#[derive(Clone)]
pub struct MongoStore {
    database: Database,
    collection: Collection<Document>,
    name: String,
}

impl MongoStore {
    /// Connect using the config's connection string
    pub async fn connect(config: &MongoConfig) -> Result<Self, MongoSinkError> {
        let client = Client::with_uri_str(&config.connection_string).await?;
        Ok(Self::from_client(&client, &config.database, &config.collection))
    }

    /// Build a store over an existing client
    pub fn from_client(client: &Client, database: &str, collection: &str) -> Self {
        let database = client.database(database);
        let collection = database.collection::<Document>(collection);
        let name = format!("{}.{}", database.name(), collection.name());
        Self {
            database,
            collection,
            name,
        }
    }

    /// Create the collection if it does not exist yet
    ///
    /// Only a missing collection is created capped; an existing one is used
    /// as-is.
    pub async fn ensure_collection(
        &self,
        capped: Option<CappedCollection>,
    ) -> Result<(), MongoSinkError> {
        let existing = self.database.list_collection_names(None).await?;
        if existing.iter().any(|n| n == self.collection.name()) {
            return Ok(());
        }

        let Some(capped) = capped else {
            // Created implicitly on first insert
            return Ok(());
        };

        tracing::info!(
            collection = %self.name,
            size = capped.size,
            max = ?capped.max,
            "creating capped collection"
        );
        self.database
            .create_collection(self.collection.name(), capped_options(capped))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_many(
        &self,
        documents: &[Document],
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        self.collection
            .insert_many(documents.iter(), insert_options(options))
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn capped_options(capped: CappedCollection) -> CreateCollectionOptions {
    let mut options = CreateCollectionOptions::default();
    options.capped = Some(true);
    options.size = Some(capped.size);
    options.max = capped.max;
    options
}

fn insert_options(options: &WriteOptions) -> InsertManyOptions {
    let mut insert = InsertManyOptions::default();
    insert.ordered = Some(options.ordered);
    insert.write_concern = write_concern(options);
    insert
}

/// `None` leaves the server default in place
fn write_concern(options: &WriteOptions) -> Option<WriteConcern> {
    if options.write_concern.is_none() && !options.journaled {
        return None;
    }

    let mut concern = WriteConcern::default();
    concern.w = options.write_concern.map(Acknowledgment::Nodes);
    if options.journaled {
        concern.journal = Some(true);
    }
    Some(concern)
}

fn map_error(err: Error) -> StoreError {
    if let ErrorKind::BulkWrite(failure) = &*err.kind
        && let Some(write_errors) = &failure.write_errors
        && !write_errors.is_empty()
    {
        return StoreError::BulkWrite(
            write_errors
                .iter()
                .map(|e| WriteFailure {
                    index: e.index,
                    code: e.code,
                    code_name: e.code_name.clone(),
                    message: e.message.clone(),
                    details: e.details.clone(),
                })
                .collect(),
        );
    }

    StoreError::transport(err.to_string())
}
