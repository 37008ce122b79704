use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::services::db_models::Entity;
use crate::services::memory_handling::MemoryStore;
use crate::services::mongo_handling::MongoStore;
use crate::settings::{Settings, StoreBackend};
use crate::types::StoreInitializationError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store driver failure: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("store call did not finish within {0:?}")]
    Timeout(Duration),

    #[error("failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("failed to decode document from `{collection}`: {source}")]
    Decode {
        collection: &'static str,
        #[source]
        source: bson::de::Error,
    },

    #[error("invalid document id: {0}")]
    InvalidId(#[from] bson::oid::Error),

    #[error("unexpected store response: {0}")]
    Malformed(String),
}

/// Slice of a collection: skip `skip` documents, then take at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
}

#[derive(Debug, Default)]
pub struct RawPage {
    pub total_count: u64,
    pub documents: Vec<Document>,
}

/// Whether an update may create the document when nothing matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Upsert,
    UpdateOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertAck {
    pub inserted_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertManyAck {
    pub inserted_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateAck {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<String>,
}

/// Collection-addressed document operations.
///
/// Filters are exact matches on top-level fields. Updates are `$set` documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>>;

    /// Matching documents in insertion order.
    async fn find_many(&self, collection: &str, filter: Document) -> StoreResult<Vec<Document>>;

    /// Total size of the collection plus the documents inside `window`.
    async fn find_page(&self, collection: &str, window: Window) -> StoreResult<RawPage>;

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<InsertAck>;

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<InsertManyAck>;

    /// Applies `set` to the first match. When nothing matches and `on_insert`
    /// is given, creates a document from the filter, `on_insert` and `set`.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        set: Document,
        on_insert: Option<Document>,
    ) -> StoreResult<UpdateAck>;
}

/// A decoded page of entities, serialized as `{ "total_count": .., "<list key>": [..] }`.
#[derive(Debug)]
pub struct Page<T> {
    pub total_count: u64,
    pub items: Vec<T>,
}

impl<T: Entity> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("total_count", &self.total_count)?;
        map.serialize_entry(T::LIST_KEY, &self.items)?;
        map.end()
    }
}

fn id_filter<T: Entity>(id: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(T::ID_FIELD, id);

    filter
}

/// Shared store handle: a backend plus the per-call timeout.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl Store {
    pub fn new(backend: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &dyn DocumentStore {
        self.backend.as_ref()
    }

    async fn bounded<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    /// Goes through raw BSON bytes so that the entity sees a deserializer
    /// that is not human readable and reads timestamps as BSON dates.
    fn decode<T: Entity>(document: Document) -> StoreResult<T> {
        let bytes = bson::to_vec(&document)?;

        bson::from_slice(&bytes).map_err(|source| StoreError::Decode {
            collection: T::COLLECTION,
            source,
        })
    }

    fn encode<T: Entity>(entity: &T) -> StoreResult<Document> {
        let bytes = bson::to_vec(entity)?;
        let mut document = Document::from_reader(bytes.as_slice())
            .map_err(|err| StoreError::Malformed(err.to_string()))?;
        document.insert("_id", ObjectId::parse_str(entity.public_id())?);

        Ok(document)
    }

    pub async fn fetch<T: Entity>(&self, id: &str) -> StoreResult<Option<T>> {
        self.find_one(id_filter::<T>(id)).await
    }

    pub async fn find_one<T: Entity>(&self, filter: Document) -> StoreResult<Option<T>> {
        self.bounded(self.backend.find_one(T::COLLECTION, filter))
            .await?
            .map(Self::decode::<T>)
            .transpose()
    }

    /// Presence check that does not decode the document.
    pub async fn exists<T: Entity>(&self, id: &str) -> StoreResult<bool> {
        let found = self
            .bounded(self.backend.find_one(T::COLLECTION, id_filter::<T>(id)))
            .await?;

        Ok(found.is_some())
    }

    pub async fn find_many<T: Entity>(&self, filter: Document) -> StoreResult<Vec<T>> {
        self.bounded(self.backend.find_many(T::COLLECTION, filter))
            .await?
            .into_iter()
            .map(Self::decode::<T>)
            .collect()
    }

    pub async fn find_page<T: Entity>(&self, window: Window) -> StoreResult<Page<T>> {
        let raw = self
            .bounded(self.backend.find_page(T::COLLECTION, window))
            .await?;

        Ok(Page {
            total_count: raw.total_count,
            items: raw
                .documents
                .into_iter()
                .map(Self::decode::<T>)
                .collect::<StoreResult<_>>()?,
        })
    }

    pub async fn insert<T: Entity>(&self, entity: &T) -> StoreResult<InsertAck> {
        let document = Self::encode(entity)?;

        self.bounded(self.backend.insert_one(T::COLLECTION, document))
            .await
    }

    pub async fn insert_all<T: Entity>(&self, entities: &[T]) -> StoreResult<InsertManyAck> {
        let documents = entities
            .iter()
            .map(Self::encode::<T>)
            .collect::<StoreResult<Vec<_>>>()?;

        self.bounded(self.backend.insert_many(T::COLLECTION, documents))
            .await
    }

    /// In upsert mode a created document gets `_id` parsed from `id` and
    /// `created_at` set to `now`, so it reads back like an inserted one.
    pub async fn update<T: Entity>(
        &self,
        id: &str,
        set: Document,
        mode: WriteMode,
        now: DateTime<Utc>,
    ) -> StoreResult<UpdateAck> {
        let on_insert = match mode {
            WriteMode::Upsert => Some(doc! {
                "_id": ObjectId::parse_str(id)?,
                "created_at": bson::DateTime::from_chrono(now),
            }),
            WriteMode::UpdateOnly => None,
        };

        self.bounded(
            self.backend
                .update_one(T::COLLECTION, id_filter::<T>(id), set, on_insert),
        )
        .await
    }
}

pub struct AppState {
    pub store: Store,
    pub strict_not_found: bool,
}

impl AppState {
    pub fn new(store: Store, strict_not_found: bool) -> Self {
        Self {
            store,
            strict_not_found,
        }
    }

    /// Error for a lookup that found nothing: 404 in strict mode, 500 otherwise.
    pub fn missing(&self, message: impl Into<String>) -> ApiError {
        let message = message.into();

        if self.strict_not_found {
            ApiError::NotFound(message)
        } else {
            ApiError::Internal(message)
        }
    }
}

pub async fn init_store(settings: &Settings) -> Result<Store, StoreInitializationError> {
    let backend: Arc<dyn DocumentStore> = match settings.store_backend {
        StoreBackend::Mongo => {
            let store = MongoStore::connect(&settings.mongodb_uri, &settings.database_name)
                .await
                .map_err(|err| StoreInitializationError(err.to_string()))?;
            info!(database = %settings.database_name, "connected to mongodb");

            Arc::new(store)
        }
        StoreBackend::Memory => {
            warn!("using the in-memory store, data is lost on shutdown");

            Arc::new(MemoryStore::default())
        }
    };

    Ok(Store::new(backend, settings.store_timeout()))
}

#[cfg(test)]
mod tests {
    use mongodb::bson::Bson;

    use super::*;
    use crate::services::db_models::{new_public_id, timestamp, Menu};

    struct StalledStore;

    #[async_trait]
    impl DocumentStore for StalledStore {
        async fn find_one(&self, _: &str, _: Document) -> StoreResult<Option<Document>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }

        async fn find_many(&self, _: &str, _: Document) -> StoreResult<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn find_page(&self, _: &str, _: Window) -> StoreResult<RawPage> {
            Ok(RawPage::default())
        }

        async fn insert_one(&self, _: &str, _: Document) -> StoreResult<InsertAck> {
            Err(StoreError::Malformed("read-only".into()))
        }

        async fn insert_many(&self, _: &str, _: Vec<Document>) -> StoreResult<InsertManyAck> {
            Err(StoreError::Malformed("read-only".into()))
        }

        async fn update_one(
            &self,
            _: &str,
            _: Document,
            _: Document,
            _: Option<Document>,
        ) -> StoreResult<UpdateAck> {
            Err(StoreError::Malformed("read-only".into()))
        }
    }

    fn menu(name: &str) -> Menu {
        let now = timestamp();

        Menu {
            menu_id: new_public_id(),
            name: name.to_owned(),
            category: "Dinner".to_owned(),
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[actix_web::test]
    async fn slow_calls_time_out() {
        let store = Store::new(Arc::new(StalledStore), Duration::from_millis(20));

        let result = store.fetch::<Menu>("abc").await;

        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }

    #[actix_web::test]
    async fn stored_id_matches_public_id() {
        let store = Store::new(Arc::new(MemoryStore::default()), Duration::from_secs(1));
        let menu = menu("Lunch");

        let ack = store.insert(&menu).await.unwrap();
        let raw = store
            .backend()
            .find_one("menu", doc! { "menu_id": &menu.menu_id })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ack.inserted_id, menu.menu_id);
        assert_eq!(raw.get_object_id("_id").unwrap().to_hex(), menu.menu_id);
        assert_eq!(store.fetch::<Menu>(&menu.menu_id).await.unwrap(), Some(menu));
    }

    #[actix_web::test]
    async fn timestamps_are_stored_as_bson_dates() {
        let store = Store::new(Arc::new(MemoryStore::default()), Duration::from_secs(1));
        let menu = menu("Lunch");

        store.insert(&menu).await.unwrap();
        let raw = store
            .backend()
            .find_one("menu", doc! { "menu_id": &menu.menu_id })
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(raw.get("created_at"), Some(Bson::DateTime(_))));
        assert_eq!(
            raw.get_datetime("updated_at").unwrap().to_chrono(),
            menu.updated_at
        );
    }

    #[actix_web::test]
    async fn upsert_seeds_id_and_creation_time() {
        let store = Store::new(Arc::new(MemoryStore::default()), Duration::from_secs(1));
        let id = new_public_id();
        let now = timestamp();

        let ack = store
            .update::<Menu>(&id, doc! { "name": "Late" }, WriteMode::Upsert, now)
            .await
            .unwrap();
        let created = store.fetch::<Menu>(&id).await.unwrap().unwrap();

        assert_eq!(ack.upserted_id, Some(id.clone()));
        assert_eq!(created.menu_id, id);
        assert_eq!(created.name, "Late");
        assert_eq!(created.created_at, now);
    }

    #[actix_web::test]
    async fn upsert_rejects_ids_that_are_not_object_ids() {
        let store = Store::new(Arc::new(MemoryStore::default()), Duration::from_secs(1));

        let result = store
            .update::<Menu>("ghost", doc! { "name": "Late" }, WriteMode::Upsert, timestamp())
            .await;

        assert!(matches!(result, Err(StoreError::InvalidId(_))));
    }

    #[actix_web::test]
    async fn undecodable_documents_surface_as_errors() {
        let store = Store::new(Arc::new(MemoryStore::default()), Duration::from_secs(1));
        store
            .backend()
            .insert_one("menu", doc! { "menu_id": "broken", "name": 42 })
            .await
            .unwrap();

        let result = store.fetch::<Menu>("broken").await;

        assert!(matches!(
            result,
            Err(StoreError::Decode { collection: "menu", .. })
        ));
    }

    #[test]
    fn page_uses_entity_list_key() {
        let page = Page::<Menu> {
            total_count: 0,
            items: Vec::new(),
        };

        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            serde_json::json!({ "total_count": 0, "menus": [] })
        );
    }
}
