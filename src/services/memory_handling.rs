//! In-process document store.
//!
//! Mirrors the subset of MongoDB behaviour the handlers rely on: exact-match
//! filters on top-level fields, insertion-ordered reads, `$set` updates and
//! upserts that seed the new document from the filter and the insert-only
//! fields. Used by the test suite and by `STORE_BACKEND=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use tokio::sync::RwLock;

use crate::services::db_utils::{
    DocumentStore, InsertAck, InsertManyAck, RawPage, StoreResult, UpdateAck, Window,
};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

fn clamp_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Assigns an `_id` when the document has none and returns it as hex.
fn ensure_id(document: &mut Document) -> String {
    match document.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => other.to_string(),
        None => {
            let oid = ObjectId::new();
            document.insert("_id", oid);
            oid.to_hex()
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|d| matches(d, &filter)))
            .cloned())
    }

    async fn find_many(&self, collection: &str, filter: Document) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|d| matches(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_page(&self, collection: &str, window: Window) -> StoreResult<RawPage> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(RawPage::default());
        };

        Ok(RawPage {
            total_count: documents.len() as u64,
            documents: documents
                .iter()
                .skip(clamp_usize(window.skip))
                .take(clamp_usize(window.limit))
                .cloned()
                .collect(),
        })
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> StoreResult<InsertAck> {
        let inserted_id = ensure_id(&mut document);

        self.collections
            .write()
            .await
            .entry(collection.to_owned())
            .or_default()
            .push(document);

        Ok(InsertAck { inserted_id })
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<InsertManyAck> {
        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_owned()).or_default();

        let mut inserted_ids = Vec::with_capacity(documents.len());
        for mut document in documents {
            inserted_ids.push(ensure_id(&mut document));
            target.push(document);
        }

        Ok(InsertManyAck { inserted_ids })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        set: Document,
        on_insert: Option<Document>,
    ) -> StoreResult<UpdateAck> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_owned()).or_default();

        if let Some(document) = documents.iter_mut().find(|d| matches(d, &filter)) {
            let mut modified = false;
            for (key, value) in set {
                if document.get(&key) != Some(&value) {
                    document.insert(key, value);
                    modified = true;
                }
            }

            return Ok(UpdateAck {
                matched_count: 1,
                modified_count: u64::from(modified),
                upserted_id: None,
            });
        }

        let Some(mut document) = on_insert else {
            return Ok(UpdateAck {
                matched_count: 0,
                modified_count: 0,
                upserted_id: None,
            });
        };

        let upserted_id = ensure_id(&mut document);
        document.extend(filter);
        document.extend(set);
        documents.push(document);

        Ok(UpdateAck {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(upserted_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;

    async fn seeded(count: i32) -> MemoryStore {
        let store = MemoryStore::default();
        for n in 0..count {
            store
                .insert_one("food", doc! { "food_id": format!("f{n}"), "n": n })
                .await
                .unwrap();
        }

        store
    }

    #[actix_web::test]
    async fn page_reports_total_independent_of_window() {
        let store = seeded(12).await;

        let page = store
            .find_page("food", Window { skip: 10, limit: 5 })
            .await
            .unwrap();

        assert_eq!(page.total_count, 12);
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.documents[0].get_i32("n").unwrap(), 10);
    }

    #[actix_web::test]
    async fn window_past_the_end_is_empty() {
        let store = seeded(3).await;

        let page = store
            .find_page("food", Window { skip: 50, limit: 10 })
            .await
            .unwrap();

        assert_eq!(page.total_count, 3);
        assert!(page.documents.is_empty());
    }

    #[actix_web::test]
    async fn unknown_collection_pages_as_empty() {
        let page = MemoryStore::default()
            .find_page("menu", Window { skip: 0, limit: 10 })
            .await
            .unwrap();

        assert_eq!(page.total_count, 0);
        assert!(page.documents.is_empty());
    }

    #[actix_web::test]
    async fn update_sets_fields_on_match() {
        let store = seeded(2).await;

        let ack = store
            .update_one(
                "food",
                doc! { "food_id": "f1" },
                doc! { "name": "Soup" },
                Some(Document::new()),
            )
            .await
            .unwrap();
        let updated = store
            .find_one("food", doc! { "food_id": "f1" })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ack.matched_count, 1);
        assert_eq!(ack.modified_count, 1);
        assert_eq!(ack.upserted_id, None);
        assert_eq!(updated.get_str("name").unwrap(), "Soup");
        assert_eq!(updated.get_i32("n").unwrap(), 1);
    }

    #[actix_web::test]
    async fn identical_update_matches_without_modifying() {
        let store = seeded(1).await;

        let ack = store
            .update_one(
                "food",
                doc! { "food_id": "f0" },
                doc! { "n": 0 },
                Some(Document::new()),
            )
            .await
            .unwrap();

        assert_eq!((ack.matched_count, ack.modified_count), (1, 0));
    }

    #[actix_web::test]
    async fn upsert_seeds_document_from_filter() {
        let store = MemoryStore::default();

        let ack = store
            .update_one(
                "food",
                doc! { "food_id": "fresh" },
                doc! { "name": "Tea" },
                Some(doc! { "created_at": 1 }),
            )
            .await
            .unwrap();
        let created = store
            .find_one("food", doc! { "food_id": "fresh" })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ack.matched_count, 0);
        assert_eq!(
            ack.upserted_id,
            Some(created.get_object_id("_id").unwrap().to_hex())
        );
        assert_eq!(created.get_str("name").unwrap(), "Tea");
        assert_eq!(created.get_i32("created_at").unwrap(), 1);
    }

    #[actix_web::test]
    async fn update_only_leaves_missing_documents_missing() {
        let store = MemoryStore::default();

        let ack = store
            .update_one(
                "food",
                doc! { "food_id": "ghost" },
                doc! { "name": "Tea" },
                None,
            )
            .await
            .unwrap();

        assert_eq!(ack.matched_count, 0);
        assert_eq!(ack.upserted_id, None);
        assert!(store
            .find_one("food", doc! { "food_id": "ghost" })
            .await
            .unwrap()
            .is_none());
    }

    #[actix_web::test]
    async fn find_many_filters_in_insertion_order() {
        let store = MemoryStore::default();
        for (id, order) in [("i1", "o1"), ("i2", "o2"), ("i3", "o1")] {
            store
                .insert_one("orderItem", doc! { "order_item_id": id, "order_id": order })
                .await
                .unwrap();
        }

        let items = store
            .find_many("orderItem", doc! { "order_id": "o1" })
            .await
            .unwrap();
        let ids: Vec<_> = items
            .iter()
            .map(|item| item.get_str("order_item_id").unwrap())
            .collect();

        assert_eq!(ids, ["i1", "i3"]);
    }
}
