use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOptions, UpdateOptions};
use mongodb::{Client, Collection, Database};

use crate::services::db_utils::{
    DocumentStore, InsertAck, InsertManyAck, RawPage, StoreError, StoreResult, UpdateAck, Window,
};

const APP_NAME: &str = "hotel-rust-back";

pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Connects and pings the server so that a bad URI fails at startup.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, mongodb::error::Error> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some(APP_NAME.to_owned());

        let client = Client::with_options(options)?;
        let database = client.database(database);
        database.run_command(doc! { "ping": 1 }, None).await?;

        Ok(Self { database })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

fn hex_id(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn count_of(value: &Bson) -> Option<u64> {
    match value {
        Bson::Int32(n) => u64::try_from(*n).ok(),
        Bson::Int64(n) => u64::try_from(*n).ok(),
        _ => None,
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `$facet` always emits exactly one document, so an empty collection still
/// yields `{ total: [], items: [] }` rather than no result at all.
fn page_pipeline(window: Window) -> Vec<Document> {
    vec![
        doc! { "$match": {} },
        doc! { "$sort": { "_id": 1 } },
        doc! {
            "$facet": {
                "total": [ { "$count": "count" } ],
                "items": [
                    { "$skip": clamp_i64(window.skip) },
                    { "$limit": clamp_i64(window.limit.max(1)) }
                ]
            }
        },
    ]
}

fn read_page(mut result: Document) -> StoreResult<RawPage> {
    let total_count = result
        .get_array("total")
        .ok()
        .and_then(|total| total.first())
        .and_then(Bson::as_document)
        .and_then(|count| count.get("count"))
        .map(|count| count_of(count).ok_or_else(|| StoreError::Malformed(format!("count {count}"))))
        .transpose()?
        .unwrap_or(0);

    let documents = match result.remove("items") {
        Some(Bson::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Bson::Document(document) => Ok(document),
                other => Err(StoreError::Malformed(format!("page item {other}"))),
            })
            .collect::<StoreResult<Vec<_>>>()?,
        Some(other) => return Err(StoreError::Malformed(format!("page items {other}"))),
        None => Vec::new(),
    };

    Ok(RawPage {
        total_count,
        documents,
    })
}

/// `$setOnInsert` is left out when empty; the server rejects empty operators.
fn update_document(set: Document, on_insert: Option<Document>) -> Document {
    let mut update = doc! { "$set": set };
    if let Some(on_insert) = on_insert.filter(|fields| !fields.is_empty()) {
        update.insert("$setOnInsert", on_insert);
    }

    update
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        Ok(self.collection(collection).find_one(filter, None).await?)
    }

    async fn find_many(&self, collection: &str, filter: Document) -> StoreResult<Vec<Document>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let cursor = self.collection(collection).find(filter, options).await?;

        Ok(cursor.try_collect().await?)
    }

    async fn find_page(&self, collection: &str, window: Window) -> StoreResult<RawPage> {
        let mut cursor = self
            .collection(collection)
            .aggregate(page_pipeline(window), None)
            .await?;

        match cursor.try_next().await? {
            Some(result) => read_page(result),
            None => Ok(RawPage::default()),
        }
    }

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<InsertAck> {
        let result = self.collection(collection).insert_one(document, None).await?;

        Ok(InsertAck {
            inserted_id: hex_id(&result.inserted_id),
        })
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<InsertManyAck> {
        if documents.is_empty() {
            return Ok(InsertManyAck {
                inserted_ids: Vec::new(),
            });
        }

        let result = self
            .collection(collection)
            .insert_many(documents, None)
            .await?;

        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);

        Ok(InsertManyAck {
            inserted_ids: ids.iter().map(|(_, id)| hex_id(id)).collect(),
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        set: Document,
        on_insert: Option<Document>,
    ) -> StoreResult<UpdateAck> {
        let options = UpdateOptions::builder()
            .upsert(on_insert.is_some())
            .build();

        let result = self
            .collection(collection)
            .update_one(filter, update_document(set, on_insert), options)
            .await?;

        Ok(UpdateAck {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id.as_ref().map(hex_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::oid::ObjectId;

    use super::*;

    #[test]
    fn pipeline_slices_after_counting() {
        let pipeline = page_pipeline(Window { skip: 20, limit: 10 });
        let facet = pipeline[2].get_document("$facet").unwrap();
        let items = facet.get_array("items").unwrap();

        assert_eq!(pipeline.len(), 3);
        assert_eq!(items[0].as_document().unwrap().get_i64("$skip").unwrap(), 20);
        assert_eq!(items[1].as_document().unwrap().get_i64("$limit").unwrap(), 10);
    }

    #[test]
    fn reads_facet_result() {
        let result = doc! {
            "total": [ { "count": 12_i32 } ],
            "items": [ { "food_id": "a" }, { "food_id": "b" } ]
        };

        let page = read_page(result).unwrap();

        assert_eq!(page.total_count, 12);
        assert_eq!(page.documents.len(), 2);
    }

    #[test]
    fn empty_facet_is_an_empty_page() {
        let page = read_page(doc! { "total": [], "items": [] }).unwrap();

        assert_eq!(page.total_count, 0);
        assert!(page.documents.is_empty());
    }

    #[test]
    fn insert_only_fields_go_to_set_on_insert() {
        let update = update_document(doc! { "name": "Late" }, Some(doc! { "created_at": 1 }));

        assert_eq!(update.get_document("$set").unwrap(), &doc! { "name": "Late" });
        assert_eq!(
            update.get_document("$setOnInsert").unwrap(),
            &doc! { "created_at": 1 }
        );
    }

    #[test]
    fn update_only_writes_have_no_set_on_insert() {
        let update = update_document(doc! { "name": "Late" }, None);

        assert!(!update.contains_key("$setOnInsert"));
    }

    #[test]
    fn object_ids_render_as_hex() {
        let oid = ObjectId::new();

        assert_eq!(hex_id(&Bson::ObjectId(oid)), oid.to_hex());
    }
}
