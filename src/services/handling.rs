use tracing::warn;

use crate::error::ApiError;
use crate::services::db_models::{timestamp, Entity};
use crate::services::db_utils::{
    AppState, InsertAck, InsertManyAck, Page, StoreError, UpdateAck, WriteMode,
};
use crate::services::insertable::Patch;
use crate::services::pagination::PageQuery;

fn plural<T: Entity>() -> String {
    T::LIST_KEY.replace('_', " ")
}

fn fetch_failed<T: Entity>(err: StoreError) -> ApiError {
    ApiError::store(format!("error occurred while fetching the {}", T::LABEL), err)
}

fn not_created<T: Entity>(err: StoreError) -> ApiError {
    ApiError::store(format!("{} was not created", T::LABEL), err)
}

pub fn not_found<T: Entity>(state: &AppState) -> ApiError {
    state.missing(format!("{} was not found", T::LABEL))
}

pub async fn list<T: Entity>(state: &AppState, query: &PageQuery) -> Result<Page<T>, ApiError> {
    state
        .store
        .find_page::<T>(query.window())
        .await
        .map_err(|err| {
            ApiError::store(format!("error occurred while listing {}", plural::<T>()), err)
        })
}

pub async fn find<T: Entity>(state: &AppState, id: &str) -> Result<Option<T>, ApiError> {
    state.store.fetch::<T>(id).await.map_err(fetch_failed::<T>)
}

pub async fn fetch<T: Entity>(state: &AppState, id: &str) -> Result<T, ApiError> {
    find::<T>(state, id)
        .await?
        .ok_or_else(|| not_found::<T>(state))
}

/// Referential check: the `T` addressed by `id` must exist.
pub async fn require<T: Entity>(state: &AppState, id: &str) -> Result<(), ApiError> {
    let exists = state
        .store
        .exists::<T>(id)
        .await
        .map_err(fetch_failed::<T>)?;

    if !exists {
        warn!(collection = T::COLLECTION, id, "referenced {} does not exist", T::LABEL);
        return Err(not_found::<T>(state));
    }

    Ok(())
}

pub async fn insert<T: Entity>(state: &AppState, entity: &T) -> Result<InsertAck, ApiError> {
    state.store.insert(entity).await.map_err(not_created::<T>)
}

pub async fn insert_all<T: Entity>(
    state: &AppState,
    entities: &[T],
) -> Result<InsertManyAck, ApiError> {
    state
        .store
        .insert_all(entities)
        .await
        .map_err(not_created::<T>)
}

/// Applies `patch` to the `T` addressed by `id`. In update-only mode a miss is
/// reported as not found instead of creating the document. Upserts need an
/// ObjectId hex `id` since it becomes the stored `_id`.
pub async fn update<T: Entity, P: Patch>(
    state: &AppState,
    id: &str,
    patch: P,
    mode: WriteMode,
) -> Result<UpdateAck, ApiError> {
    let now = timestamp();
    let set = patch.into_set(now)?;

    let ack = state
        .store
        .update::<T>(id, set, mode, now)
        .await
        .map_err(|err| match err {
            StoreError::InvalidId(_) => {
                ApiError::BadRequest(format!("`{id}` is not a valid {} id", T::LABEL))
            }
            err => ApiError::store(format!("{} update failed", T::LABEL), err),
        })?;

    if mode == WriteMode::UpdateOnly && ack.matched_count == 0 {
        return Err(not_found::<T>(state));
    }

    Ok(ack)
}
