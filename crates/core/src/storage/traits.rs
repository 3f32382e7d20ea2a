use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{
    Attributes, Condition, Filters, ModelId, Page, PageRequest, RelationMap, Result, Sort,
    SyncChanges, UpdateOutcome,
};

/// A record managed by a [`Repository`].
pub trait Model: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Returns the primary key.
    fn id(&self) -> ModelId;
}

/// Data-access contract for a single entity.
///
/// `columns` selects the columns of plain representations (`[]` or `["*"]`
/// means all of them) and `relations` names the relations to eager load.
#[async_trait]
pub trait Repository: Send + Sync {
    type Model: Model;

    /// Lists records matching `conditions`, ordered by `sorts`.
    async fn all(
        &self,
        columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
        sorts: &[Sort],
    ) -> Result<Vec<Self::Model>>;

    /// Returns one page of records matching `conditions`.
    async fn paginate(
        &self,
        page: PageRequest,
        columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
        sorts: &[Sort],
    ) -> Result<Page<Self::Model>>;

    /// Returns the first record, if any.
    async fn first(&self, columns: &[&str], relations: &[&str]) -> Result<Option<Self::Model>>;

    /// Returns the first record or [`super::RepositoryError::NotFound`].
    async fn first_or_fail(&self, columns: &[&str], relations: &[&str]) -> Result<Self::Model>;

    /// Finds a record by primary key.
    async fn find(
        &self,
        id: ModelId,
        columns: &[&str],
        relations: &[&str],
    ) -> Result<Option<Self::Model>>;

    /// Finds every record matching `conditions`.
    async fn find_by(
        &self,
        conditions: &[Condition],
        columns: &[&str],
        relations: &[&str],
    ) -> Result<Vec<Self::Model>>;

    /// Returns true if any record matches `conditions`.
    async fn exists(&self, conditions: &[Condition]) -> Result<bool>;

    /// Counts records matching `conditions`.
    async fn count(&self, conditions: &[Condition]) -> Result<u64>;

    /// Lists records matching a `column => value` filter mapping.
    async fn filter(
        &self,
        filters: &Filters,
        columns: &[&str],
        relations: &[&str],
    ) -> Result<Vec<Self::Model>>;

    /// Lists every record in its plain representation.
    async fn transform_all(&self, columns: &[&str], relations: &[&str]) -> Result<Vec<Value>>;

    /// Returns the values of `column`, keyed by `key` when given.
    ///
    /// `use_cache` is a hint for caching layers; stores ignore it.
    async fn pluck(&self, column: &str, key: Option<&str>, use_cache: bool) -> Result<Value>;

    /// Lists records including soft-deleted ones.
    async fn with_trashed(
        &self,
        columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
    ) -> Result<Vec<Self::Model>>;

    /// Lists soft-deleted records only.
    async fn only_trashed(
        &self,
        columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
    ) -> Result<Vec<Self::Model>>;

    /// Creates a record.
    async fn create(&self, attributes: &Attributes) -> Result<Self::Model>;

    /// Updates a record by primary key.
    async fn update(
        &self,
        id: ModelId,
        attributes: &Attributes,
    ) -> Result<UpdateOutcome<Self::Model>>;

    /// Updates every record matching `conditions`, returning how many changed.
    async fn update_where(&self, conditions: &[Condition], attributes: &Attributes)
        -> Result<u64>;

    /// Soft-deletes a record. Returns false if there was nothing to delete.
    async fn delete(&self, id: ModelId) -> Result<bool>;

    /// Soft-deletes every record matching `conditions`.
    async fn delete_where(&self, conditions: &[Condition]) -> Result<u64>;

    /// Permanently removes a record, trashed or not.
    async fn force_delete(&self, id: ModelId) -> Result<bool>;

    /// Permanently removes every record matching `conditions`.
    async fn force_delete_where(&self, conditions: &[Condition]) -> Result<u64>;

    /// Restores a soft-deleted record.
    async fn restore(&self, id: ModelId) -> Result<bool>;

    /// Returns the record matching `attributes`, creating it with `values` if missing.
    async fn first_or_create(
        &self,
        attributes: &Attributes,
        values: &Attributes,
    ) -> Result<Self::Model>;

    /// Updates the record matching `attributes` with `values`, creating it if missing.
    async fn update_or_create(
        &self,
        attributes: &Attributes,
        values: &Attributes,
    ) -> Result<Self::Model>;

    /// Inserts `rows`, updating `update` columns of rows that collide on `unique_by`.
    /// An empty `update` list updates every supplied column.
    async fn upsert(&self, rows: &[Attributes], unique_by: &[&str], update: &[&str])
        -> Result<u64>;

    /// Makes `related` the related ids of `relation`, detaching others when `detaching`.
    async fn sync(
        &self,
        id: ModelId,
        relation: &str,
        related: &[ModelId],
        detaching: bool,
    ) -> Result<SyncChanges>;

    /// Detaches `related` (or everything when `None`) from `relation`.
    async fn detach(&self, id: ModelId, relation: &str, related: Option<&[ModelId]>)
        -> Result<u64>;

    /// Loads relations of an already fetched record.
    async fn load(&self, model: &Self::Model, relations: &[&str]) -> Result<RelationMap>;

    /// Converts a record to its plain representation.
    fn to_plain(&self, model: &Self::Model) -> Result<Value>;
}
