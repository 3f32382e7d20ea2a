//! Cached repository decorator.
//!
//! Wraps any `Repository` implementation with the cache-aside pattern.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use repocache_core::cache::{derive_key, type_tag, CacheService, KeyArgs, TAG_DELIMITER};
use repocache_core::storage::{
    Attributes, Condition, Filters, ModelId, Page, PageRequest, RelationMap, Repository, Result,
    Sort, SyncChanges, UpdateOutcome,
};

/// Per-decorator cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// TTL of entries written by this decorator. Defaults to the service TTL.
    pub ttl: Option<Duration>,
    /// Tag grouping this decorator's entries. Defaults to the repository type name.
    pub tag: Option<String>,
}

/// Cached repository decorator.
///
/// Implements the cache-aside pattern:
/// - **Reads**: Look up the derived key, on miss query the repository and
///   store the result under this decorator's tag
/// - **Writes**: Persist to repository, then flush the whole tag
///
/// An `update` that reports [`UpdateOutcome::Unchanged`] leaves the cache
/// alone. `load` and `to_plain` never touch the cache.
///
/// Backend failures are not swallowed: they surface as
/// `RepositoryError::Cache`. A write whose flush fails has still been
/// persisted.
///
/// # Type Parameters
///
/// * `R` - The underlying repository implementation
pub struct CachedRepository<R>
where
    R: Repository,
{
    repository: R,
    cache: Arc<CacheService>,
    tag: String,
    ttl: Duration,
}

impl<R> CachedRepository<R>
where
    R: Repository,
{
    /// Creates a decorator with the service TTL and a tag derived from `R`.
    pub fn new(repository: R, cache: Arc<CacheService>) -> Self {
        Self::with_options(repository, cache, CacheOptions::default())
    }

    /// Creates a decorator with explicit options.
    ///
    /// The tag delimiter is not allowed inside a tag and is replaced by `_`.
    pub fn with_options(repository: R, cache: Arc<CacheService>, options: CacheOptions) -> Self {
        let tag = options
            .tag
            .unwrap_or_else(type_tag::<R>)
            .replace(TAG_DELIMITER, "_");
        let ttl = options.ttl.unwrap_or_else(|| cache.default_ttl());

        tracing::debug!(tag = %tag, ttl_secs = ttl.as_secs(), "Cached repository created");

        Self {
            repository,
            cache,
            tag,
            ttl,
        }
    }

    /// Tag grouping every entry this decorator writes.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// TTL of entries this decorator writes.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The wrapped repository.
    pub fn inner(&self) -> &R {
        &self.repository
    }

    /// Unwraps the decorator.
    pub fn into_inner(self) -> R {
        self.repository
    }

    /// Evicts every entry this decorator has written.
    pub async fn flush(&self) -> Result<()> {
        self.cache.flush_tag(&self.tag).await?;
        tracing::debug!(tag = %self.tag, "Cache flushed");
        Ok(())
    }

    async fn cached<T, Fut>(&self, operation: &str, args: KeyArgs, fetch: Fut) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let key = derive_key(&self.tag, operation, &args);
        self.cache.remember(&key, Some(self.ttl), || fetch).await
    }

    async fn invalidated<T>(&self, operation: &str, result: T) -> Result<T> {
        self.flush().await?;
        tracing::trace!(tag = %self.tag, operation, "Invalidated after write");
        Ok(result)
    }
}

#[async_trait]
impl<R> Repository for CachedRepository<R>
where
    R: Repository + 'static,
{
    type Model = R::Model;

    async fn all(
        &self,
        columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
        sorts: &[Sort],
    ) -> Result<Vec<R::Model>> {
        let args = KeyArgs::new()
            .arg("columns", columns)
            .arg("relations", relations)
            .arg("conditions", conditions)
            .arg("sorts", sorts);
        self.cached(
            "all",
            args,
            self.repository.all(columns, relations, conditions, sorts),
        )
        .await
    }

    async fn paginate(
        &self,
        page: PageRequest,
        columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
        sorts: &[Sort],
    ) -> Result<Page<R::Model>> {
        let args = KeyArgs::new()
            .arg("per_page", &page.per_page)
            .arg("page", &page.page)
            .arg("columns", columns)
            .arg("relations", relations)
            .arg("conditions", conditions)
            .arg("sorts", sorts);
        self.cached(
            "paginate",
            args,
            self.repository
                .paginate(page, columns, relations, conditions, sorts),
        )
        .await
    }

    async fn first(&self, columns: &[&str], relations: &[&str]) -> Result<Option<R::Model>> {
        let args = KeyArgs::new()
            .arg("columns", columns)
            .arg("relations", relations);
        self.cached("first", args, self.repository.first(columns, relations))
            .await
    }

    async fn first_or_fail(&self, columns: &[&str], relations: &[&str]) -> Result<R::Model> {
        let args = KeyArgs::new()
            .arg("columns", columns)
            .arg("relations", relations);
        self.cached(
            "first_or_fail",
            args,
            self.repository.first_or_fail(columns, relations),
        )
        .await
    }

    async fn find(
        &self,
        id: ModelId,
        columns: &[&str],
        relations: &[&str],
    ) -> Result<Option<R::Model>> {
        let args = KeyArgs::new()
            .arg("id", &id)
            .arg("columns", columns)
            .arg("relations", relations);
        self.cached("find", args, self.repository.find(id, columns, relations))
            .await
    }

    async fn find_by(
        &self,
        conditions: &[Condition],
        columns: &[&str],
        relations: &[&str],
    ) -> Result<Vec<R::Model>> {
        let args = KeyArgs::new()
            .arg("conditions", conditions)
            .arg("columns", columns)
            .arg("relations", relations);
        self.cached(
            "find_by",
            args,
            self.repository.find_by(conditions, columns, relations),
        )
        .await
    }

    async fn exists(&self, conditions: &[Condition]) -> Result<bool> {
        let args = KeyArgs::new().arg("conditions", conditions);
        self.cached("exists", args, self.repository.exists(conditions))
            .await
    }

    async fn count(&self, conditions: &[Condition]) -> Result<u64> {
        let args = KeyArgs::new().arg("conditions", conditions);
        self.cached("count", args, self.repository.count(conditions))
            .await
    }

    async fn filter(
        &self,
        filters: &Filters,
        columns: &[&str],
        relations: &[&str],
    ) -> Result<Vec<R::Model>> {
        let args = KeyArgs::new()
            .arg("filters", filters)
            .arg("columns", columns)
            .arg("relations", relations);
        self.cached(
            "filter",
            args,
            self.repository.filter(filters, columns, relations),
        )
        .await
    }

    async fn transform_all(&self, columns: &[&str], relations: &[&str]) -> Result<Vec<Value>> {
        let args = KeyArgs::new()
            .arg("columns", columns)
            .arg("relations", relations);
        self.cached(
            "transform_all",
            args,
            self.repository.transform_all(columns, relations),
        )
        .await
    }

    async fn pluck(&self, column: &str, key: Option<&str>, use_cache: bool) -> Result<Value> {
        if !use_cache {
            return self.repository.pluck(column, key, false).await;
        }

        let args = KeyArgs::new().arg("column", column).arg("key", &key);
        self.cached("pluck", args, self.repository.pluck(column, key, true))
            .await
    }

    async fn with_trashed(
        &self,
        columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
    ) -> Result<Vec<R::Model>> {
        let args = KeyArgs::new()
            .arg("columns", columns)
            .arg("relations", relations)
            .arg("conditions", conditions);
        self.cached(
            "with_trashed",
            args,
            self.repository.with_trashed(columns, relations, conditions),
        )
        .await
    }

    async fn only_trashed(
        &self,
        columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
    ) -> Result<Vec<R::Model>> {
        let args = KeyArgs::new()
            .arg("columns", columns)
            .arg("relations", relations)
            .arg("conditions", conditions);
        self.cached(
            "only_trashed",
            args,
            self.repository.only_trashed(columns, relations, conditions),
        )
        .await
    }

    async fn create(&self, attributes: &Attributes) -> Result<R::Model> {
        let model = self.repository.create(attributes).await?;
        self.invalidated("create", model).await
    }

    async fn update(
        &self,
        id: ModelId,
        attributes: &Attributes,
    ) -> Result<UpdateOutcome<R::Model>> {
        let outcome = self.repository.update(id, attributes).await?;
        if !outcome.is_changed() {
            tracing::trace!(tag = %self.tag, id, "Update changed nothing, cache kept");
            return Ok(outcome);
        }
        self.invalidated("update", outcome).await
    }

    async fn update_where(&self, conditions: &[Condition], attributes: &Attributes) -> Result<u64> {
        let changed = self.repository.update_where(conditions, attributes).await?;
        self.invalidated("update_where", changed).await
    }

    async fn delete(&self, id: ModelId) -> Result<bool> {
        let deleted = self.repository.delete(id).await?;
        self.invalidated("delete", deleted).await
    }

    async fn delete_where(&self, conditions: &[Condition]) -> Result<u64> {
        let deleted = self.repository.delete_where(conditions).await?;
        self.invalidated("delete_where", deleted).await
    }

    async fn force_delete(&self, id: ModelId) -> Result<bool> {
        let deleted = self.repository.force_delete(id).await?;
        self.invalidated("force_delete", deleted).await
    }

    async fn force_delete_where(&self, conditions: &[Condition]) -> Result<u64> {
        let deleted = self.repository.force_delete_where(conditions).await?;
        self.invalidated("force_delete_where", deleted).await
    }

    async fn restore(&self, id: ModelId) -> Result<bool> {
        let restored = self.repository.restore(id).await?;
        self.invalidated("restore", restored).await
    }

    async fn first_or_create(
        &self,
        attributes: &Attributes,
        values: &Attributes,
    ) -> Result<R::Model> {
        let model = self.repository.first_or_create(attributes, values).await?;
        self.invalidated("first_or_create", model).await
    }

    async fn update_or_create(
        &self,
        attributes: &Attributes,
        values: &Attributes,
    ) -> Result<R::Model> {
        let model = self.repository.update_or_create(attributes, values).await?;
        self.invalidated("update_or_create", model).await
    }

    async fn upsert(&self, rows: &[Attributes], unique_by: &[&str], update: &[&str]) -> Result<u64> {
        let affected = self.repository.upsert(rows, unique_by, update).await?;
        self.invalidated("upsert", affected).await
    }

    async fn sync(
        &self,
        id: ModelId,
        relation: &str,
        related: &[ModelId],
        detaching: bool,
    ) -> Result<SyncChanges> {
        let changes = self
            .repository
            .sync(id, relation, related, detaching)
            .await?;
        self.invalidated("sync", changes).await
    }

    async fn detach(&self, id: ModelId, relation: &str, related: Option<&[ModelId]>) -> Result<u64> {
        let detached = self.repository.detach(id, relation, related).await?;
        self.invalidated("detach", detached).await
    }

    async fn load(&self, model: &R::Model, relations: &[&str]) -> Result<RelationMap> {
        self.repository.load(model, relations).await
    }

    fn to_plain(&self, model: &R::Model) -> Result<Value> {
        self.repository.to_plain(model)
    }
}
