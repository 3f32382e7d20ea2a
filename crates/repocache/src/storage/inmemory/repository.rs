//! In-memory repository implementation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use repocache_core::storage::{
    compare_rows, matches_all, matches_filters, project, Attributes, Condition, Filters, Model,
    ModelId, Page, PageRequest, RelationMap, Repository, RepositoryError, Result, Sort,
    SyncChanges, UpdateOutcome,
};

/// A stored record: the model's JSON object plus its soft-delete marker.
#[derive(Debug, Clone)]
struct Row {
    data: Value,
    deleted_at: Option<DateTime<Utc>>,
}

impl Row {
    fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Live,
    WithTrashed,
    OnlyTrashed,
}

impl Scope {
    fn includes(self, row: &Row) -> bool {
        match self {
            Self::Live => !row.is_trashed(),
            Self::WithTrashed => true,
            Self::OnlyTrashed => row.is_trashed(),
        }
    }
}

#[derive(Debug, Clone)]
struct State {
    rows: BTreeMap<ModelId, Row>,
    /// Relation -> owner id -> related ids.
    pivots: HashMap<String, BTreeMap<ModelId, BTreeSet<ModelId>>>,
    next_id: ModelId,
}

impl State {
    /// Rows in scope matching every condition, in id order.
    fn select(&self, scope: Scope, conditions: &[Condition]) -> Vec<(ModelId, &Row)> {
        self.rows
            .iter()
            .filter(|(_, row)| scope.includes(row) && matches_all(&row.data, conditions))
            .map(|(id, row)| (*id, row))
            .collect()
    }

    fn first_live(&self, conditions: &[Condition]) -> Option<ModelId> {
        self.rows
            .iter()
            .find(|(_, row)| !row.is_trashed() && matches_all(&row.data, conditions))
            .map(|(id, _)| *id)
    }

    fn is_live(&self, id: ModelId) -> bool {
        self.rows.get(&id).is_some_and(|row| !row.is_trashed())
    }

    fn related(&self, relation: &str, id: ModelId) -> Vec<ModelId> {
        self.pivots
            .get(relation)
            .and_then(|owners| owners.get(&id))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// In-memory storage backend.
///
/// Uses a `BTreeMap` wrapped in `Arc<RwLock<_>>` for thread-safe access.
/// Clones share the same data. Data is not persisted and will be lost when
/// the last clone is dropped.
///
/// Every read operation increments a shared counter, which tests use to tell
/// cache hits from real queries.
pub struct InMemoryRepository<M> {
    state: Arc<RwLock<State>>,
    relations: Arc<HashSet<String>>,
    reads: Arc<AtomicUsize>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for InMemoryRepository<M> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            relations: self.relations.clone(),
            reads: self.reads.clone(),
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for InMemoryRepository<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("relations", &self.relations)
            .field("reads", &self.reads.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<M: Model> Default for InMemoryRepository<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> InMemoryRepository<M> {
    /// Creates a new empty in-memory repository without relations.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                rows: BTreeMap::new(),
                pivots: HashMap::new(),
                next_id: 1,
            })),
            relations: Arc::new(HashSet::new()),
            reads: Arc::new(AtomicUsize::new(0)),
            _model: PhantomData,
        }
    }

    /// Registers the relations this repository can sync and load.
    pub fn with_relations(mut self, relations: &[&str]) -> Self {
        self.relations = Arc::new(relations.iter().map(|r| r.to_string()).collect());
        self
    }

    /// Number of read operations served so far.
    pub fn query_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn check_relations(&self, relations: &[&str]) -> Result<()> {
        match relations.iter().find(|r| !self.relations.contains(**r)) {
            Some(unknown) => Err(RepositoryError::InvalidArgument(format!(
                "unknown relation '{unknown}' on {}",
                M::ENTITY
            ))),
            None => Ok(()),
        }
    }

    fn decode(row: &Row) -> Result<M> {
        serde_json::from_value(row.data.clone())
            .map_err(|e| RepositoryError::Serialization(e.to_string()))
    }

    fn decode_all<'a>(rows: impl IntoIterator<Item = &'a Row>) -> Result<Vec<M>> {
        rows.into_iter().map(Self::decode).collect()
    }

    /// Validates attributes against the model and returns it with its
    /// normalized row form.
    fn normalize(attributes: Attributes) -> Result<(M, Value)> {
        let model: M = serde_json::from_value(Value::Object(attributes)).map_err(|e| {
            RepositoryError::InvalidArgument(format!("invalid {} attributes: {e}", M::ENTITY))
        })?;
        let data =
            serde_json::to_value(&model).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        Ok((model, data))
    }

    fn insert(state: &mut State, attributes: &Attributes) -> Result<M> {
        let id = match attributes.get("id") {
            Some(value) => value.as_u64().ok_or_else(|| {
                RepositoryError::InvalidArgument(format!("id must be an unsigned integer, got {value}"))
            })?,
            None => state.next_id,
        };

        if state.rows.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: M::ENTITY,
                id: id.to_string(),
            });
        }
        let next_id = id.checked_add(1).ok_or_else(|| {
            RepositoryError::InvalidArgument(format!("{} id {id} is out of range", M::ENTITY))
        })?;

        let mut attributes = attributes.clone();
        attributes.insert("id".to_string(), Value::from(id));
        let (model, data) = Self::normalize(attributes)?;

        state.rows.insert(
            id,
            Row {
                data,
                deleted_at: None,
            },
        );
        state.next_id = state.next_id.max(next_id);
        Ok(model)
    }

    fn apply(state: &mut State, id: ModelId, attributes: &Attributes) -> Result<UpdateOutcome<M>> {
        let not_found = || RepositoryError::NotFound {
            entity_type: M::ENTITY,
            id: id.to_string(),
        };

        let row = state
            .rows
            .get_mut(&id)
            .filter(|row| !row.is_trashed())
            .ok_or_else(not_found)?;

        if let Some(new_id) = attributes.get("id") {
            if new_id.as_u64() != Some(id) {
                return Err(RepositoryError::InvalidArgument(format!(
                    "cannot change the id of {} {id}",
                    M::ENTITY
                )));
            }
        }

        let mut merged = row.data.as_object().cloned().unwrap_or_default();
        merged.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        let (model, data) = Self::normalize(merged)?;

        if data == row.data {
            return Ok(UpdateOutcome::Unchanged(model));
        }
        row.data = data;
        Ok(UpdateOutcome::Updated(model))
    }

    fn conditions_of(attributes: &Attributes) -> Vec<Condition> {
        attributes
            .iter()
            .map(|(column, value)| Condition::eq(column.as_str(), value.clone()))
            .collect()
    }

    fn merged(attributes: &Attributes, values: &Attributes) -> Attributes {
        let mut merged = attributes.clone();
        merged.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    async fn list(
        &self,
        scope: Scope,
        relations: &[&str],
        conditions: &[Condition],
        sorts: &[Sort],
    ) -> Result<Vec<M>> {
        self.record_read();
        self.check_relations(relations)?;

        let state = self.state.read().await;
        let mut rows: Vec<&Row> = state
            .select(scope, conditions)
            .into_iter()
            .map(|(_, row)| row)
            .collect();
        if !sorts.is_empty() {
            rows.sort_by(|a, b| compare_rows(&a.data, &b.data, sorts));
        }
        Self::decode_all(rows)
    }
}

fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl<M: Model> Repository for InMemoryRepository<M> {
    type Model = M;

    async fn all(
        &self,
        _columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
        sorts: &[Sort],
    ) -> Result<Vec<M>> {
        self.list(Scope::Live, relations, conditions, sorts).await
    }

    async fn paginate(
        &self,
        page: PageRequest,
        _columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
        sorts: &[Sort],
    ) -> Result<Page<M>> {
        if page.per_page == 0 || page.page == 0 {
            return Err(RepositoryError::InvalidArgument(format!(
                "page size and number must be positive, got {} and {}",
                page.per_page, page.page
            )));
        }

        let rows = self.list(Scope::Live, relations, conditions, sorts).await?;
        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .collect();

        Ok(Page {
            items,
            total,
            per_page: page.per_page,
            current_page: page.page,
            last_page: total.div_ceil(page.per_page).max(1),
        })
    }

    async fn first(&self, _columns: &[&str], relations: &[&str]) -> Result<Option<M>> {
        self.record_read();
        self.check_relations(relations)?;

        let state = self.state.read().await;
        state
            .first_live(&[])
            .and_then(|id| state.rows.get(&id))
            .map(Self::decode)
            .transpose()
    }

    async fn first_or_fail(&self, columns: &[&str], relations: &[&str]) -> Result<M> {
        self.first(columns, relations)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: M::ENTITY,
                id: "first".to_string(),
            })
    }

    async fn find(&self, id: ModelId, _columns: &[&str], relations: &[&str]) -> Result<Option<M>> {
        self.record_read();
        self.check_relations(relations)?;

        let state = self.state.read().await;
        state
            .rows
            .get(&id)
            .filter(|row| !row.is_trashed())
            .map(Self::decode)
            .transpose()
    }

    async fn find_by(
        &self,
        conditions: &[Condition],
        _columns: &[&str],
        relations: &[&str],
    ) -> Result<Vec<M>> {
        self.list(Scope::Live, relations, conditions, &[]).await
    }

    async fn exists(&self, conditions: &[Condition]) -> Result<bool> {
        self.record_read();
        let state = self.state.read().await;
        Ok(state.first_live(conditions).is_some())
    }

    async fn count(&self, conditions: &[Condition]) -> Result<u64> {
        self.record_read();
        let state = self.state.read().await;
        Ok(state.select(Scope::Live, conditions).len() as u64)
    }

    async fn filter(
        &self,
        filters: &Filters,
        _columns: &[&str],
        relations: &[&str],
    ) -> Result<Vec<M>> {
        self.record_read();
        self.check_relations(relations)?;

        let state = self.state.read().await;
        Self::decode_all(
            state
                .select(Scope::Live, &[])
                .into_iter()
                .map(|(_, row)| row)
                .filter(|row| matches_filters(&row.data, filters)),
        )
    }

    async fn transform_all(&self, columns: &[&str], relations: &[&str]) -> Result<Vec<Value>> {
        self.record_read();
        self.check_relations(relations)?;

        let state = self.state.read().await;
        Ok(state
            .select(Scope::Live, &[])
            .into_iter()
            .map(|(id, row)| {
                let mut plain = project(&row.data, columns);
                if let Some(object) = plain.as_object_mut() {
                    for relation in relations {
                        object.insert(relation.to_string(), Value::from(state.related(relation, id)));
                    }
                }
                plain
            })
            .collect())
    }

    async fn pluck(&self, column: &str, key: Option<&str>, _use_cache: bool) -> Result<Value> {
        self.record_read();

        let state = self.state.read().await;
        let rows = state.select(Scope::Live, &[]);
        let value_of = |row: &Row, column: &str| row.data.get(column).cloned().unwrap_or(Value::Null);

        Ok(match key {
            None => Value::Array(rows.iter().map(|(_, row)| value_of(row, column)).collect()),
            Some(key) => Value::Object(
                rows.iter()
                    .map(|(_, row)| (key_string(&value_of(row, key)), value_of(row, column)))
                    .collect(),
            ),
        })
    }

    async fn with_trashed(
        &self,
        _columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
    ) -> Result<Vec<M>> {
        self.list(Scope::WithTrashed, relations, conditions, &[])
            .await
    }

    async fn only_trashed(
        &self,
        _columns: &[&str],
        relations: &[&str],
        conditions: &[Condition],
    ) -> Result<Vec<M>> {
        self.list(Scope::OnlyTrashed, relations, conditions, &[])
            .await
    }

    async fn create(&self, attributes: &Attributes) -> Result<M> {
        let mut state = self.state.write().await;
        Self::insert(&mut state, attributes)
    }

    async fn update(&self, id: ModelId, attributes: &Attributes) -> Result<UpdateOutcome<M>> {
        let mut state = self.state.write().await;
        Self::apply(&mut state, id, attributes)
    }

    async fn update_where(&self, conditions: &[Condition], attributes: &Attributes) -> Result<u64> {
        let mut state = self.state.write().await;
        let ids: Vec<ModelId> = state
            .select(Scope::Live, conditions)
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let mut changed = 0;
        for id in ids {
            if Self::apply(&mut state, id, attributes)?.is_changed() {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(&self, id: ModelId) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.rows.get_mut(&id) {
            Some(row) if !row.is_trashed() => {
                row.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_where(&self, conditions: &[Condition]) -> Result<u64> {
        let mut state = self.state.write().await;
        let ids: Vec<ModelId> = state
            .select(Scope::Live, conditions)
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let now = Utc::now();
        for id in &ids {
            if let Some(row) = state.rows.get_mut(id) {
                row.deleted_at = Some(now);
            }
        }
        Ok(ids.len() as u64)
    }

    async fn force_delete(&self, id: ModelId) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.rows.remove(&id).is_some();
        for owners in state.pivots.values_mut() {
            owners.remove(&id);
        }
        Ok(removed)
    }

    async fn force_delete_where(&self, conditions: &[Condition]) -> Result<u64> {
        let mut state = self.state.write().await;
        let ids: Vec<ModelId> = state
            .select(Scope::WithTrashed, conditions)
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        for id in &ids {
            state.rows.remove(id);
            for owners in state.pivots.values_mut() {
                owners.remove(id);
            }
        }
        Ok(ids.len() as u64)
    }

    async fn restore(&self, id: ModelId) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.rows.get_mut(&id) {
            Some(row) if row.is_trashed() => {
                row.deleted_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn first_or_create(&self, attributes: &Attributes, values: &Attributes) -> Result<M> {
        let mut state = self.state.write().await;
        match state.first_live(&Self::conditions_of(attributes)) {
            Some(id) => match state.rows.get(&id) {
                Some(row) => Self::decode(row),
                None => Err(RepositoryError::QueryFailed(format!(
                    "{} {id} vanished during lookup",
                    M::ENTITY
                ))),
            },
            None => Self::insert(&mut state, &Self::merged(attributes, values)),
        }
    }

    async fn update_or_create(&self, attributes: &Attributes, values: &Attributes) -> Result<M> {
        let mut state = self.state.write().await;
        match state.first_live(&Self::conditions_of(attributes)) {
            Some(id) => Ok(Self::apply(&mut state, id, values)?.into_model()),
            None => Self::insert(&mut state, &Self::merged(attributes, values)),
        }
    }

    async fn upsert(&self, rows: &[Attributes], unique_by: &[&str], update: &[&str]) -> Result<u64> {
        if unique_by.is_empty() {
            return Err(RepositoryError::InvalidArgument(
                "upsert needs at least one unique column".to_string(),
            ));
        }
        for row in rows {
            if let Some(missing) = unique_by.iter().find(|column| !row.contains_key(**column)) {
                return Err(RepositoryError::InvalidArgument(format!(
                    "upsert row is missing unique column '{missing}'"
                )));
            }
        }

        let mut state = self.state.write().await;
        // Rows land in a staged copy so a failing row leaves nothing behind.
        let mut staged = state.clone();
        let mut affected = 0;
        for row in rows {
            let conditions: Vec<Condition> = unique_by
                .iter()
                .filter_map(|column| row.get(*column).map(|v| Condition::eq(*column, v.clone())))
                .collect();

            match staged.first_live(&conditions) {
                Some(id) => {
                    let changes: Attributes = row
                        .iter()
                        .filter(|(column, _)| {
                            column.as_str() != "id"
                                && (update.is_empty() || update.contains(&column.as_str()))
                        })
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    if Self::apply(&mut staged, id, &changes)?.is_changed() {
                        affected += 1;
                    }
                }
                None => {
                    Self::insert(&mut staged, row)?;
                    affected += 1;
                }
            }
        }
        *state = staged;
        Ok(affected)
    }

    async fn sync(
        &self,
        id: ModelId,
        relation: &str,
        related: &[ModelId],
        detaching: bool,
    ) -> Result<SyncChanges> {
        self.check_relations(&[relation])?;

        let mut state = self.state.write().await;
        if !state.is_live(id) {
            return Err(RepositoryError::NotFound {
                entity_type: M::ENTITY,
                id: id.to_string(),
            });
        }

        let wanted: BTreeSet<ModelId> = related.iter().copied().collect();
        let current = state
            .pivots
            .entry(relation.to_string())
            .or_default()
            .entry(id)
            .or_default();

        let attached: Vec<ModelId> = wanted.difference(current).copied().collect();
        let detached: Vec<ModelId> = if detaching {
            current.difference(&wanted).copied().collect()
        } else {
            Vec::new()
        };

        current.extend(attached.iter().copied());
        for gone in &detached {
            current.remove(gone);
        }

        Ok(SyncChanges { attached, detached })
    }

    async fn detach(&self, id: ModelId, relation: &str, related: Option<&[ModelId]>) -> Result<u64> {
        self.check_relations(&[relation])?;

        let mut state = self.state.write().await;
        let Some(current) = state
            .pivots
            .get_mut(relation)
            .and_then(|owners| owners.get_mut(&id))
        else {
            return Ok(0);
        };

        let removed = match related {
            None => {
                let count = current.len();
                current.clear();
                count
            }
            Some(ids) => ids.iter().filter(|related| current.remove(*related)).count(),
        };
        Ok(removed as u64)
    }

    async fn load(&self, model: &M, relations: &[&str]) -> Result<RelationMap> {
        self.record_read();
        self.check_relations(relations)?;

        let state = self.state.read().await;
        Ok(relations
            .iter()
            .map(|relation| (relation.to_string(), state.related(relation, model.id())))
            .collect())
    }

    fn to_plain(&self, model: &M) -> Result<Value> {
        serde_json::to_value(model).map_err(|e| RepositoryError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, User};
    use repocache_core::storage::Operator;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    async fn seeded() -> InMemoryRepository<User> {
        let repo = InMemoryRepository::<User>::new().with_relations(&["roles"]);
        repo.create(&NewUser::new("Ada", "ada@example.com").age(36).attributes())
            .await
            .unwrap();
        repo.create(&NewUser::new("Grace", "grace@example.com").age(45).attributes())
            .await
            .unwrap();
        repo.create(
            &NewUser::new("Linus", "linus@example.com")
                .status("banned")
                .age(28)
                .attributes(),
        )
        .await
        .unwrap();
        repo
    }

    // ==================== Create / Find ====================

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let repo = seeded().await;

        let ada = repo.find(1, &[], &[]).await.unwrap().unwrap();
        assert_eq!(ada.name, "Ada");
        assert_eq!(ada.age, Some(36));

        let linus = repo.find(3, &[], &[]).await.unwrap().unwrap();
        assert_eq!(linus.status, "banned");
    }

    #[tokio::test]
    async fn test_create_with_explicit_id() {
        let repo = InMemoryRepository::<User>::new();
        let mut attributes = NewUser::new("Ada", "ada@example.com").attributes();
        attributes.insert("id".to_string(), json!(10));

        let ada = repo.create(&attributes).await.unwrap();
        assert_eq!(ada.id, 10);

        // Next generated id continues after the explicit one
        let grace = repo
            .create(&NewUser::new("Grace", "grace@example.com").attributes())
            .await
            .unwrap();
        assert_eq!(grace.id, 11);

        let result = repo.create(&attributes).await;
        assert!(matches!(
            result,
            Err(RepositoryError::AlreadyExists {
                entity_type: "User",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_id_at_upper_bound() {
        let repo = InMemoryRepository::<User>::new();
        let mut attributes = NewUser::new("Ada", "ada@example.com").attributes();
        attributes.insert("id".to_string(), json!(u64::MAX));

        let result = repo.create(&attributes).await;
        assert!(matches!(result, Err(RepositoryError::InvalidArgument(_))));
        assert_eq!(repo.count(&[]).await.unwrap(), 0);

        // The largest usable id still works and ids stay assignable below it
        attributes.insert("id".to_string(), json!(u64::MAX - 1));
        let ada = repo.create(&attributes).await.unwrap();
        assert_eq!(ada.id, u64::MAX - 1);

        let result = repo
            .update_or_create(
                &attrs(json!({"email": "grace@example.com"})),
                &attrs(json!({"id": u64::MAX, "name": "Grace", "status": "active"})),
            )
            .await;
        assert!(matches!(result, Err(RepositoryError::InvalidArgument(_))));
        assert_eq!(repo.count(&[]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_incomplete_attributes() {
        let repo = InMemoryRepository::<User>::new();
        let result = repo.create(&attrs(json!({"name": "Ada"}))).await;

        assert!(matches!(result, Err(RepositoryError::InvalidArgument(_))));
        assert_eq!(repo.count(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_nonexistent() {
        let repo = seeded().await;
        assert!(repo.find(99, &[], &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_relation_is_rejected() {
        let repo = seeded().await;
        let result = repo.find(1, &[], &["posts"]).await;
        assert!(matches!(result, Err(RepositoryError::InvalidArgument(_))));
    }

    // ==================== Queries ====================

    #[tokio::test]
    async fn test_all_with_conditions_and_sorts() {
        let repo = seeded().await;

        let active = repo
            .all(
                &[],
                &[],
                &[Condition::eq("status", "active")],
                &[Sort::desc("age")],
            )
            .await
            .unwrap();

        let names: Vec<&str> = active.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Grace", "Ada"]);
    }

    #[tokio::test]
    async fn test_paginate() {
        let repo = seeded().await;

        let page = repo
            .paginate(PageRequest::new(2, 2), &[], &[], &[], &[Sort::asc("id")])
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.last_page, 2);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Linus");

        let result = repo
            .paginate(PageRequest::new(0, 1), &[], &[], &[], &[])
            .await;
        assert!(matches!(result, Err(RepositoryError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_paginate_empty_has_one_page() {
        let repo = InMemoryRepository::<User>::new();
        let page = repo
            .paginate(PageRequest::new(10, 1), &[], &[], &[], &[])
            .await
            .unwrap();

        assert_eq!(page.total, 0);
        assert_eq!(page.last_page, 1);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_first_and_first_or_fail() {
        let repo = seeded().await;
        assert_eq!(repo.first(&[], &[]).await.unwrap().unwrap().id, 1);

        let empty = InMemoryRepository::<User>::new();
        assert!(empty.first(&[], &[]).await.unwrap().is_none());
        assert!(matches!(
            empty.first_or_fail(&[], &[]).await,
            Err(RepositoryError::NotFound {
                entity_type: "User",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_find_by_exists_count() {
        let repo = seeded().await;
        let older = [Condition::new("age", Operator::Gt, 30).unwrap()];

        assert_eq!(repo.find_by(&older, &[], &[]).await.unwrap().len(), 2);
        assert!(repo.exists(&older).await.unwrap());
        assert_eq!(repo.count(&older).await.unwrap(), 2);
        assert!(!repo
            .exists(&[Condition::eq("name", "Nobody")])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_filter() {
        let repo = seeded().await;
        let mut filters = Filters::new();
        filters.insert("status".to_string(), json!("active"));
        filters.insert("age".to_string(), json!([36, 28]));

        let users = repo.filter(&filters, &[], &[]).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Ada");
    }

    #[tokio::test]
    async fn test_transform_all_projects_and_loads() {
        let repo = seeded().await;
        repo.sync(1, "roles", &[7, 8], true).await.unwrap();

        let plain = repo
            .transform_all(&["id", "name"], &["roles"])
            .await
            .unwrap();

        assert_eq!(plain[0], json!({"id": 1, "name": "Ada", "roles": [7, 8]}));
        assert_eq!(plain[1], json!({"id": 2, "name": "Grace", "roles": []}));
    }

    #[tokio::test]
    async fn test_pluck() {
        let repo = seeded().await;

        let names = repo.pluck("name", None, true).await.unwrap();
        assert_eq!(names, json!(["Ada", "Grace", "Linus"]));

        let by_id = repo.pluck("email", Some("id"), true).await.unwrap();
        assert_eq!(by_id["1"], json!("ada@example.com"));
        assert_eq!(by_id["3"], json!("linus@example.com"));
    }

    #[tokio::test]
    async fn test_reads_are_counted() {
        let repo = seeded().await;
        assert_eq!(repo.query_count(), 0);

        repo.count(&[]).await.unwrap();
        repo.all(&[], &[], &[], &[]).await.unwrap();
        repo.first_or_fail(&[], &[]).await.unwrap();
        assert_eq!(repo.query_count(), 3);

        // Writes are not reads
        repo.delete(1).await.unwrap();
        assert_eq!(repo.query_count(), 3);
    }

    // ==================== Updates ====================

    #[tokio::test]
    async fn test_update_changed_and_unchanged() {
        let repo = seeded().await;

        let outcome = repo
            .update(1, &attrs(json!({"name": "Ada Lovelace"})))
            .await
            .unwrap();
        assert!(outcome.is_changed());
        assert_eq!(outcome.into_model().name, "Ada Lovelace");

        let outcome = repo
            .update(1, &attrs(json!({"name": "Ada Lovelace"})))
            .await
            .unwrap();
        assert!(!outcome.is_changed());
    }

    #[tokio::test]
    async fn test_update_nonexistent_and_id_change() {
        let repo = seeded().await;

        assert!(matches!(
            repo.update(99, &attrs(json!({"name": "x"}))).await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(matches!(
            repo.update(1, &attrs(json!({"id": 2}))).await,
            Err(RepositoryError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_update_where_counts_changed_rows() {
        let repo = seeded().await;

        let changed = repo
            .update_where(&[], &attrs(json!({"status": "active"})))
            .await
            .unwrap();
        // Only Linus was not active yet
        assert_eq!(changed, 1);
    }

    #[tokio::test]
    async fn test_first_or_create() {
        let repo = seeded().await;

        let existing = repo
            .first_or_create(&attrs(json!({"email": "ada@example.com"})), &Attributes::new())
            .await
            .unwrap();
        assert_eq!(existing.id, 1);

        let created = repo
            .first_or_create(
                &attrs(json!({"email": "alan@example.com"})),
                &attrs(json!({"name": "Alan", "status": "active"})),
            )
            .await
            .unwrap();
        assert_eq!(created.id, 4);
        assert_eq!(created.name, "Alan");
    }

    #[tokio::test]
    async fn test_update_or_create() {
        let repo = seeded().await;

        let updated = repo
            .update_or_create(
                &attrs(json!({"email": "grace@example.com"})),
                &attrs(json!({"age": 46})),
            )
            .await
            .unwrap();
        assert_eq!(updated.id, 2);
        assert_eq!(updated.age, Some(46));

        let created = repo
            .update_or_create(
                &attrs(json!({"email": "alan@example.com"})),
                &attrs(json!({"name": "Alan", "status": "active"})),
            )
            .await
            .unwrap();
        assert_eq!(created.id, 4);
    }

    #[tokio::test]
    async fn test_upsert() {
        let repo = seeded().await;

        let rows = vec![
            attrs(json!({"email": "ada@example.com", "name": "Countess", "status": "active"})),
            attrs(json!({"email": "alan@example.com", "name": "Alan", "status": "active"})),
        ];

        let affected = repo.upsert(&rows, &["email"], &["name"]).await.unwrap();
        assert_eq!(affected, 2);
        assert_eq!(repo.find(1, &[], &[]).await.unwrap().unwrap().name, "Countess");
        assert_eq!(repo.count(&[]).await.unwrap(), 4);

        // Same data again changes nothing
        let affected = repo.upsert(&rows, &["email"], &["name"]).await.unwrap();
        assert_eq!(affected, 0);

        assert!(matches!(
            repo.upsert(&rows, &[], &[]).await,
            Err(RepositoryError::InvalidArgument(_))
        ));
        assert!(matches!(
            repo.upsert(&rows, &["username"], &[]).await,
            Err(RepositoryError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_is_all_or_nothing() {
        let repo = seeded().await;

        let rows = vec![
            attrs(json!({"email": "ada@example.com", "name": "Countess", "status": "active"})),
            attrs(json!({"email": "alan@example.com", "name": "Alan", "status": "active"})),
            attrs(json!({"email": "bad@example.com", "name": 5, "status": "active"})),
        ];

        let result = repo.upsert(&rows, &["email"], &[]).await;
        assert!(matches!(result, Err(RepositoryError::InvalidArgument(_))));

        assert_eq!(repo.count(&[]).await.unwrap(), 3);
        assert_eq!(repo.find(1, &[], &[]).await.unwrap().unwrap().name, "Ada");

        // Generated ids were not consumed by the rejected batch
        let alan = repo
            .create(&NewUser::new("Alan", "alan@example.com").attributes())
            .await
            .unwrap();
        assert_eq!(alan.id, 4);
    }

    // ==================== Soft deletes ====================

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let repo = seeded().await;

        assert!(repo.delete(1).await.unwrap());
        assert!(!repo.delete(1).await.unwrap());
        assert!(repo.find(1, &[], &[]).await.unwrap().is_none());
        assert_eq!(repo.count(&[]).await.unwrap(), 2);

        assert_eq!(repo.with_trashed(&[], &[], &[]).await.unwrap().len(), 3);
        let trashed = repo.only_trashed(&[], &[], &[]).await.unwrap();
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].id, 1);

        assert!(repo.restore(1).await.unwrap());
        assert!(!repo.restore(1).await.unwrap());
        assert!(repo.find(1, &[], &[]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_where() {
        let repo = seeded().await;
        let deleted = repo
            .delete_where(&[Condition::eq("status", "active")])
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(repo.count(&[]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_force_delete_includes_trashed() {
        let repo = seeded().await;
        repo.sync(1, "roles", &[7], true).await.unwrap();
        repo.delete(1).await.unwrap();

        assert!(repo.force_delete(1).await.unwrap());
        assert!(!repo.force_delete(1).await.unwrap());
        assert!(repo.with_trashed(&[], &[], &[]).await.unwrap().len() == 2);

        let removed = repo
            .force_delete_where(&[Condition::eq("status", "banned")])
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    // ==================== Relations ====================

    #[tokio::test]
    async fn test_sync_attach_and_detach() {
        let repo = seeded().await;

        let changes = repo.sync(1, "roles", &[1, 2, 3], true).await.unwrap();
        assert_eq!(changes.attached, vec![1, 2, 3]);
        assert!(changes.detached.is_empty());

        let changes = repo.sync(1, "roles", &[2, 4], true).await.unwrap();
        assert_eq!(changes.attached, vec![4]);
        assert_eq!(changes.detached, vec![1, 3]);

        let changes = repo.sync(1, "roles", &[5], false).await.unwrap();
        assert_eq!(changes.attached, vec![5]);
        assert!(changes.detached.is_empty());

        let ada = repo.find(1, &[], &[]).await.unwrap().unwrap();
        let loaded = repo.load(&ada, &["roles"]).await.unwrap();
        assert_eq!(loaded["roles"], vec![2, 4, 5]);

        let unchanged = repo.sync(1, "roles", &[2, 4, 5], true).await.unwrap();
        assert!(unchanged.is_empty());
    }

    #[tokio::test]
    async fn test_sync_missing_owner() {
        let repo = seeded().await;
        assert!(matches!(
            repo.sync(99, "roles", &[1], true).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_detach() {
        let repo = seeded().await;
        repo.sync(1, "roles", &[1, 2, 3], true).await.unwrap();

        assert_eq!(repo.detach(1, "roles", Some(&[1, 9])).await.unwrap(), 1);
        assert_eq!(repo.detach(1, "roles", None).await.unwrap(), 2);
        assert_eq!(repo.detach(1, "roles", None).await.unwrap(), 0);
        assert_eq!(repo.detach(2, "roles", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_to_plain() {
        let repo = seeded().await;
        let ada = repo.find(1, &[], &[]).await.unwrap().unwrap();

        let plain = repo.to_plain(&ada).unwrap();
        assert_eq!(
            plain,
            json!({
                "id": 1,
                "name": "Ada",
                "email": "ada@example.com",
                "status": "active",
                "age": 36
            })
        );
    }
}
