use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RepositoryError, Result};

/// Primary key of a stored record.
pub type ModelId = u64;

/// Column values used to create or update a record.
pub type Attributes = serde_json::Map<String, Value>;

/// Column to expected value. A list value matches any of its elements.
pub type Filters = serde_json::Map<String, Value>;

/// Relation name to the ids of the related records.
pub type RelationMap = BTreeMap<String, Vec<ModelId>>;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    In,
    NotIn,
}

impl FromStr for Operator {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "like" => Ok(Self::Like),
            "in" => Ok(Self::In),
            "not in" => Ok(Self::NotIn),
            other => Err(RepositoryError::InvalidArgument(format!(
                "unknown operator '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "like",
            Self::In => "in",
            Self::NotIn => "not in",
        };
        f.write_str(s)
    }
}

/// A single `column operator value` constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    /// Creates a condition, validating that list operators get a list.
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        if matches!(operator, Operator::In | Operator::NotIn) && !value.is_array() {
            return Err(RepositoryError::InvalidArgument(format!(
                "operator '{operator}' expects a list value"
            )));
        }
        Ok(Self {
            column: column.into(),
            operator,
            value,
        })
    }

    /// Creates an equality condition.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator: Operator::Eq,
            value: value.into(),
        }
    }

    /// Parses a `[column, value]` or `[column, operator, value]` tuple.
    ///
    /// # Examples
    ///
    /// ```
    /// use repocache_core::storage::{Condition, Operator};
    /// use serde_json::json;
    ///
    /// let condition = Condition::from_value(&json!(["age", ">=", 18])).unwrap();
    /// assert_eq!(condition.operator, Operator::Gte);
    ///
    /// assert!(Condition::from_value(&json!(["age"])).is_err());
    /// ```
    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(items) = value.as_array() else {
            return Err(RepositoryError::InvalidArgument(format!(
                "condition must be a list, got {value}"
            )));
        };

        match items.as_slice() {
            [column, value] => Ok(Self::eq(column_name(column)?, value.clone())),
            [column, operator, value] => {
                let operator = operator.as_str().ok_or_else(|| {
                    RepositoryError::InvalidArgument(format!(
                        "condition operator must be a string, got {operator}"
                    ))
                })?;
                Self::new(column_name(column)?, operator.parse()?, value.clone())
            }
            _ => Err(RepositoryError::InvalidArgument(format!(
                "condition must have 2 or 3 elements, got {}",
                items.len()
            ))),
        }
    }

    /// Parses either a list of condition tuples or a `column => value` mapping.
    pub fn parse_all(value: &Value) -> Result<Vec<Self>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            Value::Object(map) => Ok(map
                .iter()
                .map(|(column, value)| Self::eq(column.as_str(), value.clone()))
                .collect()),
            other => Err(RepositoryError::InvalidArgument(format!(
                "conditions must be a list or a mapping, got {other}"
            ))),
        }
    }
}

fn column_name(value: &Value) -> Result<&str> {
    value
        .as_str()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            RepositoryError::InvalidArgument(format!("condition column must be a name, got {value}"))
        })
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// Ordering on a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    pub direction: Direction,
}

impl Sort {
    /// Ascending order on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    /// Descending order on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// Requested page of a paginated listing. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub per_page: u64,
    pub page: u64,
}

impl PageRequest {
    /// Creates a page request.
    pub fn new(per_page: u64, page: u64) -> Self {
        Self { per_page, page }
    }

    /// Number of records before the requested page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// One page of records plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<M> {
    pub items: Vec<M>,
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
}

/// Result of an update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<M> {
    /// The record changed and was saved.
    Updated(M),
    /// The supplied data matched the stored record; nothing was written.
    Unchanged(M),
}

impl<M> UpdateOutcome<M> {
    /// Returns true when the record was actually modified.
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Updated(_))
    }

    /// Returns the record in its current state.
    pub fn into_model(self) -> M {
        match self {
            Self::Updated(model) | Self::Unchanged(model) => model,
        }
    }
}

/// Ids attached and detached by a relation sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncChanges {
    pub attached: Vec<ModelId>,
    pub detached: Vec<ModelId>,
}

impl SyncChanges {
    /// Returns true when the sync changed nothing.
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}
