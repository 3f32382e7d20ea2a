//! Pure evaluation of conditions, filters, sorting and column projection
//! over records in their JSON form.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::{like_matches, Condition, Direction, Filters, Operator, Sort};

/// Compares two JSON scalars.
///
/// Numbers compare numerically, strings lexically, booleans false < true.
/// `null` sorts before everything. Mixed or structured types do not compare.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Equality that treats `1` and `1.0` as the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

static NULL: Value = Value::Null;

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL)
}

/// Checks a single condition against a row.
pub fn matches(row: &Value, condition: &Condition) -> bool {
    let actual = field(row, &condition.column);
    let expected = &condition.value;

    match condition.operator {
        Operator::Eq => values_equal(actual, expected),
        Operator::Ne => !values_equal(actual, expected),
        Operator::Lt => compare_values(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Like => match (actual.as_str(), expected.as_str()) {
            (Some(value), Some(pattern)) => like_matches(pattern, value),
            _ => false,
        },
        Operator::In => contains(expected, actual),
        Operator::NotIn => !contains(expected, actual),
    }
}

fn contains(list: &Value, needle: &Value) -> bool {
    list.as_array()
        .is_some_and(|items| items.iter().any(|item| values_equal(item, needle)))
}

/// Checks every condition against a row.
pub fn matches_all(row: &Value, conditions: &[Condition]) -> bool {
    conditions.iter().all(|condition| matches(row, condition))
}

/// Checks a filter mapping against a row. List values mean "any of".
pub fn matches_filters(row: &Value, filters: &Filters) -> bool {
    filters.iter().all(|(column, expected)| {
        let actual = field(row, column);
        match expected {
            Value::Array(_) => contains(expected, actual),
            _ => values_equal(actual, expected),
        }
    })
}

/// Orders two rows by a list of sorts. Ties keep their relative order.
pub fn compare_rows(a: &Value, b: &Value, sorts: &[Sort]) -> Ordering {
    for sort in sorts {
        let ordering = compare_values(field(a, &sort.column), field(b, &sort.column))
            .unwrap_or(Ordering::Equal);
        let ordering = match sort.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Keeps only the requested columns. An empty list or `*` keeps everything.
///
/// # Examples
///
/// ```
/// use repocache_core::storage::project;
/// use serde_json::json;
///
/// let row = json!({"id": 1, "name": "Ada", "email": "ada@example.com"});
/// assert_eq!(project(&row, &["id", "name"]), json!({"id": 1, "name": "Ada"}));
/// assert_eq!(project(&row, &["*"]), row);
/// ```
pub fn project(row: &Value, columns: &[&str]) -> Value {
    if columns.is_empty() || columns.contains(&"*") {
        return row.clone();
    }
    let Some(object) = row.as_object() else {
        return row.clone();
    };

    let projected: Map<String, Value> = columns
        .iter()
        .filter_map(|column| {
            object
                .get(*column)
                .map(|value| (column.to_string(), value.clone()))
        })
        .collect();
    Value::Object(projected)
}
