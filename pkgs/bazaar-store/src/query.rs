//! Query filters and ordering

use serde_json::Value;
use std::cmp::Ordering;

use crate::row::Row;

/// Row filter. A query matches a row when every top-level filter matches.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Lt(String, Value),
    In(String, Vec<Value>),
    /// Case-insensitive substring match on a text column
    Contains(String, String),
    /// Matches when any of the inner filters matches
    Any(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Neq(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(column.into(), value.into())
    }

    pub fn is_in<V, I>(column: impl Into<String>, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Filter::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::Contains(column.into(), needle.into())
    }

    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Any(filters.into_iter().collect())
    }

    /// Evaluate the filter against a row. A missing column reads as null.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::Eq(col, v) => column(row, col) == v,
            Filter::Neq(col, v) => column(row, col) != v,
            Filter::Gt(col, v) => compare(column(row, col), v) == Some(Ordering::Greater),
            Filter::Lt(col, v) => compare(column(row, col), v) == Some(Ordering::Less),
            Filter::In(col, values) => {
                let actual = column(row, col);
                values.iter().any(|v| v == actual)
            }
            Filter::Contains(col, needle) => match column(row, col) {
                Value::String(s) => s.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
            Filter::Any(filters) => filters.iter().any(|f| f.matches(row)),
        }
    }
}

/// Sort order for a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }

    /// Compare two rows on the order column. Nulls sort first when ascending.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ord = compare(column(a, &self.column), column(b, &self.column)).unwrap_or(Ordering::Equal);
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

static NULL: Value = Value::Null;

fn column<'a>(row: &'a Row, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&NULL)
}

/// Total-enough ordering over scalar JSON values. Values of different kinds
/// do not compare, except that null sorts before everything.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_any_filter_matches_either_participant() {
        let filter = Filter::any([
            Filter::eq("participant_a_id", "alice"),
            Filter::eq("participant_b_id", "alice"),
        ]);

        assert!(filter.matches(&row(json!({"participant_a_id": "alice", "participant_b_id": "bob"}))));
        assert!(filter.matches(&row(json!({"participant_a_id": "bob", "participant_b_id": "alice"}))));
        assert!(!filter.matches(&row(json!({"participant_a_id": "bob", "participant_b_id": "carol"}))));
    }

    #[test]
    fn test_gt_compares_numbers_not_text() {
        let filter = Filter::gt("created_at", 9);
        assert!(filter.matches(&row(json!({"created_at": 10}))));
        assert!(!filter.matches(&row(json!({"created_at": 9}))));
        assert!(!filter.matches(&row(json!({"created_at": "10"}))));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let filter = Filter::contains("username", "ALI");
        assert!(filter.matches(&row(json!({"username": "alice"}))));
        assert!(!filter.matches(&row(json!({"username": "bob"}))));
        assert!(!filter.matches(&row(json!({}))));
    }

    #[test]
    fn test_in_filter() {
        let filter = Filter::is_in("id", ["a", "b"]);
        assert!(filter.matches(&row(json!({"id": "b"}))));
        assert!(!filter.matches(&row(json!({"id": "c"}))));
    }

    #[test]
    fn test_order_desc_puts_nulls_last() {
        let order = Order::desc("updated_at");
        let a = row(json!({"updated_at": 5}));
        let b = row(json!({}));
        assert_eq!(order.compare(&a, &b), Ordering::Less);
    }
}
