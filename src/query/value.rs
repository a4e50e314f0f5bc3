//! Bindable scalar values
//!
//! Every value that ends up in a `?` placeholder goes through [`SqlValue`], so
//! the SQL text never embeds caller data.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A scalar bound to a query placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Convert a JSON scalar. Arrays, objects and numbers that fit neither
    /// `i64` nor `f64` have no SQL counterpart and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(SqlValue::Null),
            serde_json::Value::Bool(b) => Some(SqlValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(SqlValue::Int)
                .or_else(|| n.as_f64().map(SqlValue::Float)),
            serde_json::Value::String(s) => Some(SqlValue::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value.into())
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// Bind a slice of [`SqlValue`]s onto a `sqlx::query`, whatever the driver.
///
/// A macro rather than a generic function: the method-level `bind` bounds are
/// resolved per call site against the concrete database type.
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut query = $query;
        for value in $values {
            query = match value {
                $crate::query::SqlValue::Null => query.bind(None::<i64>),
                $crate::query::SqlValue::Bool(v) => query.bind(*v),
                $crate::query::SqlValue::Int(v) => query.bind(*v),
                $crate::query::SqlValue::Float(v) => query.bind(*v),
                $crate::query::SqlValue::Text(v) => query.bind(v.clone()),
                $crate::query::SqlValue::Date(v) => query.bind(*v),
                $crate::query::SqlValue::Timestamp(v) => query.bind(*v),
            };
        }
        query
    }};
}

pub(crate) use bind_values;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(SqlValue::from_json(&json!(null)), Some(SqlValue::Null));
        assert_eq!(SqlValue::from_json(&json!(true)), Some(SqlValue::Bool(true)));
        assert_eq!(SqlValue::from_json(&json!(7)), Some(SqlValue::Int(7)));
        assert_eq!(SqlValue::from_json(&json!(1.5)), Some(SqlValue::Float(1.5)));
        assert_eq!(
            SqlValue::from_json(&json!("pão")),
            Some(SqlValue::Text("pão".to_string()))
        );
    }

    #[test]
    fn test_from_json_rejects_composites() {
        assert_eq!(SqlValue::from_json(&json!([1, 2])), None);
        assert_eq!(SqlValue::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3i64)), SqlValue::Int(3));
    }
}
