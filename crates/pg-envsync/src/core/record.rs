//! Record and value types for keyed data reconciliation.
//!
//! A [`Record`] is an ordered mapping from field name to a tagged scalar
//! [`Value`], as produced by a full-table scan. Field order follows the result
//! row description, which keeps generated INSERT column lists deterministic.

use bytes::BytesMut;
use indexmap::IndexMap;
use tokio_postgres::types::{IsNull, ToSql, Type};

/// A tagged scalar value.
///
/// Equality is strict: no coercion is ever performed, so `Int(1)` never
/// equals `Text("1")`. Catalog types outside this set (numeric, dates, uuid,
/// json, ...) are read back in their canonical text form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => {
                // Narrow to the wire width the column actually uses.
                if *ty == Type::INT2 {
                    (*v as i16).to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    (*v as i32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Text(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// An ordered mapping from field name to value, one per table row.
///
/// Records used for reconciliation are expected to carry the identity field;
/// records lacking it are excluded from matching (logged, never erred).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value, preserving first-insertion order.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The identity value, if the record carries the identity field.
    pub fn identity(&self, identity_field: &str) -> Option<&Value> {
        self.fields.get(identity_field)
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An ordered sequence of records, as returned by a full-table scan.
pub type RecordSet = Vec<Record>;

/// The minimal insert/update set required to converge the target's data
/// toward the source's, without touching target-only rows.
///
/// `inserts` holds full source records whose identity is absent on the target;
/// `updates` holds full source records whose identity exists on the target but
/// whose non-identity fields differ in at least one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub inserts: Vec<Record>,
    pub updates: Vec<Record>,
}

impl ReconciliationPlan {
    /// Check whether the plan contains no work.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_strict_equality() {
        assert_ne!(Value::Int(1), Value::Text("1".into()));
        assert_ne!(Value::Null, Value::Text(String::new()));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Text("a".into()), Value::Text("a".into()));
    }

    #[test]
    fn test_record_field_order_preserved() {
        let rec = Record::new()
            .with("id", 1)
            .with("name", "Alpha")
            .with("active", true);

        let names: Vec<_> = rec.field_names().cloned().collect();
        assert_eq!(names, vec!["id", "name", "active"]);
    }

    #[test]
    fn test_record_identity() {
        let rec = Record::new().with("id", 7).with("name", "x");
        assert_eq!(rec.identity("id"), Some(&Value::Int(7)));
        assert_eq!(rec.identity("uid"), None);
    }

    #[test]
    fn test_plan_is_empty() {
        let mut plan = ReconciliationPlan::default();
        assert!(plan.is_empty());
        plan.inserts.push(Record::new().with("id", 1));
        assert!(!plan.is_empty());
    }
}
