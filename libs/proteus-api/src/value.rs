use std::sync::Arc;

use indexmap::IndexMap;

use crate::types;

/// Canonical value representation, on both sides of a conversion.
///
/// Loosely-typed input arrives as scalars, `List` and `Map`. Converters
/// produce scalars or `Object` records for structured targets.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),

    /// Indexed collection. Children are addressed as `"0"`, `"1"`, ...
    List(Vec<Value>),
    /// Associative structure, insertion order preserved.
    Map(IndexMap<String, Value>),

    /// Structured domain value. Shared, never mutated after construction.
    Object(Arc<Record>),
}

/// A structured domain value of a class known to the `TypeSystem`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub class: String,
    /// Persistence identity, set for entities.
    pub identity: Option<String>,
    pub fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            identity: None,
            fields: IndexMap::new(),
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl Value {
    /// Wrap a record.
    pub fn object(record: Record) -> Self {
        Value::Object(Arc::new(record))
    }

    /// Primitive source tag, or the record class for objects.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => types::NULL,
            Value::Bool(_) => types::BOOLEAN,
            Value::Integer(_) => types::INTEGER,
            Value::Float(_) => types::FLOAT,
            Value::String(_) => types::STRING,
            Value::List(_) | Value::Map(_) => types::ARRAY,
            Value::Object(record) => &record.class,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Entries of a list or map as `(name, value)` pairs, in order.
    /// Empty for every other variant.
    pub fn entries(&self) -> IndexMap<String, Value> {
        match self {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            Value::Map(map) => map.clone(),
            _ => IndexMap::new(),
        }
    }

    /// JSON projection. Records become maps carrying `__type`
    /// (and `__identity` when set).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Object(record) => {
                let mut obj = serde_json::Map::new();
                obj.insert("__type".into(), serde_json::Value::String(record.class.clone()));
                if let Some(identity) = &record.identity {
                    obj.insert("__identity".into(), serde_json::Value::String(identity.clone()));
                }
                for (k, v) in &record.fields {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_integer_precision() {
        assert_eq!(Value::from(json!(42)), Value::Integer(42));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn list_entries_are_indexed() {
        let list = Value::from(json!(["a", "b"]));
        let entries = list.entries();
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["0", "1"]);
        assert_eq!(entries["1"], Value::from("b"));
    }

    #[test]
    fn record_projects_type_and_identity() {
        let record = Record::new("Person")
            .with_identity("p-1")
            .with_field("name", Value::from("Ada"));
        assert_eq!(
            Value::object(record).to_json(),
            json!({"__type": "Person", "__identity": "p-1", "name": "Ada"})
        );
    }

    #[test]
    fn type_name_uses_array_for_lists_and_maps() {
        assert_eq!(Value::List(vec![]).type_name(), "array");
        assert_eq!(Value::Map(IndexMap::new()).type_name(), "array");
        assert_eq!(Value::object(Record::new("Point")).type_name(), "Point");
    }
}
