//! Record trait and index/filter types

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A value stored in the secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl IndexValue {
    /// Encode for storage in the index table
    pub(crate) fn encode(&self) -> String {
        match self {
            IndexValue::String(s) => format!("s:{}", s),
            IndexValue::Int(i) => format!("i:{}", i),
            IndexValue::Bool(b) => format!("b:{}", b),
        }
    }
}

/// Comparison used by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// Filter on an indexed field
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    /// Shorthand for an equality filter
    pub fn eq(field: impl Into<String>, value: IndexValue) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value,
        }
    }

    /// Check a record's indexed fields against this filter
    ///
    /// A missing field never equals anything and always differs.
    pub fn matches(&self, fields: &HashMap<String, IndexValue>) -> bool {
        let found = fields.get(&self.field);
        match self.op {
            FilterOp::Eq => found == Some(&self.value),
            FilterOp::Ne => found != Some(&self.value),
        }
    }
}

/// A persistable record
pub trait Record: Serialize + DeserializeOwned + Send + 'static {
    /// Unique id within the collection
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds)
    fn updated_at(&self) -> i64;

    /// Collection (table namespace) name
    fn collection_name() -> &'static str;

    /// Fields to maintain in the secondary index
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_eq_and_ne() {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String("TODO".to_string()));

        assert!(Filter::eq("status", IndexValue::String("TODO".to_string())).matches(&fields));
        assert!(!Filter::eq("status", IndexValue::String("DONE".to_string())).matches(&fields));

        let ne = Filter {
            field: "status".to_string(),
            op: FilterOp::Ne,
            value: IndexValue::String("DONE".to_string()),
        };
        assert!(ne.matches(&fields));
    }

    #[test]
    fn test_filter_missing_field() {
        let fields = HashMap::new();
        assert!(!Filter::eq("parent", IndexValue::String("x".to_string())).matches(&fields));

        let ne = Filter {
            field: "parent".to_string(),
            op: FilterOp::Ne,
            value: IndexValue::String("x".to_string()),
        };
        assert!(ne.matches(&fields));
    }

    #[test]
    fn test_index_value_encoding_is_typed() {
        assert_ne!(IndexValue::String("1".to_string()).encode(), IndexValue::Int(1).encode());
        assert_eq!(IndexValue::Bool(true).encode(), "b:true");
    }
}
