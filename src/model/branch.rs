use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A branch metadata value.
///
/// Structured values carry an explicit discriminant in their serialized
/// form; they are never inferred from the shape or prefix of the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetadataValue {
    Single(String),
    List(Vec<String>),
    Group(HashMap<String, String>),
}

impl MetadataValue {
    pub fn single(value: impl Into<String>) -> Self {
        MetadataValue::Single(value.into())
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            MetadataValue::Single(value) => Some(value),
            _ => None,
        }
    }
}

/// Named, hierarchical, snapshot-isolated content view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Hierarchical path, e.g. "MAIN/PROJECT-A".
    pub path: String,
    /// Timestamp of the latest successful commit on this branch.
    pub head: DateTime<Utc>,
    pub metadata: HashMap<String, MetadataValue>,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn new(path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            path: path.into(),
            head: now,
            metadata: HashMap::new(),
            created_at: now,
        }
    }

    /// Parent branch path, or `None` for a root branch.
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rsplit_once('/').map(|(parent, _)| parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_values_serialize_with_explicit_discriminant() {
        let single = MetadataValue::single("20240101");
        let json = serde_json::to_string(&single).unwrap();
        assert_eq!(json, r#"{"type":"single","value":"20240101"}"#);

        let list = MetadataValue::List(vec!["a".into(), "b".into()]);
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"{"type":"list","value":["a","b"]}"#);

        let parsed: MetadataValue =
            serde_json::from_str(r#"{"type":"group","value":{"lock":"versioning"}}"#).unwrap();
        assert_eq!(
            parsed,
            MetadataValue::Group(HashMap::from([("lock".into(), "versioning".into())]))
        );
    }

    #[test]
    fn parent_path_of_nested_branch() {
        assert_eq!(Branch::new("MAIN/PROJECT-A").parent_path(), Some("MAIN"));
        assert_eq!(Branch::new("MAIN/A/B").parent_path(), Some("MAIN/A"));
        assert_eq!(Branch::new("MAIN").parent_path(), None);
    }
}
