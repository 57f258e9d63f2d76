use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use warrant_types::{PrincipalKind, Right, Rights};

use crate::Grants;

/// Describes a resource kind: which features are indexed and how, and
/// which groups receive rights when an entry is first created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindSchema {
    pub kind: String,
    #[serde(default)]
    pub fields: Vec<IndexedField>,
    /// Group name → rights string (e.g. `"moderator" = "rw"`), applied only
    /// when an entry is created.
    #[serde(default)]
    pub initial_group_rights: BTreeMap<String, String>,
}

/// A feature extracted from the entry document for indexing and search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedField {
    /// Feature key, relative to `features` (e.g. `"title"`, `"size.width"`).
    pub path: String,
    pub field_type: FieldType,
    /// Whether free-text queries search this field.
    #[serde(default)]
    pub searchable: bool,
}

impl IndexedField {
    fn simple(path: &str, field_type: FieldType, searchable: bool) -> Self {
        Self {
            path: path.into(),
            field_type,
            searchable,
        }
    }

    /// Shorthand for a full-text field.
    pub fn text(path: &str, searchable: bool) -> Self {
        Self::simple(path, FieldType::Text, searchable)
    }

    /// Shorthand for an exact-match string field.
    pub fn keyword(path: &str) -> Self {
        Self::simple(path, FieldType::Keyword, false)
    }

    /// Shorthand for a numeric field.
    pub fn number(path: &str) -> Self {
        Self::simple(path, FieldType::Number, false)
    }

    /// Shorthand for a boolean field.
    pub fn bool(path: &str) -> Self {
        Self::simple(path, FieldType::Bool, false)
    }

    /// Shorthand for a date/time field.
    pub fn datetime(path: &str) -> Self {
        Self::simple(path, FieldType::DateTime, false)
    }

    /// Shorthand for an opaque JSON field (stored, not indexed).
    pub fn json(path: &str) -> Self {
        Self::simple(path, FieldType::Json, false)
    }

    /// Full document path of the field.
    #[must_use]
    pub fn document_path(&self) -> String {
        format!("features.{}", self.path)
    }

    fn mapping(&self) -> Value {
        match self.field_type {
            // Equality, sorting and aggregation address the keyword itself;
            // free text goes through the `.text` sub-field.
            FieldType::Text => json!({
                "type": "keyword",
                "ignore_above": 1024,
                "fields": { "text": { "type": "text" } }
            }),
            FieldType::Keyword => json!({ "type": "keyword" }),
            FieldType::Number => json!({ "type": "double" }),
            FieldType::Bool => json!({ "type": "boolean" }),
            FieldType::DateTime => json!({ "type": "date" }),
            FieldType::Json => json!({ "type": "object", "enabled": false }),
        }
    }
}

/// The data type of an indexed feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Keyword,
    Number,
    Bool,
    DateTime,
    Json,
}

impl KindSchema {
    /// Creates a schema with no indexed fields and no initial group rights.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Vec::new(),
            initial_group_rights: BTreeMap::new(),
        }
    }

    /// Adds an indexed field.
    #[must_use]
    pub fn with_field(mut self, field: IndexedField) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an initial group grant.
    #[must_use]
    pub fn with_initial_group_rights(
        mut self,
        group: impl Into<String>,
        rights: impl Into<String>,
    ) -> Self {
        self.initial_group_rights.insert(group.into(), rights.into());
        self
    }

    /// Initial group rights parsed to flag sets. Unknown characters are
    /// skipped; configuration validation rejects them earlier.
    #[must_use]
    pub fn initial_group_rights(&self) -> BTreeMap<String, Rights> {
        self.initial_group_rights
            .iter()
            .map(|(group, rights)| (group.clone(), Rights::from_chars(rights)))
            .collect()
    }

    /// Document paths searched by free-text queries.
    #[must_use]
    pub fn searchable_paths(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.searchable)
            .map(|f| match f.field_type {
                FieldType::Text => format!("{}.text", f.document_path()),
                _ => f.document_path(),
            })
            .collect()
    }

    /// Document path used to sort by a feature.
    #[must_use]
    pub fn sort_path(&self, feature: &str) -> String {
        format!("features.{feature}")
    }

    /// Renders the backend index mapping for this kind.
    ///
    /// Identifier, creator and all grant lists are exact-match keywords.
    /// Unlisted string features are indexed as keywords too, so selections
    /// work on features the schema does not mention.
    #[must_use]
    pub fn mapping(&self) -> Value {
        let mut properties = Map::new();
        properties.insert("id".into(), json!({ "type": "keyword" }));
        properties.insert("creator".into(), json!({ "type": "keyword" }));
        for right in Right::ALL {
            for kind in [PrincipalKind::User, PrincipalKind::Group] {
                properties.insert(Grants::field_name(right, kind), json!({ "type": "keyword" }));
            }
        }

        let mut features = Map::new();
        for field in &self.fields {
            insert_nested(&mut features, &field.path, field.mapping());
        }
        properties.insert(
            "features".into(),
            json!({ "type": "object", "properties": features }),
        );
        properties.insert(
            "annotations".into(),
            json!({ "type": "object", "dynamic": true }),
        );

        json!({
            "dynamic_templates": [
                {
                    "strings_as_keywords": {
                        "match_mapping_type": "string",
                        "mapping": { "type": "keyword" }
                    }
                }
            ],
            "properties": properties
        })
    }
}

/// Inserts a mapping at a dotted path, creating intermediate object mappings.
fn insert_nested(properties: &mut Map<String, Value>, path: &str, mapping: Value) {
    match path.split_once('.') {
        None => {
            properties.insert(path.to_string(), mapping);
        }
        Some((head, rest)) => {
            let parent = properties
                .entry(head.to_string())
                .or_insert_with(|| json!({ "type": "object", "properties": {} }));
            if let Some(children) = parent
                .get_mut("properties")
                .and_then(Value::as_object_mut)
            {
                insert_nested(children, rest, mapping);
            }
        }
    }
}
