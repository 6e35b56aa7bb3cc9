//! Schema dialect: `chatgraph_schema_v1`
//!
//! A schema is a list of node types (each naming the predicates it uses) and a
//! list of predicate definitions (value type, list-ness, indexes, `@reverse`).
//! `SchemaV1::render` produces Dgraph schema text in the usual layout: type
//! blocks first, then one line per predicate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use thiserror::Error;

use crate::digest::schema_digest_v1;

pub type Name = String;

/// Version tag carried by every serialized schema artifact.
pub const SCHEMA_V1_VERSION: &str = "chatgraph_schema_v1";

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    Geo,
    Uid,
}

impl ValueType {
    pub fn dql(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::DateTime => "datetime",
            ValueType::Geo => "geo",
            ValueType::Uid => "uid",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dql())
    }
}

/// Index tokenizers supported by the demo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Exact,
    Hash,
    Term,
    Fulltext,
    Trigram,
    Int,
    Float,
    Bool,
    Geo,
    Year,
    Month,
    Day,
    Hour,
}

impl IndexKind {
    pub fn dql(self) -> &'static str {
        match self {
            IndexKind::Exact => "exact",
            IndexKind::Hash => "hash",
            IndexKind::Term => "term",
            IndexKind::Fulltext => "fulltext",
            IndexKind::Trigram => "trigram",
            IndexKind::Int => "int",
            IndexKind::Float => "float",
            IndexKind::Bool => "bool",
            IndexKind::Geo => "geo",
            IndexKind::Year => "year",
            IndexKind::Month => "month",
            IndexKind::Day => "day",
            IndexKind::Hour => "hour",
        }
    }

    /// The value type this tokenizer can index.
    pub fn indexes(self) -> ValueType {
        match self {
            IndexKind::Exact
            | IndexKind::Hash
            | IndexKind::Term
            | IndexKind::Fulltext
            | IndexKind::Trigram => ValueType::String,
            IndexKind::Int => ValueType::Int,
            IndexKind::Float => ValueType::Float,
            IndexKind::Bool => ValueType::Bool,
            IndexKind::Geo => ValueType::Geo,
            IndexKind::Year | IndexKind::Month | IndexKind::Day | IndexKind::Hour => {
                ValueType::DateTime
            }
        }
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dql())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredicateDefV1 {
    pub name: Name,
    pub value_type: ValueType,
    #[serde(default)]
    pub list: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexKind>,
    #[serde(default)]
    pub reverse: bool,
}

impl PredicateDefV1 {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            list: false,
            indexes: Vec::new(),
            reverse: false,
        }
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn index(mut self, kind: IndexKind) -> Self {
        self.indexes.push(kind);
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// `name: [uid] @index(...) @reverse .`
    pub fn render_line(&self) -> String {
        let mut line = format!("{}: ", self.name);
        if self.list {
            let _ = write!(line, "[{}]", self.value_type);
        } else {
            line.push_str(self.value_type.dql());
        }
        if !self.indexes.is_empty() {
            let kinds: Vec<&str> = self.indexes.iter().map(|k| k.dql()).collect();
            let _ = write!(line, " @index({})", kinds.join(", "));
        }
        if self.reverse {
            line.push_str(" @reverse");
        }
        line.push_str(" .");
        line
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeDefV1 {
    pub name: Name,
    pub fields: Vec<Name>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaV1 {
    pub version: String,
    pub types: Vec<TypeDefV1>,
    pub predicates: Vec<PredicateDefV1>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unsupported schema version `{found}` (expected `chatgraph_schema_v1`)")]
    UnsupportedVersion { found: String },
    #[error("invalid name `{0}`")]
    InvalidName(String),
    #[error("predicate `{0}` is declared more than once")]
    DuplicatePredicate(String),
    #[error("type `{0}` is declared more than once")]
    DuplicateType(String),
    #[error("type `{ty}` lists field `{field}` more than once")]
    DuplicateField { ty: String, field: String },
    #[error("type `{ty}` uses undeclared predicate `{field}`")]
    UnknownField { ty: String, field: String },
    #[error("predicate `{predicate}` repeats index `{index}`")]
    DuplicateIndex { predicate: String, index: IndexKind },
    #[error("predicate `{predicate}` has type `{value_type}` but index `{index}` indexes `{expected}`")]
    IndexTypeMismatch {
        predicate: String,
        index: IndexKind,
        value_type: ValueType,
        expected: ValueType,
    },
    #[error("predicate `{predicate}` is `@reverse` but not a uid predicate")]
    ReverseOnScalar { predicate: String },
    #[error("invalid schema JSON: {0}")]
    Json(String),
}

// ============================================================================
// Validation + rendering
// ============================================================================

impl SchemaV1 {
    /// The schema of the chat demo: users, groups, messages and statuses.
    pub fn chat_v1() -> Self {
        use IndexKind as I;
        use ValueType as V;

        let types = vec![
            type_def("Group", &["name", "description", "HAS"]),
            type_def(
                "User",
                &["name", "description", "phone", "location", "SEND", "POST"],
            ),
            type_def(
                "Message",
                &["content", "reactions", "sendAt", "RECEIVE", "BELONGS_TO"],
            ),
            type_def("Status", &["content", "text", "postedAt", "SEEN"]),
        ];

        let predicates = vec![
            PredicateDefV1::new("name", V::String).index(I::Exact),
            PredicateDefV1::new("description", V::String),
            PredicateDefV1::new("phone", V::Int).index(I::Int),
            PredicateDefV1::new("location", V::Geo).index(I::Geo),
            PredicateDefV1::new("content", V::String).index(I::Fulltext),
            PredicateDefV1::new("reactions", V::String).list(),
            PredicateDefV1::new("sendAt", V::DateTime).index(I::Day),
            PredicateDefV1::new("text", V::String),
            PredicateDefV1::new("postedAt", V::DateTime).index(I::Day),
            PredicateDefV1::new("HAS", V::Uid).list().reverse(),
            PredicateDefV1::new("SEND", V::Uid).list(),
            PredicateDefV1::new("POST", V::Uid).list().reverse(),
            PredicateDefV1::new("RECEIVE", V::Uid),
            PredicateDefV1::new("BELONGS_TO", V::Uid),
            PredicateDefV1::new("SEEN", V::Uid).list(),
        ];

        Self {
            version: SCHEMA_V1_VERSION.to_string(),
            types,
            predicates,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let schema: SchemaV1 =
            serde_json::from_str(text).map_err(|e| SchemaError::Json(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn to_json_pretty(&self) -> Result<String, SchemaError> {
        serde_json::to_string_pretty(self).map_err(|e| SchemaError::Json(e.to_string()))
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateDefV1> {
        self.predicates.iter().find(|p| p.name == name)
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDefV1> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Structural checks; the first violation found is returned.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.version != SCHEMA_V1_VERSION {
            return Err(SchemaError::UnsupportedVersion {
                found: self.version.clone(),
            });
        }

        let mut predicate_names = HashSet::new();
        for predicate in &self.predicates {
            check_name(&predicate.name)?;
            if !predicate_names.insert(predicate.name.as_str()) {
                return Err(SchemaError::DuplicatePredicate(predicate.name.clone()));
            }

            let mut seen_indexes = HashSet::new();
            for index in &predicate.indexes {
                if !seen_indexes.insert(*index) {
                    return Err(SchemaError::DuplicateIndex {
                        predicate: predicate.name.clone(),
                        index: *index,
                    });
                }
                if index.indexes() != predicate.value_type {
                    return Err(SchemaError::IndexTypeMismatch {
                        predicate: predicate.name.clone(),
                        index: *index,
                        value_type: predicate.value_type,
                        expected: index.indexes(),
                    });
                }
            }

            if predicate.reverse && predicate.value_type != ValueType::Uid {
                return Err(SchemaError::ReverseOnScalar {
                    predicate: predicate.name.clone(),
                });
            }
        }

        let mut type_names = HashSet::new();
        for ty in &self.types {
            check_name(&ty.name)?;
            if !type_names.insert(ty.name.as_str()) {
                return Err(SchemaError::DuplicateType(ty.name.clone()));
            }
            let mut fields = HashSet::new();
            for field in &ty.fields {
                if !fields.insert(field.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        ty: ty.name.clone(),
                        field: field.clone(),
                    });
                }
                if !predicate_names.contains(field.as_str()) {
                    return Err(SchemaError::UnknownField {
                        ty: ty.name.clone(),
                        field: field.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Validate, then render Dgraph schema text.
    pub fn render(&self) -> Result<String, SchemaError> {
        self.validate()?;

        let mut out = String::new();
        for ty in &self.types {
            let _ = writeln!(out, "type {} {{", ty.name);
            for field in &ty.fields {
                let _ = writeln!(out, "    {field}");
            }
            out.push_str("}\n\n");
        }
        for predicate in &self.predicates {
            out.push_str(&predicate.render_line());
            out.push('\n');
        }
        Ok(out)
    }

    pub fn digest(&self) -> Result<String, SchemaError> {
        Ok(schema_digest_v1(&self.render()?))
    }
}

fn type_def(name: &str, fields: &[&str]) -> TypeDefV1 {
    TypeDefV1 {
        name: name.to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn check_name(name: &str) -> Result<(), SchemaError> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_name_start(c) && chars.all(is_name_continue) => Ok(()),
        _ => Err(SchemaError::InvalidName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_schema_is_valid() {
        SchemaV1::chat_v1().validate().expect("chat schema validates");
    }

    #[test]
    fn renders_types_then_predicates() {
        let text = SchemaV1::chat_v1().render().expect("render");
        let type_pos = text.find("type Message {").expect("message type");
        let pred_pos = text.find("content: string @index(fulltext) .").expect("content");
        assert!(type_pos < pred_pos);
        assert!(text.contains("HAS: [uid] @reverse ."));
        assert!(text.contains("reactions: [string] ."));
        assert!(text.contains("sendAt: datetime @index(day) ."));
        assert!(text.contains("RECEIVE: uid ."));
        assert!(text.contains("    BELONGS_TO\n"));
    }

    #[test]
    fn rejects_index_on_wrong_type() {
        let mut schema = SchemaV1::chat_v1();
        schema.predicates.push(PredicateDefV1::new("age", ValueType::Int).index(IndexKind::Exact));
        let err = schema.validate().unwrap_err();
        assert!(matches!(err, SchemaError::IndexTypeMismatch { ref predicate, .. } if predicate == "age"));
    }

    #[test]
    fn rejects_type_field_without_predicate() {
        let mut schema = SchemaV1::chat_v1();
        schema.types[0].fields.push("members".to_string());
        assert_eq!(
            schema.validate().unwrap_err(),
            SchemaError::UnknownField {
                ty: "Group".to_string(),
                field: "members".to_string()
            }
        );
    }

    #[test]
    fn rejects_reverse_on_scalar() {
        let mut schema = SchemaV1::chat_v1();
        schema.predicates.push(PredicateDefV1::new("nick", ValueType::String).reverse());
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::ReverseOnScalar { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_predicate_and_bad_names() {
        let mut schema = SchemaV1::chat_v1();
        schema.predicates.push(PredicateDefV1::new("name", ValueType::String));
        assert_eq!(
            schema.validate().unwrap_err(),
            SchemaError::DuplicatePredicate("name".to_string())
        );

        let mut schema = SchemaV1::chat_v1();
        schema.predicates.push(PredicateDefV1::new("~HAS", ValueType::Uid));
        assert_eq!(
            schema.validate().unwrap_err(),
            SchemaError::InvalidName("~HAS".to_string())
        );
    }

    #[test]
    fn json_artifact_is_checked_on_load() {
        let schema = SchemaV1::chat_v1();
        let json = schema.to_json_pretty().expect("json");
        assert_eq!(SchemaV1::from_json_str(&json).expect("load"), schema);

        let stale = json.replace(SCHEMA_V1_VERSION, "chatgraph_schema_v0");
        assert!(matches!(
            SchemaV1::from_json_str(&stale),
            Err(SchemaError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn digest_tracks_rendered_text() {
        let a = SchemaV1::chat_v1();
        let mut b = SchemaV1::chat_v1();
        b.predicates[1].indexes.push(IndexKind::Term);
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.digest().unwrap(), SchemaV1::chat_v1().digest().unwrap());
    }
}
