//! Command self-description (IDL).
//!
//! Every command may describe its argument grammar as a tree of
//! [`IdlNode`]s: keyword maps, sequences, repeats, bounded scalars and
//! references to previously labeled nodes. Transports publish the
//! assembled tree as JSON so UIs can build command forms; the
//! `idlChanged` hook fires whenever the command set or a referenced
//! enumeration changes.

use serde_json::{Map, Value, json};

#[derive(Clone, Debug, PartialEq)]
pub enum IdlNode {
    /// Choice of keywords, each optionally followed by more grammar.
    Keyword {
        ident: Option<String>,
        entries: Vec<(String, Option<IdlNode>)>,
    },
    /// Fixed sequence of sub-grammars.
    Sequence(Vec<IdlNode>),
    /// Zero-or-more repetition of a sub-grammar.
    Repeat(Box<IdlNode>),
    Integer { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    Str,
    /// Reference to a node labeled elsewhere in the same tree.
    Reference(String),
}

impl IdlNode {
    #[must_use]
    pub fn keyword() -> Self {
        IdlNode::Keyword { ident: None, entries: Vec::new() }
    }

    #[must_use]
    pub fn keyword_named(ident: impl Into<String>) -> Self {
        IdlNode::Keyword { ident: Some(ident.into()), entries: Vec::new() }
    }

    /// Adds or replaces a keyword entry. No-op on non-keyword nodes.
    pub fn set(&mut self, name: impl Into<String>, child: Option<IdlNode>) {
        if let IdlNode::Keyword { entries, .. } = self {
            let name = name.into();
            if let Some(entry) = entries.iter_mut().find(|(n, _)| *n == name) {
                entry.1 = child;
            } else {
                entries.push((name, child));
            }
        }
    }

    #[must_use]
    pub fn sequence(nodes: Vec<IdlNode>) -> Self {
        IdlNode::Sequence(nodes)
    }

    #[must_use]
    pub fn repeat(node: IdlNode) -> Self {
        IdlNode::Repeat(Box::new(node))
    }

    #[must_use]
    pub fn integer() -> Self {
        IdlNode::Integer { min: None, max: None }
    }

    #[must_use]
    pub fn integer_min(min: i64) -> Self {
        IdlNode::Integer { min: Some(min), max: None }
    }

    #[must_use]
    pub fn integer_range(min: i64, max: i64) -> Self {
        IdlNode::Integer { min: Some(min), max: Some(max) }
    }

    #[must_use]
    pub fn float() -> Self {
        IdlNode::Float { min: None, max: None }
    }

    #[must_use]
    pub fn reference(ident: impl Into<String>) -> Self {
        IdlNode::Reference(ident.into())
    }

    /// Serializes the tree to JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            IdlNode::Keyword { ident, entries } => {
                let mut kws = Map::new();
                for (name, child) in entries {
                    kws.insert(
                        name.clone(),
                        child.as_ref().map_or(Value::Null, IdlNode::to_json),
                    );
                }
                let mut obj = Map::new();
                if let Some(id) = ident {
                    obj.insert("id".to_string(), json!(id));
                }
                obj.insert("keyword".to_string(), Value::Object(kws));
                Value::Object(obj)
            }
            IdlNode::Sequence(nodes) => {
                json!({ "sequence": nodes.iter().map(IdlNode::to_json).collect::<Vec<_>>() })
            }
            IdlNode::Repeat(node) => json!({ "repeat": node.to_json() }),
            IdlNode::Integer { min, max } => json!({ "integer": { "min": min, "max": max } }),
            IdlNode::Float { min, max } => json!({ "float": { "min": min, "max": max } }),
            IdlNode::Str => json!("string"),
            IdlNode::Reference(ident) => json!({ "ref": ident }),
        }
    }
}
