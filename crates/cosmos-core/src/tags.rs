//! Tags — a Task's identifying key/value pairs within its Stage (§3).
//!
//! Tags are primitives (string/int/float/bool), never nested structures,
//! so equality and ordering are well defined and `(stage, tags)` can serve
//! as a uniqueness key (§3 invariant, §8.2).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}
impl From<String> for TagValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}
impl From<i64> for TagValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}
impl From<f64> for TagValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}
impl From<bool> for TagValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A `BTreeMap` rather than a `HashMap` so that tag-tuples compare and hash
/// deterministically when used as a grouping/uniqueness key in the Graph
/// Builder (§4.4) and the `(stage, tags)` uniqueness invariant (§3, §8.2).
pub type TagMap = BTreeMap<String, TagValue>;

/// Subset of a `TagMap`'s keys, used by `many2one` grouping (§4.4) to derive
/// a grouping key from a subset of parent tag keys.
pub fn project(tags: &TagMap, keys: &[String]) -> TagMap {
    keys.iter()
        .filter_map(|k| tags.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}
