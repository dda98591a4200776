//! Attribute values as they travel between entities and shards.
//!
//! An attribute is a [`Node`]: either a single [`Leaf`] or a branch mapping
//! keys to further nodes. Branches are what the shard store decomposes into
//! one shard per leaf; merging two branches is a key union where the right
//! hand side wins on conflicts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::maps::Matrix;
use crate::types::Interval;

/// One raw interaction measurement reported by an origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Evidence {
    /// Numeric call, normally 0 or 1
    Int(i64),
    /// Sentinel token such as "NC" or "ND"
    Token(String),
    /// No value was recorded
    Missing,
}

impl From<i64> for Evidence {
    fn from(value: i64) -> Self {
        Evidence::Int(value)
    }
}

impl From<&str> for Evidence {
    fn from(value: &str) -> Self {
        Evidence::Token(value.to_string())
    }
}

impl<T: Into<Evidence>> From<Option<T>> for Evidence {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Evidence::Missing)
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evidence::Int(v) => write!(f, "{}", v),
            Evidence::Token(t) => write!(f, "{}", t),
            Evidence::Missing => write!(f, "NA"),
        }
    }
}

/// A value stored in exactly one shard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Leaf {
    Int(i64),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
    Vector(Vec<f64>),
    Matrix(Matrix),
    Intervals(Vec<Interval>),
    Evidence(Vec<Vec<Evidence>>),
}

impl Leaf {
    /// Short type name used in decode errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Leaf::Int(_) => "int",
            Leaf::Float(_) => "float",
            Leaf::Text(_) => "text",
            Leaf::TextList(_) => "text list",
            Leaf::Vector(_) => "vector",
            Leaf::Matrix(_) => "matrix",
            Leaf::Intervals(_) => "intervals",
            Leaf::Evidence(_) => "evidence",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf(Leaf),
    Branch(BTreeMap<String, Node>),
}

impl Node {
    pub fn branch() -> Self {
        Node::Branch(BTreeMap::new())
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Branch(_))
    }

    /// Right-biased recursive merge. Keys only present in `self` survive,
    /// keys present in both take `other`'s value, and a leaf on either side
    /// is replaced wholesale.
    pub fn merge(self, other: Node) -> Node {
        match (self, other) {
            (Node::Branch(mut left), Node::Branch(right)) => {
                for (key, value) in right {
                    let merged = match left.remove(&key) {
                        Some(existing) => existing.merge(value),
                        None => value,
                    };
                    left.insert(key, merged);
                }
                Node::Branch(left)
            }
            (_, other) => other,
        }
    }

    /// Wrap `self` under `path`, innermost key last
    pub fn nest(self, path: &[String]) -> Node {
        path.iter().rev().fold(self, |node, key| {
            let mut map = BTreeMap::new();
            map.insert(key.clone(), node);
            Node::Branch(map)
        })
    }

    /// Descend along `path`
    pub fn get(&self, path: &[String]) -> Option<&Node> {
        path.iter().try_fold(self, |node, key| match node {
            Node::Branch(map) => map.get(key),
            Node::Leaf(_) => None,
        })
    }

}

impl From<Leaf> for Node {
    fn from(leaf: Leaf) -> Self {
        Node::Leaf(leaf)
    }
}

/// Conversion between typed entity fields and attribute nodes. Decoding
/// reports a shape mismatch as a message; callers turn it into a decode
/// error naming the shard.
pub trait NodeCodec: Sized {
    fn to_node(&self) -> Node;
    fn from_node(node: Node) -> Result<Self, String>;
}

fn mismatch(expected: &str, node: &Node) -> String {
    match node {
        Node::Leaf(leaf) => format!("expected {}, found {}", expected, leaf.type_name()),
        Node::Branch(_) => format!("expected {}, found a mapping", expected),
    }
}

macro_rules! leaf_codec {
    ($ty:ty, $variant:ident, $name:expr) => {
        impl NodeCodec for $ty {
            fn to_node(&self) -> Node {
                Node::Leaf(Leaf::$variant(self.clone()))
            }

            fn from_node(node: Node) -> Result<Self, String> {
                match node {
                    Node::Leaf(Leaf::$variant(value)) => Ok(value),
                    other => Err(mismatch($name, &other)),
                }
            }
        }
    };
}

leaf_codec!(i64, Int, "int");
leaf_codec!(String, Text, "text");
leaf_codec!(Vec<String>, TextList, "text list");
leaf_codec!(Vec<f64>, Vector, "vector");
leaf_codec!(Matrix, Matrix, "matrix");
leaf_codec!(Vec<Interval>, Intervals, "intervals");
leaf_codec!(Vec<Vec<Evidence>>, Evidence, "evidence");

impl NodeCodec for f64 {
    fn to_node(&self) -> Node {
        Node::Leaf(Leaf::Float(*self))
    }

    // Integer-valued features written by older collaborators decode as floats
    fn from_node(node: Node) -> Result<Self, String> {
        match node {
            Node::Leaf(Leaf::Float(value)) => Ok(value),
            Node::Leaf(Leaf::Int(value)) => Ok(value as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl<T: NodeCodec> NodeCodec for BTreeMap<String, T> {
    fn to_node(&self) -> Node {
        Node::Branch(self.iter().map(|(k, v)| (k.clone(), v.to_node())).collect())
    }

    fn from_node(node: Node) -> Result<Self, String> {
        match node {
            Node::Branch(map) => map
                .into_iter()
                .map(|(k, v)| match T::from_node(v) {
                    Ok(v) => Ok((k, v)),
                    Err(e) => Err(format!("{}: {}", k, e)),
                })
                .collect(),
            other => Err(mismatch("mapping", &other)),
        }
    }
}
