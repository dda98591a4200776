//! Typed entities over the shard store.
//!
//! An [`Entity`] names its attributes with a closed enum implementing
//! [`Attribute`], so every hydration path is checked when it is parsed
//! rather than when a shard turns out to be missing.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::errors::{DbError, DbResult};
use crate::store::split_path;
use crate::types::{EntityKey, Kind};
use crate::value::Node;

/// Closed set of attribute names of one entity kind
pub trait Attribute:
    Copy + Eq + Ord + Hash + fmt::Debug + Send + Sync + 'static
{
    /// Every attribute, in storage order
    const ALL: &'static [Self];
    /// Attributes loaded on every construct-or-load
    const CORE: &'static [Self];
    /// Attribute whose shard marks an entity as present
    const CANONICAL: Self;

    /// Name used in shard file names
    fn name(&self) -> &'static str;

    /// Whether the attribute holds a mapping that may be addressed by sub-path
    fn is_mapping(&self) -> bool;

    fn is_core(&self) -> bool {
        Self::CORE.contains(self)
    }

    fn from_name(name: &str) -> DbResult<Self> {
        Self::ALL.iter().copied().find(|attr| attr.name() == name).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|a| a.name()).collect();
            DbError::InvalidAttribute(format!(
                "Unknown attribute: {}. Must be one of: {}",
                name,
                known.join(", ")
            ))
        })
    }

    /// Every attribute that is not core
    fn extra() -> Vec<Self> {
        Self::ALL.iter().copied().filter(|attr| !attr.is_core()).collect()
    }
}

/// An attribute, optionally narrowed to a sub-path of a mapping attribute,
/// e.g. `distance_map.CA`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrPath<A> {
    pub attr: A,
    pub sub: Vec<String>,
}

impl<A: Attribute> AttrPath<A> {
    pub fn whole(attr: A) -> Self {
        Self { attr, sub: Vec::new() }
    }

    /// Dotted path as used in shard file names
    pub fn dotted(&self) -> String {
        let mut path = self.attr.name().to_string();
        for segment in &self.sub {
            path.push('.');
            path.push_str(segment);
        }
        path
    }

    /// Parse a list of dotted paths
    pub fn parse_all<S: AsRef<str>>(paths: &[S]) -> DbResult<Vec<Self>> {
        paths.iter().map(|p| p.as_ref().parse()).collect()
    }
}

impl<A: Attribute> From<A> for AttrPath<A> {
    fn from(attr: A) -> Self {
        Self::whole(attr)
    }
}

impl<A: Attribute> FromStr for AttrPath<A> {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        let mut segments = split_path(s)?.into_iter();
        let head = segments.next().unwrap_or_default();
        let attr = A::from_name(&head)?;
        let sub: Vec<String> = segments.collect();
        if !sub.is_empty() && !attr.is_mapping() {
            return Err(DbError::InvalidAttribute(format!(
                "{} is not a mapping and has no sub-path {}",
                head,
                sub.join(".")
            )));
        }
        Ok(Self { attr, sub })
    }
}

impl<A: Attribute> fmt::Display for AttrPath<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

/// A typed view over the shards of one entity
pub trait Entity: Sized + Send + Sync + 'static {
    type Key: EntityKey;
    type Attr: Attribute;

    const KIND: Kind;

    fn key(&self) -> &Self::Key;

    /// Entity with every attribute absent
    fn empty(key: Self::Key) -> Self;

    /// Set one attribute from its stored node
    fn set(&mut self, attr: Self::Attr, node: Node) -> Result<(), String>;

    /// Attributes that are currently present
    fn shards(&self) -> Vec<(Self::Attr, Node)>;

    /// Cross-attribute checks run after loading
    fn verify(&self) -> DbResult<()> {
        Ok(())
    }
}
