//! Attribute shard store.
//!
//! Each entity kind owns one directory. An attribute of an entity lives in
//! the file `<key>.<attribute>`; mapping-valued attributes are decomposed so
//! that every leaf gets its own file, `<key>.<attribute>.<k1>.<k2>`, unless
//! the attribute is configured as opaque. Reading an attribute reassembles
//! the tree from whatever shards exist, so writers only ever touch the
//! leaves they produce and sibling leaves written by other runs survive.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::{DbError, DbResult};
use crate::io;
use crate::metrics::MetricsCollector;
use crate::types::Kind;
use crate::value::Node;

/// Attribute paths of the shards one entity has on disk
pub type ShardListing = BTreeSet<String>;

/// Shard listings of every entity in a directory, from a single scan
pub type Catalog = BTreeMap<String, ShardListing>;

const PATH_SEPARATOR: char = '.';

/// Split a dotted attribute path into its segments
pub fn split_path(path: &str) -> DbResult<Vec<String>> {
    let segments: Vec<String> = path.split(PATH_SEPARATOR).map(str::to_string).collect();
    for segment in &segments {
        check_segment(segment, path)?;
    }
    Ok(segments)
}

fn check_segment(segment: &str, path: &str) -> DbResult<()> {
    if segment.is_empty() || segment.contains(['/', '\\', PATH_SEPARATOR]) {
        return Err(DbError::InvalidAttribute(format!(
            "{:?} has an empty or invalid segment {:?}",
            path, segment
        )));
    }
    Ok(())
}

fn join(prefix: &str, rest: &[String]) -> String {
    let mut path = prefix.to_string();
    for segment in rest {
        path.push(PATH_SEPARATOR);
        path.push_str(segment);
    }
    path
}

/// Leaves and empty mappings of a node with their paths. Empty mappings are
/// kept so that "present but empty" survives a round trip.
fn flatten(node: &Node, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, Node)>) {
    match node {
        Node::Branch(map) if !map.is_empty() => {
            for (key, child) in map {
                prefix.push(key.clone());
                flatten(child, prefix, out);
                prefix.pop();
            }
        }
        other => out.push((prefix.clone(), other.clone())),
    }
}

#[derive(Debug, Clone)]
pub struct ShardStore {
    kind: Kind,
    dir: PathBuf,
    opaque: Arc<BTreeSet<String>>,
    metrics: Arc<MetricsCollector>,
}

impl ShardStore {
    /// Open (creating if needed) the directory of `kind` under `root`
    pub fn open<P: AsRef<Path>>(
        root: P,
        kind: Kind,
        opaque: &[String],
        metrics: Arc<MetricsCollector>,
    ) -> DbResult<Self> {
        let dir = root.as_ref().join(kind.dir_name());
        std::fs::create_dir_all(&dir)?;
        Ok(Self { kind, dir, opaque: Arc::new(opaque.iter().cloned().collect()), metrics })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn is_opaque(&self, attribute: &str) -> bool {
        self.opaque.contains(attribute)
    }

    fn file_name(key: &str, path: &str) -> String {
        format!("{}{}{}", key, PATH_SEPARATOR, path)
    }

    fn shard_path(&self, key: &str, path: &str) -> PathBuf {
        self.dir.join(Self::file_name(key, path))
    }

    /// Shards one entity has on disk
    pub fn list_shards(&self, key: &str) -> DbResult<ShardListing> {
        let prefix = Self::file_name(key, "");
        Ok(io::list_file_names(&self.dir)?
            .into_iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Shard listings of every entity, from one directory scan
    pub fn catalog(&self) -> DbResult<Catalog> {
        let mut catalog = Catalog::new();
        for name in io::list_file_names(&self.dir)? {
            if let Some((key, path)) = name.split_once(PATH_SEPARATOR) {
                catalog.entry(key.to_string()).or_default().insert(path.to_string());
            }
        }
        Ok(catalog)
    }

    /// Keys of every entity that has the `canonical` shard, sorted
    pub fn enumerate(&self, canonical: &str) -> DbResult<Vec<String>> {
        let suffix = format!("{}{}", PATH_SEPARATOR, canonical);
        Ok(io::list_file_names(&self.dir)?
            .into_iter()
            .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
            .filter(|key| !key.contains(PATH_SEPARATOR))
            .collect())
    }

    pub fn contains(&self, key: &str, canonical: &str) -> bool {
        self.shard_path(key, canonical).is_file()
    }

    fn read_shard(&self, key: &str, path: &str) -> DbResult<Option<Node>> {
        let Some(bytes) = io::read_optional(self.shard_path(key, path))? else {
            return Ok(None);
        };
        self.metrics.record_shard_read();
        io::decode::<Node>(&bytes).map(Some).map_err(|message| DbError::Decode {
            key: key.to_string(),
            shard: path.to_string(),
            message,
        })
    }

    fn write_shard(&self, key: &str, path: &str, node: &Node) -> DbResult<()> {
        let bytes = io::encode(node)?;
        io::write_atomic(&self.dir, &Self::file_name(key, path), &bytes)?;
        self.metrics.record_shard_write();
        debug!(kind = %self.kind, key, shard = path, bytes = bytes.len(), "wrote shard");
        Ok(())
    }

    fn remove_shard(&self, key: &str, path: &str, listing: &mut ShardListing) -> DbResult<()> {
        if listing.remove(path) {
            io::remove_if_exists(self.shard_path(key, path))?;
        }
        Ok(())
    }

    /// Read one attribute (or a sub-path of one), scanning the directory for
    /// its shards. Absent attributes are `Ok(None)`.
    pub fn read(&self, key: &str, path: &str) -> DbResult<Option<Node>> {
        let listing = self.list_shards(key)?;
        self.read_from(key, path, &listing)
    }

    /// Read one attribute using a listing obtained earlier
    pub fn read_from(&self, key: &str, path: &str, listing: &ShardListing) -> DbResult<Option<Node>> {
        let segments = split_path(path)?;
        let top = &segments[0];

        if self.is_opaque(top) {
            if !listing.contains(top.as_str()) {
                return Ok(None);
            }
            let whole = self.read_shard(key, top)?;
            return Ok(whole.and_then(|node| node.get(&segments[1..]).cloned()));
        }

        let mut assembled: Option<Node> = None;
        if listing.contains(path) {
            assembled = self.read_shard(key, path)?;
        }
        let prefix = format!("{}{}", path, PATH_SEPARATOR);
        for shard in listing.iter().filter(|shard| shard.starts_with(&prefix)) {
            let Some(node) = self.read_shard(key, shard)? else {
                continue;
            };
            let rest = split_path(&shard[prefix.len()..])?;
            let nested = node.nest(&rest);
            assembled = Some(match assembled {
                Some(existing) => existing.merge(nested),
                None => nested,
            });
        }
        Ok(assembled)
    }

    /// Write one attribute. `None` writes nothing.
    pub fn write(&self, key: &str, path: &str, node: Option<&Node>) -> DbResult<()> {
        let Some(node) = node else {
            return Ok(());
        };
        let mut listing = self.list_shards(key)?;
        self.write_into(key, path, node, &mut listing)
    }

    /// Write several attributes of one entity with a single directory scan
    pub fn write_all(&self, key: &str, attributes: &[(String, Node)]) -> DbResult<()> {
        let mut listing = self.list_shards(key)?;
        for (path, node) in attributes {
            self.write_into(key, path, node, &mut listing)?;
        }
        Ok(())
    }

    fn write_into(
        &self,
        key: &str,
        path: &str,
        node: &Node,
        listing: &mut ShardListing,
    ) -> DbResult<()> {
        let segments = split_path(path)?;
        let top = &segments[0];

        if self.is_opaque(top) {
            let merged = if segments.len() == 1 {
                node.clone()
            } else {
                let existing = self.read_shard(key, top)?.unwrap_or_else(Node::branch);
                existing.merge(node.clone().nest(&segments[1..]))
            };
            self.write_shard(key, top, &merged)?;
            listing.insert(top.clone());
            return Ok(());
        }

        // An ancestor stored as a leaf would shadow the new leaves
        for depth in 1..segments.len() {
            self.remove_shard(key, &segments[..depth].join("."), listing)?;
        }

        let mut items = Vec::new();
        flatten(node, &mut Vec::new(), &mut items);
        for (rest, item) in items {
            for segment in &rest {
                check_segment(segment, path)?;
            }
            let shard = join(path, &rest);
            for depth in 0..rest.len() {
                self.remove_shard(key, &join(path, &rest[..depth]), listing)?;
            }
            self.write_shard(key, &shard, &item)?;
            listing.insert(shard.clone());

            if !item.is_branch() {
                // A leaf replaces everything that used to live below it
                let prefix = format!("{}{}", shard, PATH_SEPARATOR);
                let below: Vec<String> =
                    listing.iter().filter(|s| s.starts_with(&prefix)).cloned().collect();
                for stale in below {
                    self.remove_shard(key, &stale, listing)?;
                }
            }
        }
        Ok(())
    }

    /// Remove every shard of `key` not named in `keep`, returning the number
    /// removed
    pub fn remove_except(&self, key: &str, keep: &ShardListing) -> DbResult<usize> {
        let mut listing = self.list_shards(key)?;
        let stale: Vec<String> = listing.difference(keep).cloned().collect();
        for shard in &stale {
            self.remove_shard(key, shard, &mut listing)?;
        }
        Ok(stale.len())
    }

    /// Copy every shard of `key` into `target`, returning the number copied
    pub fn copy_entity(&self, key: &str, target: &ShardStore) -> DbResult<usize> {
        let listing = self.list_shards(key)?;
        self.copy_listed(key, &listing, target)
    }

    pub fn copy_listed(&self, key: &str, listing: &ShardListing, target: &ShardStore) -> DbResult<usize> {
        let mut copied = 0;
        for shard in listing {
            let Some(bytes) = io::read_optional(self.shard_path(key, shard))? else {
                continue;
            };
            io::write_atomic(&target.dir, &Self::file_name(key, shard), &bytes)?;
            copied += 1;
        }
        Ok(copied)
    }
}
