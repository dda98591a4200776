//! Construct-or-load, sparse persistence and backups for one entity kind.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::entity::{AttrPath, Attribute, Entity};
use crate::errors::{DbError, DbResult};
use crate::metrics::MetricsCollector;
use crate::ppi::{Ppi, PpiAttr};
use crate::protein::{Protein, ProteinAttr};
use crate::store::{ShardListing, ShardStore};
use crate::types::{PpiKey, ProteinKey};
use crate::value::Node;

/// Outcome of a full snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupReport {
    pub entities: usize,
    pub shards: usize,
}

pub struct Repository<E: Entity> {
    store: ShardStore,
    backup_root: PathBuf,
    opaque: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            backup_root: self.backup_root.clone(),
            opaque: self.opaque.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn open(config: &StoreConfig, metrics: Arc<MetricsCollector>) -> DbResult<Self> {
        let store = ShardStore::open(&config.root, E::KIND, &config.opaque, metrics)?;
        Ok(Self {
            store,
            backup_root: config.effective_backup_root(),
            opaque: config.opaque.clone(),
            _entity: PhantomData,
        })
    }

    pub fn store(&self) -> &ShardStore {
        &self.store
    }

    /// Whether the entity's canonical shard exists
    pub fn exists(&self, key: &E::Key) -> bool {
        self.store.contains(&key.to_string(), E::Attr::CANONICAL.name())
    }

    /// Every stored key, sorted
    pub fn enumerate(&self) -> DbResult<Vec<E::Key>> {
        self.store
            .enumerate(E::Attr::CANONICAL.name())?
            .iter()
            .map(|stem| stem.parse())
            .collect()
    }

    /// Load core attributes plus `extra`. `None` when the entity has no
    /// shards at all.
    pub fn load(&self, key: &E::Key, extra: &[AttrPath<E::Attr>]) -> DbResult<Option<E>> {
        let stem = key.to_string();
        let listing = self.store.list_shards(&stem)?;
        if listing.is_empty() {
            return Ok(None);
        }
        let mut entity = E::empty(key.clone());
        self.read_into(&self.store, &mut entity, &stem, &with_core(extra), &listing)?;
        entity.verify()?;
        Ok(Some(entity))
    }

    /// Mandatory lookup
    pub fn get(&self, key: &E::Key, extra: &[AttrPath<E::Attr>]) -> DbResult<E> {
        self.load(key, extra)?
            .ok_or_else(|| DbError::NotFound { kind: E::KIND, key: key.to_string() })
    }

    /// Load the entity, or start an all-absent one
    pub fn get_or_new(&self, key: &E::Key, extra: &[AttrPath<E::Attr>]) -> DbResult<E> {
        Ok(self.load(key, extra)?.unwrap_or_else(|| E::empty(key.clone())))
    }

    /// Load more attributes into an entity already in memory. A requested
    /// attribute replaces the in-memory value; absent ones are left as they are.
    pub fn hydrate(&self, entity: &mut E, paths: &[AttrPath<E::Attr>]) -> DbResult<()> {
        let stem = entity.key().to_string();
        let listing = self.store.list_shards(&stem)?;
        self.read_into(&self.store, entity, &stem, paths, &listing)
    }

    fn read_into(
        &self,
        store: &ShardStore,
        entity: &mut E,
        stem: &str,
        paths: &[AttrPath<E::Attr>],
        listing: &ShardListing,
    ) -> DbResult<()> {
        let mut grouped: BTreeMap<E::Attr, Node> = BTreeMap::new();
        for path in paths {
            let Some(node) = store.read_from(stem, &path.dotted(), listing)? else {
                continue;
            };
            let node = node.nest(&path.sub);
            let merged = match grouped.remove(&path.attr) {
                Some(existing) => existing.merge(node),
                None => node,
            };
            grouped.insert(path.attr, merged);
        }

        for (attr, node) in grouped {
            entity.set(attr, node).map_err(|message| DbError::Decode {
                key: stem.to_string(),
                shard: attr.name().to_string(),
                message,
            })?;
        }
        Ok(())
    }

    /// Write every attribute that is set. Unset attributes keep whatever
    /// the store already holds.
    pub fn persist(&self, entity: &E) -> DbResult<()> {
        entity.verify()?;
        let stem = entity.key().to_string();
        let shards: Vec<(String, Node)> = entity
            .shards()
            .into_iter()
            .map(|(attr, node)| (attr.name().to_string(), node))
            .collect();
        self.store.write_all(&stem, &shards)?;
        debug!(kind = %E::KIND, key = %stem, attributes = shards.len(), "persisted entity");
        Ok(())
    }

    fn backup_store(&self) -> DbResult<ShardStore> {
        ShardStore::open(&self.backup_root, E::KIND, &self.opaque, Arc::clone(self.store.metrics()))
    }

    /// Copy every shard of every stored entity into the backup namespace
    pub fn backup_all(&self) -> DbResult<BackupReport> {
        let backup = self.backup_store()?;
        let catalog = self.store.catalog()?;
        let mut report = BackupReport::default();
        for stem in self.store.enumerate(E::Attr::CANONICAL.name())? {
            if let Some(listing) = catalog.get(&stem) {
                report.shards += self.store.copy_listed(&stem, listing, &backup)?;
                report.entities += 1;
            }
        }
        info!(
            kind = %E::KIND,
            entities = report.entities,
            shards = report.shards,
            target = %backup.dir().display(),
            "backup complete"
        );
        Ok(report)
    }

    /// Snapshot of `key` with every attribute, and the shards it came from
    fn read_snapshot(&self, backup: &ShardStore, key: &E::Key) -> DbResult<(E, ShardListing)> {
        let stem = key.to_string();
        let listing = backup.list_shards(&stem)?;
        if listing.is_empty() {
            return Err(DbError::NotFound { kind: E::KIND, key: stem });
        }
        let mut restored = E::empty(key.clone());
        let every: Vec<AttrPath<E::Attr>> =
            E::Attr::ALL.iter().copied().map(AttrPath::whole).collect();
        self.read_into(backup, &mut restored, &stem, &every, &listing)?;
        restored.verify()?;
        Ok((restored, listing))
    }

    /// Replace the in-memory state of `entity` with its snapshot
    pub fn restore(&self, entity: &mut E) -> DbResult<()> {
        let backup = self.backup_store()?;
        let (restored, _) = self.read_snapshot(&backup, entity.key())?;
        *entity = restored;
        info!(kind = %E::KIND, key = %entity.key(), "restored entity from backup");
        Ok(())
    }

    /// Put the stored entity back to its snapshot. Shards written after the
    /// backup are removed, so attributes and map keys added since then do not
    /// survive. Returns the restored entity with every attribute loaded.
    pub fn restore_stored(&self, key: &E::Key) -> DbResult<E> {
        let backup = self.backup_store()?;
        let (restored, snapshot) = self.read_snapshot(&backup, key)?;
        let stem = key.to_string();
        let copied = backup.copy_listed(&stem, &snapshot, &self.store)?;
        let removed = self.store.remove_except(&stem, &snapshot)?;
        info!(kind = %E::KIND, key = %stem, copied, removed, "restored stored entity from backup");
        Ok(restored)
    }
}

fn with_core<A: Attribute>(extra: &[AttrPath<A>]) -> Vec<AttrPath<A>> {
    let mut paths: Vec<AttrPath<A>> = A::CORE.iter().copied().map(AttrPath::whole).collect();
    paths.extend(extra.iter().filter(|path| !(path.sub.is_empty() && path.attr.is_core())).cloned());
    paths
}

impl Repository<Protein> {
    /// Mandatory lookup by key or by sequence
    pub fn lookup(&self, stem_or_seq: &str, extra: &[AttrPath<ProteinAttr>]) -> DbResult<Protein> {
        self.get(&ProteinKey::from_stem_or_sequence(stem_or_seq)?, extra)
    }

    /// Load the protein with this sequence, or start a new one
    pub fn get_or_create(&self, seq: &str) -> DbResult<Protein> {
        let fresh = Protein::new(seq)?;
        match self.load(fresh.key(), &[])? {
            Some(stored) => Ok(stored),
            None => Ok(fresh),
        }
    }
}

impl Repository<Ppi> {
    /// Find the pair in either orientation, preferring `a=b`
    pub fn find_pair(
        &self,
        a: &ProteinKey,
        b: &ProteinKey,
        extra: &[AttrPath<PpiAttr>],
    ) -> DbResult<Ppi> {
        let forward = PpiKey::new(a.clone(), b.clone());
        if let Some(ppi) = self.load(&forward, extra)? {
            return Ok(ppi);
        }
        if let Some(ppi) = self.load(&forward.reversed(), extra)? {
            return Ok(ppi);
        }
        Err(DbError::NotFound { kind: Ppi::KIND, key: forward.to_string() })
    }
}
