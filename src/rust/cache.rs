use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::entity::AttrPath;
use crate::errors::DbResult;
use crate::metrics::MetricsCollector;
use crate::protein::{Protein, ProteinAttr};
use crate::repository::Repository;
use crate::types::ProteinKey;

type Slot = Arc<OnceCell<Arc<Protein>>>;

/// Memoizing Protein lookup shared by concurrent loaders.
///
/// Each key gets one slot; the first caller initializes it while concurrent
/// callers for the same key block on that slot, so every distinct key is
/// loaded exactly once. A failed load leaves the slot empty and the next
/// caller retries.
///
/// Every protein is hydrated with the same extra attributes, fixed when the
/// cache is built.
pub struct ProteinCache {
    repository: Repository<Protein>,
    extra: Vec<AttrPath<ProteinAttr>>,
    slots: DashMap<ProteinKey, Slot>,
    metrics: Arc<MetricsCollector>,
}

impl ProteinCache {
    /// Cache of proteins with their core attributes only
    pub fn new(repository: Repository<Protein>) -> Self {
        Self::with_extra(repository, Vec::new())
    }

    pub fn with_extra(repository: Repository<Protein>, extra: Vec<AttrPath<ProteinAttr>>) -> Self {
        let metrics = Arc::clone(repository.store().metrics());
        Self { repository, extra, slots: DashMap::new(), metrics }
    }

    /// The protein with its core attributes plus the cache's extras, loaded
    /// on first use. A key with nothing stored is `NotFound`.
    pub fn get(&self, key: &ProteinKey) -> DbResult<Arc<Protein>> {
        // Clone the slot out so the map shard lock is not held during the load
        let slot: Slot = Arc::clone(self.slots.entry(key.clone()).or_default().value());
        if let Some(protein) = slot.get() {
            self.metrics.record_cache_hit();
            return Ok(Arc::clone(protein));
        }

        let mut loaded_here = false;
        let protein = slot.get_or_try_init(|| {
            loaded_here = true;
            self.metrics.record_protein_load();
            self.repository.get(key, &self.extra).map(Arc::new)
        })?;
        if loaded_here {
            self.metrics.record_cache_miss();
        } else {
            self.metrics.record_cache_hit();
        }
        Ok(Arc::clone(protein))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::entity::Entity;
    use crate::errors::DbError;
    use rayon::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_one_load_per_key_under_contention() -> DbResult<()> {
        let dir = tempdir()?;
        let metrics = Arc::new(MetricsCollector::new());
        let repo = Repository::open(&StoreConfig::new(dir.path()), Arc::clone(&metrics))?;
        let sequences = ["MGRGK", "MAREK", "MKVLA"];
        for seq in sequences {
            let mut protein = Protein::new(seq)?;
            protein.species = Some("Arabidopsis thaliana".into());
            repo.persist(&protein)?;
        }

        let cache = ProteinCache::new(repo);
        let keys: Vec<ProteinKey> =
            (0..300).map(|i| ProteinKey::from_sequence(sequences[i % 3])).collect();
        let loaded: Vec<Arc<Protein>> =
            keys.par_iter().map(|key| cache.get(key)).collect::<DbResult<_>>()?;

        assert_eq!(loaded.len(), 300);
        assert!(loaded.iter().all(|p| p.species.is_some()));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.protein_loads, 3);
        assert_eq!(snapshot.cache_misses, 3);
        assert_eq!(snapshot.cache_hits, 297);
        assert_eq!(cache.len(), 3);
        Ok(())
    }

    #[test]
    fn test_unknown_key_is_not_found_until_stored() -> DbResult<()> {
        let dir = tempdir()?;
        let repo: Repository<Protein> = Repository::open(&StoreConfig::new(dir.path()), Arc::default())?;
        let cache = ProteinCache::new(repo.clone());
        let key = ProteinKey::from_sequence("MKV");
        assert!(matches!(cache.get(&key), Err(DbError::NotFound { .. })));
        assert!(cache.is_empty());

        // the failed load left the slot empty, so a later lookup retries
        repo.persist(&Protein::new("MKV")?)?;
        let protein = cache.get(&key)?;
        assert_eq!(protein.seq.as_deref(), Some("MKV"));
        assert!(Arc::ptr_eq(&protein, &cache.get(&key)?));
        cache.clear();
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn test_extra_attributes_are_hydrated() -> DbResult<()> {
        let dir = tempdir()?;
        let repo: Repository<Protein> = Repository::open(&StoreConfig::new(dir.path()), Arc::default())?;
        let mut protein = Protein::new("MGRGK")?;
        let mut embeddings = std::collections::BTreeMap::new();
        embeddings.insert("esm2".to_string(), vec![0.5, 0.25]);
        embeddings.insert("prott5".to_string(), vec![1.0]);
        protein.embeddings = Some(embeddings);
        repo.persist(&protein)?;

        let core = ProteinCache::new(repo.clone());
        assert!(core.get(protein.key())?.embeddings.is_none());

        let esm2 = ProteinCache::with_extra(repo, vec!["embeddings.esm2".parse()?]);
        let loaded = esm2.get(protein.key())?;
        let embeddings = loaded.embeddings.as_ref().unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings["esm2"], vec![0.5, 0.25]);
        Ok(())
    }
}
