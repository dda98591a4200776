use std::sync::Arc;

use tracing::info;

use crate::cache::ProteinCache;
use crate::config::StoreConfig;
use crate::errors::DbResult;
use crate::interactor::InteractorStore;
use crate::iterators::BulkLoader;
use crate::metrics::{MetricsCollector, StoreMetrics};
use crate::ppi::Ppi;
use crate::protein::Protein;
use crate::repository::{BackupReport, Repository};
use crate::types::Kind;

/// Every repository of one store root, sharing metrics, a Protein cache and
/// a loader pool
pub struct Database {
    config: StoreConfig,
    metrics: Arc<MetricsCollector>,
    pub proteins: Repository<Protein>,
    pub ppis: Repository<Ppi>,
    pub interactors: InteractorStore,
    cache: Arc<ProteinCache>,
    loader: BulkLoader,
}

impl Database {
    pub fn open(config: StoreConfig) -> DbResult<Self> {
        config.validate()?;
        let metrics = Arc::new(MetricsCollector::new());
        let proteins = Repository::open(&config, Arc::clone(&metrics))?;
        let ppis = Repository::open(&config, Arc::clone(&metrics))?;
        let interactors = InteractorStore::open(&config, Arc::clone(&metrics))?;
        let cache = Arc::new(ProteinCache::new(proteins.clone()));
        let loader = BulkLoader::new(&config.loader, Arc::clone(&metrics))?;
        info!(root = %config.root.display(), workers = loader.workers(), "opened store");
        Ok(Self { config, metrics, proteins, ppis, interactors, cache, loader })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ProteinCache> {
        &self.cache
    }

    pub fn loader(&self) -> &BulkLoader {
        &self.loader
    }

    pub fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }

    /// Snapshot every kind into the backup namespace
    pub fn backup(&self) -> DbResult<Vec<(Kind, BackupReport)>> {
        Ok(vec![
            (Kind::Protein, self.proteins.backup_all()?),
            (Kind::Ppi, self.ppis.backup_all()?),
            (Kind::Interactor, self.interactors.backup_all()?),
        ])
    }

    /// Number of stored entities of each kind
    pub fn counts(&self) -> DbResult<Vec<(Kind, usize)>> {
        Ok(vec![
            (Kind::Protein, self.proteins.enumerate()?.len()),
            (Kind::Ppi, self.ppis.enumerate()?.len()),
            (Kind::Interactor, self.interactors.enumerate()?.len()),
        ])
    }
}
