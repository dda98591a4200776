use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::StoreConfig;
use crate::errors::{DbError, DbResult};
use crate::io;
use crate::metrics::MetricsCollector;
use crate::protein::Protein;
use crate::repository::BackupReport;
use crate::types::{Accession, Interval, Kind};

/// File extension of a stored interactor record
pub const RECORD_EXTENSION: &str = "int";

/// Staging record for a protein fetched by accession, before it is promoted
/// to a [`Protein`]. Stored whole, never sharded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interactor {
    pub accession: Accession,
    pub taxon_id: Option<i64>,
    /// UniProtKB section, `Swiss-Prot` or `TrEMBL`
    pub section: Option<String>,
    pub primary_accession: Option<String>,
    pub secondary_accessions: Vec<String>,
    pub seq: Option<String>,
    pub structure: Option<String>,
    pub domains: BTreeMap<String, Vec<Interval>>,
}

impl Interactor {
    pub fn new(accession: Accession) -> Self {
        Self {
            accession,
            taxon_id: None,
            section: None,
            primary_accession: None,
            secondary_accessions: Vec::new(),
            seq: None,
            structure: None,
            domains: BTreeMap::new(),
        }
    }

    /// Protein carrying this interactor's sequence, accession, taxon and
    /// domains. Fails when no sequence was staged.
    pub fn to_protein(&self) -> DbResult<Protein> {
        let seq = self.seq.as_deref().ok_or_else(|| {
            DbError::InvalidAttribute(format!("interactor {} has no sequence", self.accession))
        })?;
        let mut protein = Protein::new(seq)?;
        protein.uniprot_id = Some(self.accession.to_string());
        protein.taxon_id = self.taxon_id;
        if !self.domains.is_empty() {
            protein.domains = Some(self.domains.clone());
        }
        Ok(protein)
    }
}

/// Whole-record storage of interactors, one file per accession
#[derive(Debug, Clone)]
pub struct InteractorStore {
    dir: PathBuf,
    backup_dir: PathBuf,
    metrics: Arc<MetricsCollector>,
}

impl InteractorStore {
    pub fn open(config: &StoreConfig, metrics: Arc<MetricsCollector>) -> DbResult<Self> {
        let dir = config.root.join(Kind::Interactor.dir_name());
        std::fs::create_dir_all(&dir)?;
        let backup_dir = config.effective_backup_root().join(Kind::Interactor.dir_name());
        Ok(Self { dir, backup_dir, metrics })
    }

    fn file_name(accession: &Accession) -> String {
        format!("{}.{}", accession, RECORD_EXTENSION)
    }

    fn read_from(&self, dir: &Path, accession: &Accession) -> DbResult<Option<Interactor>> {
        let Some(bytes) = io::read_optional(dir.join(Self::file_name(accession)))? else {
            return Ok(None);
        };
        self.metrics.record_shard_read();
        io::decode(&bytes).map(Some).map_err(|message| DbError::Decode {
            key: accession.to_string(),
            shard: RECORD_EXTENSION.to_string(),
            message,
        })
    }

    pub fn exists(&self, accession: &Accession) -> bool {
        self.dir.join(Self::file_name(accession)).is_file()
    }

    pub fn load(&self, accession: &Accession) -> DbResult<Option<Interactor>> {
        self.read_from(&self.dir, accession)
    }

    /// Mandatory lookup
    pub fn get(&self, accession: &Accession) -> DbResult<Interactor> {
        self.load(accession)?.ok_or_else(|| DbError::NotFound {
            kind: Kind::Interactor,
            key: accession.to_string(),
        })
    }

    /// Stored record, or a new empty one
    pub fn open_or_new(&self, accession: &Accession) -> DbResult<Interactor> {
        Ok(self.load(accession)?.unwrap_or_else(|| Interactor::new(accession.clone())))
    }

    pub fn save(&self, interactor: &Interactor) -> DbResult<()> {
        let bytes = io::encode(interactor)?;
        io::write_atomic(&self.dir, &Self::file_name(&interactor.accession), &bytes)?;
        self.metrics.record_shard_write();
        Ok(())
    }

    /// Every stored accession, sorted
    pub fn enumerate(&self) -> DbResult<Vec<Accession>> {
        let suffix = format!(".{}", RECORD_EXTENSION);
        io::list_file_names(&self.dir)?
            .iter()
            .filter_map(|name| name.strip_suffix(&suffix))
            .map(str::parse)
            .collect()
    }

    /// Every stored interactor in accession order
    pub fn iter(&self) -> DbResult<impl Iterator<Item = DbResult<Interactor>> + '_> {
        Ok(self.enumerate()?.into_iter().map(move |accession| self.get(&accession)))
    }

    pub fn backup_all(&self) -> DbResult<BackupReport> {
        std::fs::create_dir_all(&self.backup_dir)?;
        let mut report = BackupReport::default();
        for accession in self.enumerate()? {
            let name = Self::file_name(&accession);
            if let Some(bytes) = io::read_optional(self.dir.join(&name))? {
                io::write_atomic(&self.backup_dir, &name, &bytes)?;
                report.entities += 1;
                report.shards += 1;
            }
        }
        info!(kind = %Kind::Interactor, entities = report.entities, "backup complete");
        Ok(report)
    }

    /// Replace `interactor` with its snapshot
    pub fn restore(&self, interactor: &mut Interactor) -> DbResult<()> {
        match self.read_from(&self.backup_dir, &interactor.accession)? {
            Some(snapshot) => {
                *interactor = snapshot;
                Ok(())
            }
            None => Err(DbError::NotFound {
                kind: Kind::Interactor,
                key: interactor.accession.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use tempfile::tempdir;

    fn accession(s: &str) -> Accession {
        Accession::new(s).unwrap()
    }

    #[test]
    fn test_open_or_new_then_save() -> DbResult<()> {
        let dir = tempdir()?;
        let store = InteractorStore::open(&StoreConfig::new(dir.path().join("db")), Arc::default())?;
        let mut interactor = store.open_or_new(&accession("Q6GWV3"))?;
        assert!(interactor.seq.is_none());
        assert!(matches!(store.get(&accession("Q6GWV3")), Err(DbError::NotFound { .. })));

        interactor.seq = Some("MGRGKIEIKRIEN".into());
        interactor.section = Some("Swiss-Prot".into());
        store.save(&interactor)?;

        assert!(dir.path().join("db").join("Interactors").join("Q6GWV3.int").is_file());
        assert_eq!(store.open_or_new(&accession("Q6GWV3"))?, interactor);
        Ok(())
    }

    #[test]
    fn test_iterate_in_accession_order() -> DbResult<()> {
        let dir = tempdir()?;
        let store = InteractorStore::open(&StoreConfig::new(dir.path()), Arc::default())?;
        for id in ["Q6GWV3", "A0A022PSB5", "P35631"] {
            store.save(&Interactor::new(accession(id)))?;
        }
        let ids: Vec<String> =
            store.iter()?.map(|i| i.map(|i| i.accession.to_string())).collect::<DbResult<_>>()?;
        assert_eq!(ids, vec!["A0A022PSB5", "P35631", "Q6GWV3"]);
        Ok(())
    }

    #[test]
    fn test_to_protein() {
        let mut interactor = Interactor::new(accession("Q6GWV3"));
        assert!(interactor.to_protein().is_err());

        interactor.seq = Some("MGRGKIEIKRIEN".into());
        interactor.taxon_id = Some(4081);
        interactor.domains.insert("IPR002100".into(), vec![Interval::new(0, 10).unwrap()]);
        let protein = interactor.to_protein().unwrap();
        assert_eq!(protein.key().as_str().len(), 32);
        assert_eq!(protein.uniprot_id.as_deref(), Some("Q6GWV3"));
        assert_eq!(protein.taxon_id, Some(4081));
        assert_eq!(protein.domains.unwrap().len(), 1);
    }

    #[test]
    fn test_backup_and_restore() -> DbResult<()> {
        let dir = tempdir()?;
        let store = InteractorStore::open(&StoreConfig::new(dir.path().join("db")), Arc::default())?;
        let mut interactor = Interactor::new(accession("P35631"));
        assert!(store.restore(&mut interactor).is_err());
        interactor.taxon_id = Some(3702);
        store.save(&interactor)?;
        assert_eq!(store.backup_all()?.entities, 1);

        let mut edited = interactor.clone();
        edited.taxon_id = None;
        store.restore(&mut edited)?;
        assert_eq!(edited, interactor);
        Ok(())
    }
}
