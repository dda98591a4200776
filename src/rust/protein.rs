use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::{Attribute, Entity};
use crate::errors::{DbError, DbResult};
use crate::sequence::AminoAcidAlphabet;
use crate::types::{Interval, Kind, ProteinKey};
use crate::value::{Node, NodeCodec};

/// InterPro accession of the MADS-box domain
pub const MADS_DOMAIN: &str = "IPR002100";
/// InterPro accession of the K-box domain
pub const K_BOX_DOMAIN: &str = "IPR002487";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProteinAttr {
    Seq,
    BioId,
    UniprotId,
    TaxonId,
    Species,
    Partition,
    Domains,
    Embeddings,
}

impl Attribute for ProteinAttr {
    const ALL: &'static [Self] = &[
        ProteinAttr::Seq,
        ProteinAttr::BioId,
        ProteinAttr::UniprotId,
        ProteinAttr::TaxonId,
        ProteinAttr::Species,
        ProteinAttr::Partition,
        ProteinAttr::Domains,
        ProteinAttr::Embeddings,
    ];
    const CORE: &'static [Self] = &[
        ProteinAttr::Seq,
        ProteinAttr::BioId,
        ProteinAttr::UniprotId,
        ProteinAttr::TaxonId,
        ProteinAttr::Species,
        ProteinAttr::Partition,
    ];
    const CANONICAL: Self = ProteinAttr::Seq;

    fn name(&self) -> &'static str {
        match self {
            ProteinAttr::Seq => "seq",
            ProteinAttr::BioId => "bio_id",
            ProteinAttr::UniprotId => "uniprot_id",
            ProteinAttr::TaxonId => "taxon_id",
            ProteinAttr::Species => "species",
            ProteinAttr::Partition => "partition",
            ProteinAttr::Domains => "domains",
            ProteinAttr::Embeddings => "embeddings",
        }
    }

    fn is_mapping(&self) -> bool {
        matches!(self, ProteinAttr::Domains | ProteinAttr::Embeddings)
    }
}

/// A protein, identified by the md5 of its sequence. Every attribute is
/// optional: a placeholder created from a bare key has none of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protein {
    key: ProteinKey,
    pub seq: Option<String>,
    /// Biological name, e.g. `SEP3`
    pub bio_id: Option<String>,
    pub uniprot_id: Option<String>,
    /// NCBI taxon id
    pub taxon_id: Option<i64>,
    pub species: Option<String>,
    /// Graph partition block
    pub partition: Option<i64>,
    /// Domain accession to residue intervals
    pub domains: Option<BTreeMap<String, Vec<Interval>>>,
    /// Model name to embedding vector
    pub embeddings: Option<BTreeMap<String, Vec<f64>>>,
}

/// The four regions of a MIKC-type protein
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mikc<'a> {
    pub m: &'a str,
    pub i: &'a str,
    pub k: &'a str,
    pub c: &'a str,
}

impl Protein {
    /// New protein from a sequence; the key is derived from it
    pub fn new(seq: &str) -> DbResult<Self> {
        AminoAcidAlphabet::new().validate_sequence(seq)?;
        let mut protein = Self::empty(ProteinKey::from_sequence(seq));
        protein.seq = Some(seq.to_string());
        Ok(protein)
    }

    pub fn len(&self) -> Option<usize> {
        self.seq.as_ref().map(|s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.seq.as_ref().map_or(true, |s| s.is_empty())
    }

    /// Split into M, I, K and C regions using the single MADS-box and K-box
    /// annotations. `None` when the sequence or either domain is missing or
    /// the domains are repeated, overlapping or out of range.
    pub fn mikc(&self) -> Option<Mikc<'_>> {
        let seq = self.seq.as_deref()?;
        let domains = self.domains.as_ref()?;
        let single = |accession: &str| match domains.get(accession).map(Vec::as_slice) {
            Some([interval]) => Some(*interval),
            _ => None,
        };
        let mads = single(MADS_DOMAIN)?;
        let k_box = single(K_BOX_DOMAIN)?;
        if mads.end() > k_box.start() || k_box.end() > seq.len() {
            return None;
        }
        Some(Mikc {
            m: seq.get(..mads.end())?,
            i: seq.get(mads.end()..k_box.start())?,
            k: seq.get(k_box.start()..k_box.end())?,
            c: seq.get(k_box.end()..)?,
        })
    }
}

impl Entity for Protein {
    type Key = ProteinKey;
    type Attr = ProteinAttr;

    const KIND: Kind = Kind::Protein;

    fn key(&self) -> &ProteinKey {
        &self.key
    }

    fn empty(key: ProteinKey) -> Self {
        Self {
            key,
            seq: None,
            bio_id: None,
            uniprot_id: None,
            taxon_id: None,
            species: None,
            partition: None,
            domains: None,
            embeddings: None,
        }
    }

    fn set(&mut self, attr: ProteinAttr, node: Node) -> Result<(), String> {
        match attr {
            ProteinAttr::Seq => self.seq = Some(NodeCodec::from_node(node)?),
            ProteinAttr::BioId => self.bio_id = Some(NodeCodec::from_node(node)?),
            ProteinAttr::UniprotId => self.uniprot_id = Some(NodeCodec::from_node(node)?),
            ProteinAttr::TaxonId => self.taxon_id = Some(NodeCodec::from_node(node)?),
            ProteinAttr::Species => self.species = Some(NodeCodec::from_node(node)?),
            ProteinAttr::Partition => self.partition = Some(NodeCodec::from_node(node)?),
            ProteinAttr::Domains => self.domains = Some(NodeCodec::from_node(node)?),
            ProteinAttr::Embeddings => self.embeddings = Some(NodeCodec::from_node(node)?),
        }
        Ok(())
    }

    fn shards(&self) -> Vec<(ProteinAttr, Node)> {
        let mut shards = Vec::new();
        let mut push = |attr, node: Option<Node>| {
            if let Some(node) = node {
                shards.push((attr, node));
            }
        };
        push(ProteinAttr::Seq, self.seq.as_ref().map(NodeCodec::to_node));
        push(ProteinAttr::BioId, self.bio_id.as_ref().map(NodeCodec::to_node));
        push(ProteinAttr::UniprotId, self.uniprot_id.as_ref().map(NodeCodec::to_node));
        push(ProteinAttr::TaxonId, self.taxon_id.as_ref().map(NodeCodec::to_node));
        push(ProteinAttr::Species, self.species.as_ref().map(NodeCodec::to_node));
        push(ProteinAttr::Partition, self.partition.as_ref().map(NodeCodec::to_node));
        push(ProteinAttr::Domains, self.domains.as_ref().map(NodeCodec::to_node));
        push(ProteinAttr::Embeddings, self.embeddings.as_ref().map(NodeCodec::to_node));
        shards
    }

    /// A stored sequence must hash to the key it is stored under
    fn verify(&self) -> DbResult<()> {
        match &self.seq {
            Some(seq) if ProteinKey::from_sequence(seq) != self.key => Err(DbError::Consistency {
                key: self.key.to_string(),
                message: "sequence does not hash to the entity key".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_fixtures::{TEST_PROTEIN, TEST_PROTEIN_INVALID};

    #[test]
    fn test_new_protein_is_keyed_by_sequence() {
        let protein = Protein::new(TEST_PROTEIN).unwrap();
        assert_eq!(protein.key(), &ProteinKey::from_sequence(TEST_PROTEIN));
        assert_eq!(protein.len(), Some(TEST_PROTEIN.len()));
        assert!(protein.uniprot_id.is_none());
        assert!(Protein::new(TEST_PROTEIN_INVALID).is_err());
    }

    #[test]
    fn test_shards_are_sparse() {
        let mut protein = Protein::new(TEST_PROTEIN).unwrap();
        protein.taxon_id = Some(3702);
        let attrs: Vec<ProteinAttr> = protein.shards().into_iter().map(|(a, _)| a).collect();
        assert_eq!(attrs, vec![ProteinAttr::Seq, ProteinAttr::TaxonId]);
    }

    #[test]
    fn test_set_round_trips_shards() {
        let mut protein = Protein::new(TEST_PROTEIN).unwrap();
        let mut domains = BTreeMap::new();
        domains.insert(MADS_DOMAIN.to_string(), vec![Interval::new(0, 60).unwrap()]);
        protein.domains = Some(domains);
        protein.species = Some("Arabidopsis thaliana".into());

        let mut copy = Protein::empty(protein.key().clone());
        for (attr, node) in protein.shards() {
            copy.set(attr, node).unwrap();
        }
        assert_eq!(copy, protein);

        assert!(copy.set(ProteinAttr::TaxonId, "x".to_string().to_node()).is_err());
    }

    #[test]
    fn test_verify_detects_foreign_sequence() {
        let mut protein = Protein::new(TEST_PROTEIN).unwrap();
        assert!(protein.verify().is_ok());
        protein.seq = Some("MKV".into());
        assert!(matches!(protein.verify(), Err(DbError::Consistency { .. })));
    }

    #[test]
    fn test_mikc_regions() {
        let mut protein = Protein::new("MMMMIIKKKKCC").unwrap();
        assert!(protein.mikc().is_none());

        let mut domains = BTreeMap::new();
        domains.insert(MADS_DOMAIN.to_string(), vec![Interval::new(0, 4).unwrap()]);
        domains.insert(K_BOX_DOMAIN.to_string(), vec![Interval::new(6, 10).unwrap()]);
        protein.domains = Some(domains);
        let mikc = protein.mikc().unwrap();
        assert_eq!((mikc.m, mikc.i, mikc.k, mikc.c), ("MMMM", "II", "KKKK", "CC"));

        protein
            .domains
            .as_mut()
            .unwrap()
            .get_mut(K_BOX_DOMAIN)
            .unwrap()
            .push(Interval::new(10, 12).unwrap());
        assert!(protein.mikc().is_none());
    }
}
