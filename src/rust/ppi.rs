use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::consensus::{consensus, Verdict};
use crate::entity::{Attribute, Entity};
use crate::errors::{DbError, DbResult, DbResultExt};
use crate::maps::Matrix;
use crate::protein::Protein;
use crate::types::{Kind, PpiKey, ProteinKey};
use crate::value::{Evidence, Leaf, Node, NodeCodec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PpiAttr {
    P1,
    P2,
    Origin,
    Interaction,
    Partition,
    Structure,
    DistanceMap,
    ContactMap,
    AttentionMap,
    InterfaceFeatures,
}

impl Attribute for PpiAttr {
    const ALL: &'static [Self] = &[
        PpiAttr::P1,
        PpiAttr::P2,
        PpiAttr::Origin,
        PpiAttr::Interaction,
        PpiAttr::Partition,
        PpiAttr::Structure,
        PpiAttr::DistanceMap,
        PpiAttr::ContactMap,
        PpiAttr::AttentionMap,
        PpiAttr::InterfaceFeatures,
    ];
    const CORE: &'static [Self] = &[
        PpiAttr::P1,
        PpiAttr::P2,
        PpiAttr::Origin,
        PpiAttr::Interaction,
        PpiAttr::Partition,
    ];
    const CANONICAL: Self = PpiAttr::P1;

    fn name(&self) -> &'static str {
        match self {
            PpiAttr::P1 => "p1",
            PpiAttr::P2 => "p2",
            PpiAttr::Origin => "origin",
            PpiAttr::Interaction => "interaction",
            PpiAttr::Partition => "partition",
            PpiAttr::Structure => "structure",
            PpiAttr::DistanceMap => "distance_map",
            PpiAttr::ContactMap => "contact_map",
            PpiAttr::AttentionMap => "attention_map",
            PpiAttr::InterfaceFeatures => "interface_features",
        }
    }

    fn is_mapping(&self) -> bool {
        matches!(
            self,
            PpiAttr::DistanceMap
                | PpiAttr::ContactMap
                | PpiAttr::AttentionMap
                | PpiAttr::InterfaceFeatures
        )
    }
}

/// Membership of a pair in a graph partition: both proteins in block `n`,
/// or the proteins in different blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PpiBlock {
    Intra(i64),
    Inter,
}

impl PpiBlock {
    pub fn classify(p1_partition: i64, p2_partition: i64) -> Self {
        if p1_partition == p2_partition {
            PpiBlock::Intra(p1_partition)
        } else {
            PpiBlock::Inter
        }
    }
}

impl fmt::Display for PpiBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PpiBlock::Intra(n) => write!(f, "INTRA{}", n),
            PpiBlock::Inter => write!(f, "INTER"),
        }
    }
}

impl FromStr for PpiBlock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        if s == "INTER" {
            return Ok(PpiBlock::Inter);
        }
        s.strip_prefix("INTRA")
            .and_then(|n| n.parse().ok())
            .map(PpiBlock::Intra)
            .ok_or_else(|| format!("{:?} is not INTRA<n> or INTER", s))
    }
}

// Stored as its label so other tools can read the shard as text
impl NodeCodec for PpiBlock {
    fn to_node(&self) -> Node {
        Node::Leaf(Leaf::Text(self.to_string()))
    }

    fn from_node(node: Node) -> Result<Self, String> {
        String::from_node(node)?.parse()
    }
}

/// A pairwise interaction between two proteins, referenced by key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ppi {
    key: PpiKey,
    /// Evidence source of each entry of `interaction`
    pub origin: Option<Vec<String>>,
    /// Raw values reported by each origin
    pub interaction: Option<Vec<Vec<Evidence>>>,
    pub partition: Option<PpiBlock>,
    /// Predicted complex structure, raw PDB text
    pub structure: Option<String>,
    pub distance_map: Option<BTreeMap<String, Matrix>>,
    pub contact_map: Option<BTreeMap<String, Matrix>>,
    pub attention_map: Option<BTreeMap<String, Matrix>>,
    pub interface_features: Option<BTreeMap<String, f64>>,
}

impl Ppi {
    /// New interaction between two proteins in the given orientation
    pub fn new(p1: &Protein, p2: &Protein) -> Self {
        Self::empty(PpiKey::new(p1.key().clone(), p2.key().clone()))
    }

    /// Key of the pair of sequences `a` and `b`, with the lexicographically
    /// smaller sequence first
    pub fn canonical(a: &str, b: &str) -> PpiKey {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        PpiKey::new(ProteinKey::from_sequence(first), ProteinKey::from_sequence(second))
    }

    pub fn p1(&self) -> &ProteinKey {
        self.key.p1()
    }

    pub fn p2(&self) -> &ProteinKey {
        self.key.p2()
    }

    /// Record the values one origin reported, keeping `origin` and
    /// `interaction` the same length
    pub fn add_evidence<S: Into<String>>(&mut self, origin: S, values: Vec<Evidence>) {
        self.origin.get_or_insert_with(Vec::new).push(origin.into());
        self.interaction.get_or_insert_with(Vec::new).push(values);
    }

    /// Consensus verdict over the recorded evidence. No evidence at all is
    /// undetermined.
    pub fn interact(&self) -> DbResult<Verdict> {
        let origin = self.origin.as_deref().unwrap_or(&[]);
        let interaction = self.interaction.as_deref().unwrap_or(&[]);
        consensus(origin, interaction).for_key(&self.key.to_string())
    }

    /// Partition block from the partitions of both proteins
    pub fn assign_partition(&mut self, p1: &Protein, p2: &Protein) -> Option<PpiBlock> {
        let block = PpiBlock::classify(p1.partition?, p2.partition?);
        self.partition = Some(block);
        Some(block)
    }

    fn check_member(&self, attr: PpiAttr, node: Node) -> Result<(), String> {
        let stored = String::from_node(node)?;
        let expected = if attr == PpiAttr::P1 { self.key.p1() } else { self.key.p2() };
        if stored != expected.as_str() {
            return Err(format!("names {} but the key says {}", stored, expected));
        }
        Ok(())
    }
}

impl Entity for Ppi {
    type Key = PpiKey;
    type Attr = PpiAttr;

    const KIND: Kind = Kind::Ppi;

    fn key(&self) -> &PpiKey {
        &self.key
    }

    fn empty(key: PpiKey) -> Self {
        Self {
            key,
            origin: None,
            interaction: None,
            partition: None,
            structure: None,
            distance_map: None,
            contact_map: None,
            attention_map: None,
            interface_features: None,
        }
    }

    fn set(&mut self, attr: PpiAttr, node: Node) -> Result<(), String> {
        match attr {
            PpiAttr::P1 | PpiAttr::P2 => self.check_member(attr, node)?,
            PpiAttr::Origin => self.origin = Some(NodeCodec::from_node(node)?),
            PpiAttr::Interaction => self.interaction = Some(NodeCodec::from_node(node)?),
            PpiAttr::Partition => self.partition = Some(NodeCodec::from_node(node)?),
            PpiAttr::Structure => self.structure = Some(NodeCodec::from_node(node)?),
            PpiAttr::DistanceMap => self.distance_map = Some(NodeCodec::from_node(node)?),
            PpiAttr::ContactMap => self.contact_map = Some(NodeCodec::from_node(node)?),
            PpiAttr::AttentionMap => self.attention_map = Some(NodeCodec::from_node(node)?),
            PpiAttr::InterfaceFeatures => {
                self.interface_features = Some(NodeCodec::from_node(node)?)
            }
        }
        Ok(())
    }

    fn shards(&self) -> Vec<(PpiAttr, Node)> {
        let mut shards = vec![
            (PpiAttr::P1, self.key.p1().to_string().to_node()),
            (PpiAttr::P2, self.key.p2().to_string().to_node()),
        ];
        let mut push = |attr, node: Option<Node>| {
            if let Some(node) = node {
                shards.push((attr, node));
            }
        };
        push(PpiAttr::Origin, self.origin.as_ref().map(NodeCodec::to_node));
        push(PpiAttr::Interaction, self.interaction.as_ref().map(NodeCodec::to_node));
        push(PpiAttr::Partition, self.partition.as_ref().map(NodeCodec::to_node));
        push(PpiAttr::Structure, self.structure.as_ref().map(NodeCodec::to_node));
        push(PpiAttr::DistanceMap, self.distance_map.as_ref().map(NodeCodec::to_node));
        push(PpiAttr::ContactMap, self.contact_map.as_ref().map(NodeCodec::to_node));
        push(PpiAttr::AttentionMap, self.attention_map.as_ref().map(NodeCodec::to_node));
        push(
            PpiAttr::InterfaceFeatures,
            self.interface_features.as_ref().map(NodeCodec::to_node),
        );
        shards
    }

    fn verify(&self) -> DbResult<()> {
        // Evidence is written as a pair; one side without the other counts as empty
        let origins = self.origin.as_ref().map_or(0, Vec::len);
        let lists = self.interaction.as_ref().map_or(0, Vec::len);
        if origins != lists || self.origin.is_some() != self.interaction.is_some() {
            return Err(DbError::Consistency {
                key: self.key.to_string(),
                message: format!("{} origins but {} interaction lists", origins, lists),
            });
        }
        Ok(())
    }
}
