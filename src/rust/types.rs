use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::errors::{DbError, DbResult};

/// Separator between the two protein keys of a pair key
pub const PAIR_SEPARATOR: char = '=';

/// The kinds of entity kept in a store, one directory each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Protein,
    Ppi,
    Interactor,
}

impl Kind {
    /// Directory name of this kind under the store root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Kind::Protein => "Protein",
            Kind::Ppi => "PPI",
            Kind::Interactor => "Interactors",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Protein => write!(f, "Protein"),
            Kind::Ppi => write!(f, "PPI"),
            Kind::Interactor => write!(f, "Interactor"),
        }
    }
}

impl FromStr for Kind {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "protein" => Ok(Kind::Protein),
            "ppi" => Ok(Kind::Ppi),
            "interactor" | "interactors" => Ok(Kind::Interactor),
            _ => Err(DbError::InvalidKey(format!(
                "Unknown entity kind: {}. Must be one of: protein, ppi, interactor",
                s
            ))),
        }
    }
}

/// Identity of an entity on disk. Keys never contain '.', which separates
/// the key from the attribute path in shard file names.
pub trait EntityKey:
    Clone + Eq + Ord + Hash + fmt::Display + FromStr<Err = DbError> + Send + Sync + 'static
{
}

fn check_file_stem(key: &str) -> DbResult<()> {
    if key.is_empty() {
        return Err(DbError::InvalidKey("empty key".to_string()));
    }
    if key.contains('.') || key.contains('/') || key.contains('\\') {
        return Err(DbError::InvalidKey(format!("{} contains a path separator or '.'", key)));
    }
    Ok(())
}

/// md5 fingerprint of a protein sequence, 32 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProteinKey(String);

impl ProteinKey {
    /// Hash a sequence into its key
    pub fn from_sequence(seq: &str) -> Self {
        let digest = Md5::digest(seq.as_bytes());
        ProteinKey(format!("{:x}", digest))
    }

    /// Resolve a lookup string the way collaborators pass them around: a
    /// string containing a digit is an existing key, anything else is a
    /// sequence to hash.
    pub fn from_stem_or_sequence(input: &str) -> DbResult<Self> {
        if input.chars().any(|c| c.is_ascii_digit()) {
            input.parse()
        } else {
            Ok(Self::from_sequence(input))
        }
    }

    /// Get the raw value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ProteinKey {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        let valid = s.len() == 32 && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if valid {
            Ok(ProteinKey(s.to_string()))
        } else {
            Err(DbError::InvalidKey(format!("{} is not a 32-character lowercase hex digest", s)))
        }
    }
}

impl fmt::Display for ProteinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl EntityKey for ProteinKey {}

/// Identity of a pairwise interaction, `<p1>=<p2>` in construction order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PpiKey {
    p1: ProteinKey,
    p2: ProteinKey,
}

impl PpiKey {
    pub fn new(p1: ProteinKey, p2: ProteinKey) -> Self {
        Self { p1, p2 }
    }

    pub fn p1(&self) -> &ProteinKey {
        &self.p1
    }

    pub fn p2(&self) -> &ProteinKey {
        &self.p2
    }

    /// The same pair in the opposite orientation
    pub fn reversed(&self) -> Self {
        Self { p1: self.p2.clone(), p2: self.p1.clone() }
    }
}

impl FromStr for PpiKey {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s.split_once(PAIR_SEPARATOR) {
            Some((p1, p2)) => Ok(Self { p1: p1.parse()?, p2: p2.parse()? }),
            None => Err(DbError::InvalidKey(format!("{} is not a <hash>=<hash> pair", s))),
        }
    }
}

impl fmt::Display for PpiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.p1, PAIR_SEPARATOR, self.p2)
    }
}

// Field order (p1, p2) makes the derived ordering match the string ordering
// of `<p1>=<p2>`, because every ProteinKey has the same length.
impl EntityKey for PpiKey {}

/// Externally assigned accession, e.g. a UniProt id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Accession(String);

impl Accession {
    pub fn new(accession: &str) -> DbResult<Self> {
        accession.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Accession {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        check_file_stem(s)?;
        Ok(Accession(s.to_string()))
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl EntityKey for Accession {}

/// Half-open residue interval `[start, end)`, with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct Interval {
    start: usize,
    end: usize,
}

#[derive(Deserialize)]
struct RawInterval {
    start: usize,
    end: usize,
}

impl TryFrom<RawInterval> for Interval {
    type Error = DbError;

    fn try_from(raw: RawInterval) -> DbResult<Self> {
        Interval::new(raw.start, raw.end)
    }
}

impl Interval {
    pub fn new(start: usize, end: usize) -> DbResult<Self> {
        if start > end {
            return Err(DbError::InvalidAttribute(format!(
                "interval start {} is after its end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protein_key_is_md5_hex() {
        // md5("") is a well-known constant
        assert_eq!(ProteinKey::from_sequence("").as_str(), "d41d8cd98f00b204e9800998ecf8427e");
        let key = ProteinKey::from_sequence("MGRGKIEIKRIENSTNRQVTF");
        assert_eq!(key.as_str().len(), 32);
        assert_eq!(key, ProteinKey::from_sequence("MGRGKIEIKRIENSTNRQVTF"));
    }

    #[test]
    fn test_protein_key_validation() {
        assert!("d41d8cd98f00b204e9800998ecf8427e".parse::<ProteinKey>().is_ok());
        assert!("D41D8CD98F00B204E9800998ECF8427E".parse::<ProteinKey>().is_err());
        assert!("d41d8cd98f00".parse::<ProteinKey>().is_err());
        assert!("MKLLILTCLVAVALARPKHPIKHQGLPQEVLN".parse::<ProteinKey>().is_err());
    }

    #[test]
    fn test_stem_or_sequence() {
        let seq = "MKLLILTCLVAVALARP";
        let hashed = ProteinKey::from_stem_or_sequence(seq).unwrap();
        assert_eq!(hashed, ProteinKey::from_sequence(seq));
        let stem = ProteinKey::from_stem_or_sequence(hashed.as_str()).unwrap();
        assert_eq!(stem, hashed);
    }

    #[test]
    fn test_ppi_key_round_trip_and_order() {
        let a = ProteinKey::from_sequence("AAAA");
        let b = ProteinKey::from_sequence("CCCC");
        let ab = PpiKey::new(a.clone(), b.clone());
        let parsed: PpiKey = ab.to_string().parse().unwrap();
        assert_eq!(parsed, ab);
        assert_ne!(ab, ab.reversed());
        assert_eq!(ab.reversed().p1(), &b);
        assert!("nope".parse::<PpiKey>().is_err());
    }

    #[test]
    fn test_accession_rejects_separators() {
        assert!(Accession::new("Q6GWV3").is_ok());
        assert!(Accession::new("A0A022PSB5-2").is_ok());
        assert!(Accession::new("Q6GWV3.1").is_err());
        assert!(Accession::new("../etc").is_err());
        assert!(Accession::new("").is_err());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("PPI".parse::<Kind>().unwrap(), Kind::Ppi);
        assert_eq!("protein".parse::<Kind>().unwrap(), Kind::Protein);
        assert!("mutant".parse::<Kind>().is_err());
        assert_eq!(Kind::Interactor.dir_name(), "Interactors");
    }

    #[test]
    fn test_interval_validation() {
        assert_eq!(Interval::new(3, 10).unwrap().len(), 7);
        assert!(Interval::new(10, 3).is_err());
    }

    #[test]
    fn test_decoded_interval_is_validated() {
        #[derive(Serialize)]
        struct Unchecked {
            start: usize,
            end: usize,
        }
        let reversed = bincode::serialize(&Unchecked { start: 10, end: 3 }).unwrap();
        assert!(bincode::deserialize::<Interval>(&reversed).is_err());

        let valid = bincode::serialize(&Interval::new(3, 10).unwrap()).unwrap();
        let decoded: Interval = bincode::deserialize(&valid).unwrap();
        assert_eq!((decoded.start(), decoded.end()), (3, 10));
    }
}
