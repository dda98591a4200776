use std::collections::HashMap;

use crate::errors::{DbError, DbResult};

/// Standard amino acids
pub const STANDARD_AA: [char; 20] = [
    'A', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V', 'W',
    'Y',
];

pub const SPECIAL_AA: [char; 4] = ['X', 'U', 'O', '*'];

/// Amino acid ambiguity codes and the residues each one stands for
#[derive(Debug)]
pub struct AminoAcidAlphabet {
    ambiguity: HashMap<char, [char; 2]>,
}

impl AminoAcidAlphabet {
    pub fn new() -> Self {
        let mut ambiguity = HashMap::new();
        ambiguity.insert('B', ['D', 'N']); // Aspartic acid or Asparagine
        ambiguity.insert('Z', ['E', 'Q']); // Glutamic acid or Glutamine
        ambiguity.insert('J', ['I', 'L']); // Isoleucine or Leucine
        AminoAcidAlphabet { ambiguity }
    }

    pub fn is_valid_aa(&self, aa: char) -> bool {
        // Put the most common case, the 20 standard amino acids, first
        STANDARD_AA.contains(&aa) || SPECIAL_AA.contains(&aa) || self.ambiguity.contains_key(&aa)
    }

    /// Residues an ambiguity code may stand for, `None` for unambiguous codes
    pub fn resolutions(&self, aa: char) -> Option<&[char; 2]> {
        self.ambiguity.get(&aa)
    }

    /// Reject sequences with characters outside the alphabet. Positions in
    /// the error are 1-based.
    pub fn validate_sequence(&self, sequence: &str) -> DbResult<()> {
        match sequence.chars().enumerate().find(|(_, c)| !self.is_valid_aa(*c)) {
            Some((i, c)) => Err(DbError::InvalidAminoAcid(c, i + 1)),
            None => Ok(()),
        }
    }
}

impl Default for AminoAcidAlphabet {
    fn default() -> Self {
        Self::new()
    }
}

/// A `WT<pos>MUT` edit: the residues `wild_type` starting at 1-based
/// `position` are replaced by `mutant`. Either side may be empty, which makes
/// the edit a deletion (`M1`) or an insertion (`12R`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub wild_type: String,
    pub position: usize,
    pub mutant: String,
}

impl Mutation {
    pub fn parse(mutation: &str) -> DbResult<Self> {
        let invalid = |message: &str| DbError::InvalidMutation {
            mutation: mutation.to_string(),
            message: message.to_string(),
        };

        let digits_at = mutation.find(|c: char| c.is_ascii_digit()).ok_or_else(|| invalid("no position"))?;
        let (wild_type, rest) = mutation.split_at(digits_at);
        let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (position, mutant) = rest.split_at(digits_end);

        if !wild_type.chars().chain(mutant.chars()).all(|c| c.is_ascii_uppercase()) {
            return Err(invalid("residues must be uppercase letters"));
        }
        let position: usize = position.parse().map_err(|_| invalid("position is not a number"))?;
        if position == 0 {
            return Err(invalid("positions are 1-based"));
        }

        Ok(Self { wild_type: wild_type.to_string(), position, mutant: mutant.to_string() })
    }

    /// Apply to `sequence`, checking the wild type residues first
    pub fn apply(&self, sequence: &str) -> DbResult<String> {
        let start = self.position - 1;
        let end = start + self.wild_type.len();
        if sequence.get(start..end) != Some(self.wild_type.as_str()) {
            return Err(DbError::InvalidMutation {
                mutation: self.to_string(),
                message: format!("wild type does not match a sequence of length {}", sequence.len()),
            });
        }
        let mut mutated = String::with_capacity(sequence.len() + self.mutant.len());
        mutated.push_str(&sequence[..start]);
        mutated.push_str(&self.mutant);
        mutated.push_str(&sequence[end..]);
        Ok(mutated)
    }
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.wild_type, self.position, self.mutant)
    }
}

/// Apply mutations in order; each one sees the result of the previous
pub fn apply_mutations<S: AsRef<str>>(sequence: &str, mutations: &[S]) -> DbResult<String> {
    mutations.iter().try_fold(sequence.to_string(), |seq, mutation| {
        Mutation::parse(mutation.as_ref())?.apply(&seq)
    })
}
