//! Interaction consensus.
//!
//! Collapses the raw measurements that several origins reported for one
//! protein pair into a single [`Verdict`]. Every origin is scored on its own
//! ([`score_origin`]) and the per-origin verdicts are then resolved by
//! majority ([`consensus`]). Origins whose label contains [`COMBINED_MARKER`]
//! are independent screens of the same kind; their raw values are pooled
//! into one bucket before scoring instead of voting separately.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{DbError, DbResult};
use crate::value::Evidence;

/// Origins whose label contains this marker are pooled before scoring
pub const COMBINED_MARKER: char = '&';

/// Tokens for automatic calls, missing data and badly labelled screens.
/// They carry no information and are dropped before scoring.
pub const DISCARDED_TOKENS: [&str; 3] = ["A", "ND", "NWL"];

/// Token for a non-conclusive call, scored as 0.5
pub const NON_CONCLUSIVE: &str = "NC";

const POSITIVE_MEAN: f64 = 0.6;
const NEGATIVE_MEAN: f64 = 0.4;

/// Consensus outcome for a protein pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verdict {
    Positive,
    Negative,
    Undetermined,
}

impl Verdict {
    /// Label used in exported tables: `1`, `0` or `?`
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Positive => "1",
            Verdict::Negative => "0",
            Verdict::Undetermined => "?",
        }
    }

    pub fn is_determined(&self) -> bool {
        *self != Verdict::Undetermined
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Verdict {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s {
            "1" => Ok(Verdict::Positive),
            "0" => Ok(Verdict::Negative),
            "?" => Ok(Verdict::Undetermined),
            _ => Err(DbError::consistency(format!("{:?} is not a verdict", s))),
        }
    }
}

fn numeric_scores(values: &[Evidence]) -> DbResult<Vec<f64>> {
    let mut scores = Vec::with_capacity(values.len());
    for value in values {
        let score = match value {
            Evidence::Missing => continue,
            Evidence::Token(token) => {
                let token = token.trim();
                if DISCARDED_TOKENS.contains(&token) {
                    continue;
                }
                if token != NON_CONCLUSIVE {
                    return Err(DbError::consistency(format!(
                        "unknown evidence token {:?}",
                        token
                    )));
                }
                0.5
            }
            Evidence::Int(v) => *v as f64,
        };
        if score != 0.0 && score != 0.5 && score != 1.0 {
            return Err(DbError::consistency(format!("evidence value {} is not 0 or 1", value)));
        }
        scores.push(score);
    }
    Ok(scores)
}

/// Score the raw values reported by a single origin
pub fn score_origin(values: &[Evidence]) -> DbResult<Verdict> {
    let scores = numeric_scores(values)?;
    let verdict = match scores.as_slice() {
        [] => Verdict::Undetermined,
        [single] => {
            if *single == 1.0 {
                Verdict::Positive
            } else if *single == 0.0 {
                Verdict::Negative
            } else {
                Verdict::Undetermined
            }
        }
        [a, b] => {
            if *a == 1.0 || *b == 1.0 {
                Verdict::Positive
            } else if *a == 0.0 || *b == 0.0 {
                Verdict::Negative
            } else if *a == 0.5 && *b == 0.5 {
                Verdict::Undetermined
            } else {
                return Err(DbError::consistency(format!("cannot score pair ({}, {})", a, b)));
            }
        }
        many => {
            let mean = many.iter().sum::<f64>() / many.len() as f64;
            if mean > POSITIVE_MEAN {
                Verdict::Positive
            } else if mean < NEGATIVE_MEAN {
                Verdict::Negative
            } else {
                Verdict::Undetermined
            }
        }
    };
    Ok(verdict)
}

struct Bucket<'a> {
    label: &'a str,
    values: Vec<Evidence>,
}

/// Resolve the evidence of every origin into one verdict.
///
/// `origin[i]` is the label of the source that reported `interaction[i]`.
/// Repeated labels are treated as one origin with the values concatenated.
pub fn consensus<S: AsRef<str>>(origin: &[S], interaction: &[Vec<Evidence>]) -> DbResult<Verdict> {
    if origin.len() != interaction.len() {
        return Err(DbError::consistency(format!(
            "{} origins but {} interaction lists",
            origin.len(),
            interaction.len()
        )));
    }

    let mut buckets: Vec<Bucket<'_>> = Vec::new();
    let mut pooled: Vec<Evidence> = Vec::new();
    for (label, values) in origin.iter().zip(interaction) {
        let label = label.as_ref();
        if label.contains(COMBINED_MARKER) {
            pooled.extend(values.iter().cloned());
        } else if let Some(bucket) = buckets.iter_mut().find(|b| b.label == label) {
            bucket.values.extend(values.iter().cloned());
        } else {
            buckets.push(Bucket { label, values: values.clone() });
        }
    }

    if buckets.is_empty() {
        // Only pooled screens (or nothing at all): score the raw pool once
        return score_origin(&pooled);
    }
    if !pooled.is_empty() {
        buckets.push(Bucket { label: "scoring", values: pooled });
    }

    let verdicts = buckets
        .iter()
        .map(|bucket| score_origin(&bucket.values))
        .collect::<DbResult<Vec<_>>>()?;
    Ok(majority(&verdicts))
}

fn majority(verdicts: &[Verdict]) -> Verdict {
    match verdicts.split_first() {
        None => return Verdict::Undetermined,
        Some((first, rest)) if rest.iter().all(|v| v == first) => return *first,
        _ => {}
    }

    // Counts in first-seen order keep the result independent of hashing
    let mut counts: Vec<(Verdict, usize)> = Vec::new();
    for verdict in verdicts.iter().filter(|v| v.is_determined()) {
        match counts.iter_mut().find(|(v, _)| v == verdict) {
            Some((_, n)) => *n += 1,
            None => counts.push((*verdict, 1)),
        }
    }

    let Some(&(_, top)) = counts.iter().max_by_key(|(_, n)| *n) else {
        return Verdict::Undetermined;
    };
    if counts.iter().all(|(_, n)| *n == top) {
        return Verdict::Undetermined;
    }
    counts.iter().find(|(_, n)| *n == top).map(|(v, _)| *v).unwrap_or(Verdict::Undetermined)
}
