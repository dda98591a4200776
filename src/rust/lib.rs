pub mod cache;
pub mod config;
pub mod consensus;
pub mod database;
pub mod entity;
pub mod errors;
pub mod interactor;
pub mod io;
pub mod iterators;
pub mod maps;
pub mod metrics;
pub mod ppi;
pub mod protein;
pub mod repository;
pub mod sequence;
pub mod store;
pub mod types;
pub mod value;

#[cfg(test)]
mod tests;

pub use consensus::{consensus, score_origin, Verdict};
pub use database::Database;
pub use errors::{DbError, DbResult};
pub use interactor::Interactor;
pub use ppi::Ppi;
pub use protein::Protein;
pub use types::{Accession, PpiKey, ProteinKey};

#[cfg(feature = "python")]
mod python {
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::types::ProteinKey;
    use crate::value::Evidence;

    /// md5 key of a protein sequence
    #[pyfunction]
    fn protein_key(seq: &str) -> String {
        ProteinKey::from_sequence(seq).to_string()
    }

    // Variants are tried in order; `None` falls through to `Missing`.
    // Columns read through pandas arrive as floats, with NaN for gaps.
    #[derive(FromPyObject)]
    enum PyEvidence {
        Int(i64),
        Float(f64),
        Token(String),
        Missing(Option<i64>),
    }

    impl PyEvidence {
        fn into_evidence(self) -> PyResult<Evidence> {
            match self {
                PyEvidence::Int(v) => Ok(Evidence::Int(v)),
                PyEvidence::Float(v) if v.is_nan() => Ok(Evidence::Missing),
                PyEvidence::Float(v) if v.fract() == 0.0 && v.is_finite() => Ok(Evidence::Int(v as i64)),
                PyEvidence::Float(v) => {
                    Err(PyValueError::new_err(format!("evidence value {} is not an integer", v)))
                }
                PyEvidence::Token(t) => Ok(Evidence::Token(t)),
                PyEvidence::Missing(_) => Ok(Evidence::Missing),
            }
        }
    }

    fn to_interaction(interaction: Vec<Vec<PyEvidence>>) -> PyResult<Vec<Vec<Evidence>>> {
        interaction
            .into_iter()
            .map(|values| values.into_iter().map(PyEvidence::into_evidence).collect())
            .collect()
    }

    /// Consensus verdict, "1", "0" or "?", of the evidence of one pair
    #[pyfunction]
    fn interaction_verdict(origin: Vec<String>, interaction: Vec<Vec<PyEvidence>>) -> PyResult<String> {
        let interaction = to_interaction(interaction)?;
        crate::consensus::consensus(&origin, &interaction)
            .map(|verdict| verdict.label().to_string())
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }


    /// A Python module implemented in Rust.
    #[pymodule]
    fn ppidb(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(protein_key, m)?)?;
        m.add_function(wrap_pyfunction!(interaction_verdict, m)?)?;
        Ok(())
    }
}
