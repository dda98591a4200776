use serde::{Deserialize, Serialize};

use crate::errors::{DbError, DbResult};

/// Square residue-by-residue matrix (distance, contact or attention map),
/// stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct Matrix {
    size: usize,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawMatrix {
    size: usize,
    data: Vec<f64>,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = DbError;

    fn try_from(raw: RawMatrix) -> DbResult<Self> {
        Matrix::new(raw.size, raw.data)
    }
}

impl Matrix {
    /// Create a matrix from row-major data, which must hold `size * size` values
    pub fn new(size: usize, data: Vec<f64>) -> DbResult<Self> {
        if data.len() != size * size {
            return Err(DbError::InvalidAttribute(format!(
                "map of size {} needs {} values, got {}",
                size,
                size * size,
                data.len()
            )));
        }
        Ok(Self { size, data })
    }

    pub fn zeros(size: usize) -> Self {
        Self { size, data: vec![0.0; size * size] }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> DbResult<Self> {
        let size = rows.len();
        if let Some(row) = rows.iter().find(|row| row.len() != size) {
            return Err(DbError::InvalidAttribute(format!(
                "map is not square: {} rows but a row of length {}",
                size,
                row.len()
            )));
        }
        Ok(Self { size, data: rows.into_iter().flatten().collect() })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.size + col]
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] = value;
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        // chunks(0) panics, so an empty map yields no rows
        self.data.chunks(self.size.max(1))
    }

    /// Zero-pad on the bottom and right up to `max_size`
    pub fn pad(&self, max_size: usize) -> DbResult<Self> {
        if max_size < self.size {
            return Err(DbError::InvalidAttribute(format!(
                "cannot pad a map of size {} down to {}",
                self.size, max_size
            )));
        }
        let mut padded = Self::zeros(max_size);
        for row in 0..self.size {
            for col in 0..self.size {
                padded.set(row, col, self.get(row, col));
            }
        }
        Ok(padded)
    }

    /// Zero the main diagonal and the two diagonals on each side of it.
    /// Residues that close in sequence are always in contact.
    pub fn remove_diagonal(&self) -> Self {
        let mut matrix = self.clone();
        for idx in 0..self.size {
            for offset in -2isize..=2 {
                let other = idx as isize + offset;
                if other >= 0 && (other as usize) < self.size {
                    matrix.set(idx, other as usize, 0.0);
                    matrix.set(other as usize, idx, 0.0);
                }
            }
        }
        matrix
    }

    /// Binary contact map: 1 where the distance is below `threshold` (Å)
    pub fn contact_map(&self, threshold: f64) -> Self {
        let data = self.data.iter().map(|&d| if d < threshold { 1.0 } else { 0.0 }).collect();
        Self { size: self.size, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distances() -> Matrix {
        Matrix::from_rows(vec![
            vec![0.0, 3.8, 6.1, 9.4],
            vec![3.8, 0.0, 3.8, 7.2],
            vec![6.1, 3.8, 0.0, 3.8],
            vec![9.4, 7.2, 3.8, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_shape_validation() {
        assert!(Matrix::new(2, vec![1.0, 2.0, 3.0]).is_err());
        assert!(Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
        assert_eq!(Matrix::new(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap().get(1, 0), 3.0);
    }

    #[test]
    fn test_decoded_matrix_is_validated() {
        #[derive(Serialize)]
        struct Unchecked {
            size: usize,
            data: Vec<f64>,
        }
        let short = bincode::serialize(&Unchecked { size: 3, data: vec![1.0] }).unwrap();
        assert!(bincode::deserialize::<Matrix>(&short).is_err());

        let encoded = bincode::serialize(&distances()).unwrap();
        assert_eq!(bincode::deserialize::<Matrix>(&encoded).unwrap(), distances());
    }

    #[test]
    fn test_pad() {
        let padded = distances().pad(6).unwrap();
        assert_eq!(padded.len(), 6);
        assert_eq!(padded.get(0, 3), 9.4);
        assert_eq!(padded.get(5, 5), 0.0);
        assert_eq!(padded.get(3, 4), 0.0);
        assert!(distances().pad(3).is_err());
    }

    #[test]
    fn test_remove_diagonal_keeps_far_pairs() {
        let cleared = distances().remove_diagonal();
        assert_eq!(cleared.get(0, 2), 0.0);
        assert_eq!(cleared.get(1, 3), 0.0);
        assert_eq!(cleared.get(0, 3), 9.4);
        assert_eq!(cleared.get(3, 0), 9.4);
    }

    #[test]
    fn test_contact_map_threshold() {
        let contacts = distances().contact_map(8.0);
        assert_eq!(contacts.get(0, 1), 1.0);
        assert_eq!(contacts.get(1, 3), 1.0);
        assert_eq!(contacts.get(0, 3), 0.0);
        assert_eq!(contacts.rows().count(), 4);
    }
}
