//! Square tile buffers
//!
//! A [`Tile`] is the unit of partitioning, transfer and local computation: a
//! row-major `size × size` buffer tagged with the matrix it belongs to and its
//! coordinate in that matrix's tile grid.

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::{DmmError, DmmResult};
use crate::types::{MatrixId, TileCoord};

/// A square, row-major tile of one matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Element")]
pub struct Tile<T> {
    matrix: MatrixId,
    coord: TileCoord,
    size: usize,
    data: Vec<T>,
}

impl<T: Element> Tile<T> {
    /// Wrap an existing buffer; `data.len()` must be `size * size`
    pub fn from_vec(matrix: MatrixId, coord: TileCoord, size: usize, data: Vec<T>) -> DmmResult<Self> {
        if size == 0 {
            return Err(DmmError::validation("tile size must be positive"));
        }
        if data.len() != size * size {
            return Err(DmmError::validation(format!(
                "tile {}{} expects {} elements, got {}",
                matrix,
                coord,
                size * size,
                data.len()
            )));
        }
        Ok(Self {
            matrix,
            coord,
            size,
            data,
        })
    }

    /// All-zero tile
    pub fn zeros(matrix: MatrixId, coord: TileCoord, size: usize) -> Self {
        Self {
            matrix,
            coord,
            size,
            data: vec![T::zero(); size * size],
        }
    }

    pub fn matrix(&self) -> MatrixId {
        self.matrix
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Side length
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Element at local `(r, c)`
    pub fn get(&self, r: usize, c: usize) -> T {
        self.data[r * self.size + c]
    }

    /// Row `r` of the tile
    pub fn row(&self, r: usize) -> &[T] {
        &self.data[r * self.size..(r + 1) * self.size]
    }

    /// In-memory footprint of the buffer in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<T>()
    }

    /// Sum of all entries, accumulated in `f64`
    pub fn sum(&self) -> f64 {
        self.data.iter().map(|v| v.as_f64()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_validates_length() {
        let ok = Tile::<f32>::from_vec(MatrixId::A, TileCoord::new(0, 1), 2, vec![1.0; 4]);
        assert!(ok.is_ok());

        let bad = Tile::<f32>::from_vec(MatrixId::A, TileCoord::new(0, 1), 2, vec![1.0; 3]);
        assert!(bad.unwrap_err().is_validation());

        let empty = Tile::<f32>::from_vec(MatrixId::A, TileCoord::new(0, 0), 0, vec![]);
        assert!(empty.is_err());
    }

    #[test]
    fn test_accessors() {
        let tile =
            Tile::<f64>::from_vec(MatrixId::B, TileCoord::new(2, 3), 2, vec![1.0, 2.0, 3.0, 4.0])
                .unwrap();

        assert_eq!(tile.matrix(), MatrixId::B);
        assert_eq!(tile.coord(), TileCoord::new(2, 3));
        assert_eq!(tile.get(1, 0), 3.0);
        assert_eq!(tile.row(1), &[3.0, 4.0]);
        assert_eq!(tile.size_bytes(), 32);
        assert_eq!(tile.sum(), 10.0);
    }

    #[test]
    fn test_zeros() {
        let tile = Tile::<f32>::zeros(MatrixId::C, TileCoord::new(0, 0), 3);
        assert_eq!(tile.as_slice().len(), 9);
        assert_eq!(tile.sum(), 0.0);
    }
}
