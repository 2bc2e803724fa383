//! Dense `f32` arrays exchanged with the inference backend

use crate::error::VisionError;

/// Row-major tensor with an explicit shape
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, VisionError> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| VisionError::Processing("Tensor shape would overflow".to_string()))?;
        if expected != data.len() {
            return Err(VisionError::Processing(format!(
                "Tensor shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shape with a leading batch dimension of 1 removed
    pub fn unbatched_shape(&self) -> &[usize] {
        match self.shape.split_first() {
            Some((1, rest)) if !rest.is_empty() => rest,
            _ => &self.shape,
        }
    }

    /// Interpret as `C × H × W`, accepting an optional batch dimension of 1
    pub fn as_chw(&self) -> Result<(usize, usize, usize), VisionError> {
        match *self.unbatched_shape() {
            [c, h, w] => Ok((c, h, w)),
            _ => Err(VisionError::Processing(format!(
                "Expected a C×H×W tensor, got shape {:?}",
                self.shape
            ))),
        }
    }
}

/// Row-major 2-D matrix of `f32`
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, VisionError> {
        if rows == 0 || cols == 0 {
            return Err(VisionError::Processing(format!(
                "Matrix {}x{} has an empty dimension",
                rows, cols
            )));
        }
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(VisionError::Processing(format!(
                "Matrix {}x{} needs {} elements, got {}",
                rows,
                cols,
                rows.saturating_mul(cols),
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    /// `self · vector`
    pub fn dot_vector(&self, vector: &[f32]) -> Result<Vec<f32>, VisionError> {
        if vector.len() != self.cols {
            return Err(VisionError::Processing(format!(
                "Cannot multiply {}x{} matrix with vector of length {}",
                self.rows,
                self.cols,
                vector.len()
            )));
        }
        Ok(self
            .data
            .chunks_exact(self.cols)
            .map(|row| row.iter().zip(vector).map(|(a, b)| a * b).sum())
            .collect())
    }
}
