//! Dense, row-major `f64` matrices and the kernels the network is built from.
//!
//! Element `(i, j)` is 0-indexed: row `i`, column `j`, stored at `values[i * cols + j]` for
//! owned matrices. Samples are laid out as columns.

mod ops;

use ndarray::{Array2, ArrayView2, s};

pub use ops::{
    add, fused_linear, multiply, multiply_transpose_b, row_sums, scale, sub, transpose,
    transpose_multiply,
};

use crate::{MlErr, Result};

/// Allocates a zeroed buffer for a `rows` x `cols` matrix, reporting allocation failures.
pub(crate) fn alloc_zeroed(rows: usize, cols: usize) -> Result<Array2<f64>> {
    if rows == 0 || cols == 0 {
        return Err(MlErr::EmptyShape { rows, cols });
    }

    let len = rows
        .checked_mul(cols)
        .ok_or(MlErr::Alloc { rows, cols })?;

    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| MlErr::Alloc { rows, cols })?;
    values.resize(len, 0.0);

    Ok(Array2::from_shape_vec((rows, cols), values)?)
}

/// An owned matrix, always in standard (row-major, contiguous) layout and never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Array2<f64>,
}

impl Matrix {
    /// Creates a matrix filled with zeros.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows, must be positive.
    /// * `cols` - The amount of columns, must be positive.
    ///
    /// # Returns
    /// The matrix or an error if the shape is empty or the buffer can't be allocated.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        Ok(Self {
            data: alloc_zeroed(rows, cols)?,
        })
    }

    /// Creates a matrix from its row-major values.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows, must be positive.
    /// * `cols` - The amount of columns, must be positive.
    /// * `values` - Exactly `rows * cols` values, row after row.
    pub fn from_vec(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(MlErr::EmptyShape { rows, cols });
        }

        Ok(Self {
            data: Array2::from_shape_vec((rows, cols), values)?,
        })
    }

    /// Creates a matrix from nested rows, mostly useful for small literals.
    ///
    /// # Arguments
    /// * `rows` - The rows of the matrix, all of them must have the same length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let values = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Self::from_vec(rows.len(), cols, values)
    }

    /// Takes ownership of an ndarray, converting it to standard layout if needed.
    pub fn from_array(data: Array2<f64>) -> Result<Self> {
        let (rows, cols) = data.dim();
        if rows == 0 || cols == 0 {
            return Err(MlErr::EmptyShape { rows, cols });
        }

        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };

        Ok(Self { data })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Returns `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Returns the element at row `i` and column `j`, or `None` if out of bounds.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.data.get((i, j)).copied()
    }

    /// Returns a mutable reference to the element at row `i` and column `j`.
    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut f64> {
        self.data.get_mut((i, j))
    }

    /// The row-major values of the matrix.
    pub fn as_slice(&self) -> &[f64] {
        self.data
            .as_slice()
            .unwrap_or_else(|| unreachable!("owned matrices are kept in standard layout"))
    }

    /// The row-major values of the matrix, mutably. Used to hand the buffer to reductions.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data
            .as_slice_mut()
            .unwrap_or_else(|| unreachable!("owned matrices are kept in standard layout"))
    }

    pub fn view(&self) -> MatrixView<'_> {
        MatrixView {
            data: self.data.view(),
        }
    }

    /// Borrows `count` contiguous columns starting at `start`.
    pub fn columns(&self, start: usize, count: usize) -> Result<MatrixView<'_>> {
        self.view().columns(start, count)
    }

    /// The underlying ndarray.
    pub fn array(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    /// Mutable access for in-place elementwise updates, which keep the layout intact.
    pub(crate) fn array_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    /// In-place `self -= k * other`, the only kernel that doesn't allocate.
    ///
    /// # Arguments
    /// * `k` - The factor applied to `other`.
    /// * `other` - A matrix with the same shape as `self`.
    pub fn sub_scaled<'a>(&mut self, k: f64, other: impl Into<MatrixView<'a>>) -> Result<()> {
        let other = other.into();
        if self.shape() != other.shape() {
            return Err(MlErr::ShapeMismatch {
                op: "sub_scaled",
                left: self.shape(),
                right: other.shape(),
            });
        }

        self.data.zip_mut_with(&other.data, |x, &y| *x -= k * y);
        Ok(())
    }
}

/// A borrowed, read-only window over a matrix, possibly narrowed to some of its columns.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    data: ArrayView2<'a, f64>,
}

impl<'a> MatrixView<'a> {
    /// Wraps an ndarray view, which must not be empty.
    pub fn from_array(data: ArrayView2<'a, f64>) -> Result<Self> {
        let (rows, cols) = data.dim();
        if rows == 0 || cols == 0 {
            return Err(MlErr::EmptyShape { rows, cols });
        }

        Ok(Self { data })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.data.get((i, j)).copied()
    }

    /// Narrows the view to `count` contiguous columns starting at `start`.
    ///
    /// # Returns
    /// The narrowed view, or an error if the range is empty or out of bounds.
    pub fn columns(self, start: usize, count: usize) -> Result<MatrixView<'a>> {
        let cols = self.cols();
        if count == 0 || start.checked_add(count).is_none_or(|end| end > cols) {
            return Err(MlErr::OutOfBounds { start, count, cols });
        }

        Ok(Self {
            data: self.data.slice_move(s![.., start..start + count]),
        })
    }

    pub fn array(&self) -> ArrayView2<'a, f64> {
        self.data
    }

    /// Shortens the view's lifetime, which ndarray views can't do implicitly.
    pub fn reborrow<'b>(self) -> MatrixView<'b>
    where
        'a: 'b,
    {
        MatrixView {
            data: self.data.reborrow(),
        }
    }

    /// Copies the view into a new owned matrix.
    pub fn to_owned(&self) -> Result<Matrix> {
        let (rows, cols) = self.shape();
        let mut data = alloc_zeroed(rows, cols)?;
        data.assign(&self.data);
        Ok(Matrix { data })
    }
}

impl<'a> From<&'a Matrix> for MatrixView<'a> {
    fn from(value: &'a Matrix) -> Self {
        value.view()
    }
}
