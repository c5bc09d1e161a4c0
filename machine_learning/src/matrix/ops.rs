use ndarray::{ArrayView1, Axis, Zip, parallel::prelude::*};

use super::{Matrix, MatrixView, alloc_zeroed};
use crate::{MlErr, Result};

// Every output cell is written by exactly one task and summed in a fixed order, the
// results don't depend on how rayon splits the work.

fn dot(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).fold(0.0, |acc, (x, y)| acc + x * y)
}

fn same_shape(op: &'static str, a: MatrixView, b: MatrixView) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(MlErr::ShapeMismatch {
            op,
            left: a.shape(),
            right: b.shape(),
        });
    }

    Ok(())
}

fn mismatch(op: &'static str, a: MatrixView, b: MatrixView) -> MlErr {
    MlErr::ShapeMismatch {
        op,
        left: a.shape(),
        right: b.shape(),
    }
}

/// Elementwise `a + b`.
pub fn add<'a, 'b>(a: impl Into<MatrixView<'a>>, b: impl Into<MatrixView<'b>>) -> Result<Matrix> {
    let (a, b) = (a.into(), b.into());
    same_shape("add", a, b)?;

    let mut out = alloc_zeroed(a.rows(), a.cols())?;
    Zip::from(&mut out)
        .and(&a.array())
        .and(&b.array())
        .par_for_each(|o, &x, &y| *o = x + y);

    Ok(Matrix { data: out })
}

/// Elementwise `a - b`.
pub fn sub<'a, 'b>(a: impl Into<MatrixView<'a>>, b: impl Into<MatrixView<'b>>) -> Result<Matrix> {
    let (a, b) = (a.into(), b.into());
    same_shape("sub", a, b)?;

    let mut out = alloc_zeroed(a.rows(), a.cols())?;
    Zip::from(&mut out)
        .and(&a.array())
        .and(&b.array())
        .par_for_each(|o, &x, &y| *o = x - y);

    Ok(Matrix { data: out })
}

/// Elementwise `a * k`.
pub fn scale<'a>(a: impl Into<MatrixView<'a>>, k: f64) -> Result<Matrix> {
    let a = a.into();

    let mut out = alloc_zeroed(a.rows(), a.cols())?;
    Zip::from(&mut out)
        .and(&a.array())
        .par_for_each(|o, &x| *o = x * k);

    Ok(Matrix { data: out })
}

/// Returns a new matrix with rows and columns swapped.
pub fn transpose<'a>(a: impl Into<MatrixView<'a>>) -> Result<Matrix> {
    let a = a.into();
    let a = a.array();

    let mut out = alloc_zeroed(a.ncols(), a.nrows())?;
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(a.axis_iter(Axis(1)))
        .for_each(|(mut row, col)| row.assign(&col));

    Ok(Matrix { data: out })
}

/// The matrix product `a × b`.
///
/// `b` is transposed first so both operands are walked along contiguous rows.
///
/// # Arguments
/// * `a` - An `n x k` matrix.
/// * `b` - A `k x m` matrix.
///
/// # Returns
/// The `n x m` product or a shape mismatch.
pub fn multiply<'a, 'b>(
    a: impl Into<MatrixView<'a>>,
    b: impl Into<MatrixView<'b>>,
) -> Result<Matrix> {
    let (a, b) = (a.into(), b.into());
    if a.cols() != b.rows() {
        return Err(mismatch("multiply", a, b));
    }

    let bt = transpose(b)?;
    let (a, bt) = (a.array(), bt.data.view());

    let mut out = alloc_zeroed(a.nrows(), bt.nrows())?;
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            let a_row = a.row(i);
            for (o, b_row) in row.iter_mut().zip(bt.rows()) {
                *o = dot(a_row, b_row);
            }
        });

    Ok(Matrix { data: out })
}

/// Computes `w × a + bias` in a single pass, the bias column is added to every column.
///
/// Each sum starts from the bias and then accumulates the products in order.
///
/// # Arguments
/// * `w` - An `n x k` weight matrix.
/// * `a` - A `k x m` input, one sample per column.
/// * `bias` - An `n x 1` column vector.
///
/// # Returns
/// The `n x m` pre-activation or a shape mismatch.
pub fn fused_linear<'a, 'b, 'c>(
    w: impl Into<MatrixView<'a>>,
    a: impl Into<MatrixView<'b>>,
    bias: impl Into<MatrixView<'c>>,
) -> Result<Matrix> {
    let (w, a, bias) = (w.into(), a.into(), bias.into());
    if w.cols() != a.rows() {
        return Err(mismatch("fused_linear", w, a));
    }
    if bias.shape() != (w.rows(), 1) {
        return Err(mismatch("fused_linear", w, bias));
    }

    let at = transpose(a)?;
    let (w, at, bias) = (w.array(), at.data.view(), bias.array());

    let mut out = alloc_zeroed(w.nrows(), at.nrows())?;
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            let w_row = w.row(i);
            let b = bias[(i, 0)];

            for (o, a_col) in row.iter_mut().zip(at.rows()) {
                *o = w_row
                    .iter()
                    .zip(a_col.iter())
                    .fold(b, |acc, (x, y)| acc + x * y);
            }
        });

    Ok(Matrix { data: out })
}

/// Sums every row, returning a column vector with one entry per row.
pub fn row_sums<'a>(a: impl Into<MatrixView<'a>>) -> Result<Matrix> {
    let a = a.into();
    let a = a.array();

    let mut out = alloc_zeroed(a.nrows(), 1)?;
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(a.axis_iter(Axis(0)))
        .for_each(|(mut o, row)| o[0] = row.iter().fold(0.0, |acc, x| acc + x));

    Ok(Matrix { data: out })
}

/// Computes `(a × bᵀ) * k` without materializing the transpose.
///
/// # Arguments
/// * `a` - An `n x m` matrix.
/// * `b` - A `p x m` matrix.
/// * `k` - The factor applied to every dot product.
///
/// # Returns
/// The `n x p` result or a shape mismatch.
pub fn multiply_transpose_b<'a, 'b>(
    a: impl Into<MatrixView<'a>>,
    b: impl Into<MatrixView<'b>>,
    k: f64,
) -> Result<Matrix> {
    let (a, b) = (a.into(), b.into());
    if a.cols() != b.cols() {
        return Err(mismatch("multiply_transpose_b", a, b));
    }

    let (a, b) = (a.array(), b.array());

    let mut out = alloc_zeroed(a.nrows(), b.nrows())?;
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            let a_row = a.row(i);
            for (o, b_row) in row.iter_mut().zip(b.rows()) {
                *o = dot(a_row, b_row) * k;
            }
        });

    Ok(Matrix { data: out })
}

/// Computes `aᵀ × b` without materializing the transpose.
///
/// Row `i` of the result accumulates `a[k, i] * b.row(k)` for increasing `k`, so both
/// operands are read along rows.
///
/// # Arguments
/// * `a` - A `k x n` matrix.
/// * `b` - A `k x m` matrix.
///
/// # Returns
/// The `n x m` result or a shape mismatch.
pub fn transpose_multiply<'a, 'b>(
    a: impl Into<MatrixView<'a>>,
    b: impl Into<MatrixView<'b>>,
) -> Result<Matrix> {
    let (a, b) = (a.into(), b.into());
    if a.rows() != b.rows() {
        return Err(mismatch("transpose_multiply", a, b));
    }

    let (a, b) = (a.array(), b.array());

    let mut out = alloc_zeroed(a.ncols(), b.ncols())?;
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            for (a_ki, b_row) in a.column(i).iter().zip(b.rows()) {
                row.zip_mut_with(&b_row, |o, &x| *o += a_ki * x);
            }
        });

    Ok(Matrix { data: out })
}
