use ndarray::{Axis, Zip, parallel::prelude::*};

use crate::{
    MlErr, Result,
    matrix::{Matrix, MatrixView},
};

/// The activation applied after a layer's linear step.
///
/// Hidden layers use `Relu`, the output layer uses `Softmax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActFn {
    Relu,
    Softmax,
}

use ActFn::*;

impl ActFn {
    /// Applies the activation to a pre-activation matrix.
    ///
    /// # Arguments
    /// * `z` - The pre-activation, one sample per column.
    ///
    /// # Returns
    /// A new matrix with the activation's output.
    pub fn f<'a>(&self, z: impl Into<MatrixView<'a>>) -> Result<Matrix> {
        let z = z.into();
        let mut a = z.to_owned()?;

        match self {
            Relu => a.array_mut().par_mapv_inplace(|x| x.max(0.0)),
            Softmax => softmax_columns(&mut a),
        }

        Ok(a)
    }

    /// Turns the gradient with respect to this activation's output into the gradient with
    /// respect to its input, consuming `da`.
    ///
    /// `Softmax` is only ever paired with cross-entropy, whose gradient with respect to the
    /// pre-activation is already `AL - Y`, so it passes `da` through untouched.
    ///
    /// # Arguments
    /// * `da` - The incoming gradient.
    /// * `z` - The pre-activation cached by the forward pass.
    ///
    /// # Returns
    /// The gradient with respect to `z`, or a shape mismatch.
    pub fn df<'a>(&self, mut da: Matrix, z: impl Into<MatrixView<'a>>) -> Result<Matrix> {
        let z = z.into();
        if da.shape() != z.shape() {
            return Err(MlErr::ShapeMismatch {
                op: "activation backward",
                left: da.shape(),
                right: z.shape(),
            });
        }

        if let Relu = self {
            Zip::from(da.array_mut())
                .and(&z.array())
                .par_for_each(|d, &z| {
                    if z <= 0.0 {
                        *d = 0.0;
                    }
                });
        }

        Ok(da)
    }
}

/// Normalizes every column into a probability distribution, subtracting the column's max
/// first so large inputs don't overflow.
fn softmax_columns(a: &mut Matrix) {
    a.array_mut()
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .for_each(|mut col| {
            let max = col.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
            col.mapv_inplace(|x| (x - max).exp());
            let sum = col.fold(0.0, |acc, &x| acc + x);
            col.mapv_inplace(|x| x / sum);
        });
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn column_sums(a: &Matrix) -> Vec<f64> {
        (0..a.cols())
            .map(|j| (0..a.rows()).map(|i| a.get(i, j).unwrap()).sum())
            .collect()
    }

    #[test]
    fn relu_clamps_negatives() {
        let z = Matrix::from_rows(&[[-1., 0., 2.5]]).unwrap();
        assert_eq!(Relu.f(&z).unwrap().as_slice(), &[0., 0., 2.5]);
    }

    #[test]
    fn relu_backward_masks_non_positive_inputs() {
        let z = Matrix::from_rows(&[[-1., 0., 2.5], [3., -0.1, 1e-9]]).unwrap();
        let da = Matrix::from_rows(&[[4., 5., 6.], [7., 8., 9.]]).unwrap();

        let dz = Relu.df(da, &z).unwrap();
        assert_eq!(dz.as_slice(), &[0., 0., 6., 7., 0., 9.]);
    }

    #[test]
    fn softmax_columns_sum_to_one() {
        let z = Matrix::from_rows(&[[1., -3., 0.], [2., 0., 0.], [3., 5., 0.]]).unwrap();
        let a = Softmax.f(&z).unwrap();

        for sum in column_sums(&a) {
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(a.get(0, 2).unwrap(), 1. / 3., epsilon = 1e-12);
        assert!(a.get(2, 0).unwrap() > a.get(1, 0).unwrap());
    }

    #[test]
    fn softmax_is_stable_for_huge_inputs() {
        let z = Matrix::from_rows(&[[1000., -1000.], [1001., -1e6], [999., -999.]]).unwrap();
        let a = Softmax.f(&z).unwrap();

        assert!(a.as_slice().iter().all(|x| x.is_finite()));
        for sum in column_sums(&a) {
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(a.get(2, 1).unwrap(), 1. / (1. + (-1f64).exp()), epsilon = 1e-12);
    }

    #[test]
    fn softmax_backward_passes_through() {
        let z = Matrix::zeros(2, 2).unwrap();
        let da = Matrix::from_rows(&[[0.25, -1.], [-0.25, 1.]]).unwrap();

        assert_eq!(Softmax.df(da.clone(), &z).unwrap(), da);
        assert!(Softmax.df(da, &Matrix::zeros(2, 3).unwrap()).is_err());
    }
}
