use super::LossFn;
use crate::{
    MlErr, Result,
    matrix::{self, Matrix, MatrixView},
};

/// Guards `ln(0)` when a predicted probability underflows.
const EPSILON: f64 = 1e-8;

/// Categorical cross-entropy over softmax outputs and one-hot labels.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for CrossEntropy {
    /// Computes `-(1/m) Σ y ln(ŷ + ε)`, only visiting the entries where `y > 0`.
    fn loss(&self, y_pred: MatrixView, y: MatrixView) -> Result<f64> {
        if y_pred.shape() != y.shape() {
            return Err(MlErr::ShapeMismatch {
                op: "cross entropy",
                left: y_pred.shape(),
                right: y.shape(),
            });
        }

        let (y_pred, y) = (y_pred.array(), y.array());
        let mut cost = 0.0;

        for (p_col, y_col) in y_pred.columns().into_iter().zip(y.columns()) {
            for (&p, &t) in p_col.iter().zip(y_col.iter()) {
                if t > 0.0 {
                    cost -= t * (p + EPSILON).ln();
                }
            }
        }

        Ok(cost / y.ncols() as f64)
    }

    /// Softmax followed by cross-entropy has the closed-form gradient `ŷ - y`.
    fn loss_prime(&self, y_pred: MatrixView, y: MatrixView) -> Result<Matrix> {
        matrix::sub(y_pred, y)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn loss_averages_over_samples() {
        let y_pred = Matrix::from_rows(&[[0.5, 0.1], [0.5, 0.9]]).unwrap();
        let y = Matrix::from_rows(&[[1., 0.], [0., 1.]]).unwrap();

        let loss = CrossEntropy.loss(y_pred.view(), y.view()).unwrap();
        let expected = -((0.5f64 + EPSILON).ln() + (0.9f64 + EPSILON).ln()) / 2.;
        assert_abs_diff_eq!(loss, expected, epsilon = 1e-12);
    }

    #[test]
    fn zero_probability_stays_finite() {
        let y_pred = Matrix::from_rows(&[[0.], [1.]]).unwrap();
        let y = Matrix::from_rows(&[[1.], [0.]]).unwrap();

        let loss = CrossEntropy.loss(y_pred.view(), y.view()).unwrap();
        assert_abs_diff_eq!(loss, -EPSILON.ln(), epsilon = 1e-9);
    }

    #[test]
    fn gradient_is_prediction_minus_target() {
        let y_pred = Matrix::from_rows(&[[0.25], [0.75]]).unwrap();
        let y = Matrix::from_rows(&[[0.], [1.]]).unwrap();

        let d = CrossEntropy.loss_prime(y_pred.view(), y.view()).unwrap();
        assert_eq!(d.as_slice(), &[0.25, -0.25]);
    }

    #[test]
    fn shapes_must_agree() {
        let y_pred = Matrix::zeros(2, 3).unwrap();
        let y = Matrix::zeros(3, 2).unwrap();
        assert!(CrossEntropy.loss(y_pred.view(), y.view()).is_err());
        assert!(CrossEntropy.loss_prime(y_pred.view(), y.view()).is_err());
    }
}
