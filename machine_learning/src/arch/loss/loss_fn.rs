use crate::{
    Result,
    matrix::{Matrix, MatrixView},
};

pub trait LossFn {
    /// Returns the mean loss over the batch's columns.
    fn loss(&self, y_pred: MatrixView, y: MatrixView) -> Result<f64>;

    /// Returns the gradient of the summed loss with respect to the output layer's
    /// pre-activation, one column per sample.
    fn loss_prime(&self, y_pred: MatrixView, y: MatrixView) -> Result<Matrix>;
}
