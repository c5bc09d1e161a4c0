use super::Optimizer;
use crate::{
    MlErr, Result,
    arch::{Gradients, NetworkParams},
};

/// Gradient descent optimization algorithm.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    learning_rate: f64,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step in the opposite direction of the gradient, that is, `w -= lr * dw` and
    /// `b -= lr * db` for every layer.
    ///
    /// # Arguments
    /// * `params` - The parameters that are going to be modified.
    /// * `grads` - The gradient used for taking the step.
    fn update_params(&mut self, params: &mut NetworkParams, grads: &Gradients) -> Result<()> {
        if params.num_layers() != grads.layers().len() {
            return Err(MlErr::ShapeMismatch {
                op: "update",
                left: (params.num_layers(), 1),
                right: (grads.layers().len(), 1),
            });
        }

        let lr = self.learning_rate;

        for (layer, grad) in params.layers_mut().iter_mut().zip(grads.layers()) {
            layer.w.sub_scaled(lr, grad.dw())?;
            layer.b.sub_scaled(lr, grad.db())?;
        }

        Ok(())
    }
}
