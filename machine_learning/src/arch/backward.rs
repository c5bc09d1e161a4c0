use log::trace;

use super::{ForwardPass, loss::LossFn};
use crate::{
    MlErr, Result,
    matrix::{self, Matrix, MatrixView},
};

/// The gradient of the cost with respect to a single layer's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGrads {
    pub(crate) dw: Matrix,
    pub(crate) db: Matrix,
}

impl LayerGrads {
    pub fn dw(&self) -> &Matrix {
        &self.dw
    }

    pub fn db(&self) -> &Matrix {
        &self.db
    }
}

/// The gradients of every layer, ordered from input to output.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    layers: Vec<LayerGrads>,
}

impl Gradients {
    pub fn layers(&self) -> &[LayerGrads] {
        &self.layers
    }

    /// Iterates every gradient matrix, `dw` then `db` for each layer in order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Matrix> {
        self.layers
            .iter_mut()
            .flat_map(|LayerGrads { dw, db }| [dw, db])
    }
}

impl ForwardPass<'_> {
    /// Backpropagates the cost of this pass against the labels `y`.
    ///
    /// Every intermediate delta is dropped as soon as the next one is computed, so at most
    /// two of them are alive at once.
    ///
    /// # Arguments
    /// * `y` - The one-hot labels of the batch, `output_width x batch_size`.
    /// * `loss_fn` - The loss whose gradient starts the pass.
    ///
    /// # Returns
    /// The gradients of every layer or a shape mismatch.
    pub fn backward<L: LossFn>(&self, y: MatrixView, loss_fn: &L) -> Result<Gradients> {
        let layers = self.params.layers();
        let (Some(last), Some(last_cache)) = (layers.last(), self.caches.last()) else {
            return Err(MlErr::InvalidLayerDims(Vec::new()));
        };

        let inv_m = 1.0 / self.batch_size() as f64;
        let da = loss_fn.loss_prime(self.output(), y)?;
        let mut dz = last.act_fn.df(da, &last_cache.z)?;

        let mut grads = Vec::with_capacity(layers.len());

        for (l, layer) in layers.iter().enumerate().rev() {
            let dw = matrix::multiply_transpose_b(&dz, self.input(l), inv_m)?;
            let db = matrix::scale(&matrix::row_sums(&dz)?, inv_m)?;
            grads.push(LayerGrads { dw, db });

            if l > 0 {
                let da = matrix::transpose_multiply(&layer.w, &dz)?;
                dz = layers[l - 1].act_fn.df(da, &self.caches[l - 1].z)?;
            }
        }

        grads.reverse();
        trace!("backward pass over {} samples", self.batch_size());

        Ok(Gradients { layers: grads })
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::{NetworkParams, loss::CrossEntropy};

    fn cost(params: &NetworkParams, x: &Matrix, y: &Matrix) -> f64 {
        let pass = ForwardPass::run(params, x.view()).unwrap();
        CrossEntropy.loss(pass.output(), y.view()).unwrap()
    }

    fn nudge(params: &mut NetworkParams, l: usize, which: usize, i: usize, delta: f64) {
        let layer = &mut params.layers_mut()[l];
        let m = if which == 0 { &mut layer.w } else { &mut layer.b };
        m.as_mut_slice()[i] += delta;
    }

    fn batch(rng: &mut StdRng, features: usize, classes: usize, m: usize) -> (Matrix, Matrix) {
        let x = (0..features * m).map(|_| rng.random_range(-1.0..1.0)).collect();
        let x = Matrix::from_vec(features, m, x).unwrap();

        let mut y = Matrix::zeros(classes, m).unwrap();
        for j in 0..m {
            *y.get_mut(rng.random_range(0..classes), j).unwrap() = 1.;
        }

        (x, y)
    }

    #[test]
    fn gradients_have_the_parameter_shapes() {
        let params = NetworkParams::he(&[3, 5, 4, 2], 9).unwrap();
        let (x, y) = batch(&mut StdRng::seed_from_u64(0), 3, 2, 7);

        let grads = ForwardPass::run(&params, x.view())
            .unwrap()
            .backward(y.view(), &CrossEntropy)
            .unwrap();

        assert_eq!(grads.layers().len(), 3);
        for (g, p) in grads.layers().iter().zip(params.layers()) {
            assert_eq!(g.dw().shape(), p.w().shape());
            assert_eq!(g.db().shape(), p.b().shape());
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        const EPS: f64 = 1e-6;

        let mut rng = StdRng::seed_from_u64(11);
        let mut params = NetworkParams::he(&[3, 4, 3], 5).unwrap();
        for layer in params.layers_mut() {
            for b in layer.b.as_mut_slice() {
                *b = rng.random_range(-0.1..0.1);
            }
        }
        let (x, y) = batch(&mut rng, 3, 3, 5);

        let mut grads = ForwardPass::run(&params, x.view())
            .unwrap()
            .backward(y.view(), &CrossEntropy)
            .unwrap();
        let analytic: Vec<f64> = grads
            .iter_mut()
            .flat_map(|g| g.as_slice().to_vec())
            .collect();

        let mut numeric = Vec::with_capacity(analytic.len());
        for l in 0..params.num_layers() {
            for which in 0..2 {
                let len = match which {
                    0 => params.layers()[l].w.as_slice().len(),
                    _ => params.layers()[l].b.as_slice().len(),
                };

                for i in 0..len {
                    nudge(&mut params, l, which, i, EPS);
                    let plus = cost(&params, &x, &y);
                    nudge(&mut params, l, which, i, -2. * EPS);
                    let minus = cost(&params, &x, &y);
                    nudge(&mut params, l, which, i, EPS);

                    numeric.push((plus - minus) / (2. * EPS));
                }
            }
        }

        let norm = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>().sqrt();
        let diff: Vec<f64> = analytic.iter().zip(&numeric).map(|(a, n)| a - n).collect();
        let rel = norm(&diff) / (norm(&analytic) + norm(&numeric));

        assert!(rel < 1e-4, "relative error {rel}");
    }
}
