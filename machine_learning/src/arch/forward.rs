use log::trace;

use super::NetworkParams;
use crate::{
    MlErr, Result,
    matrix::{self, Matrix, MatrixView},
};

/// What a layer's forward step leaves behind for the backward pass.
#[derive(Debug)]
pub struct LayerCache {
    pub(crate) z: Matrix,
    pub(crate) a: Matrix,
}

impl LayerCache {
    /// The pre-activation.
    pub fn z(&self) -> &Matrix {
        &self.z
    }

    /// The post-activation.
    pub fn a(&self) -> &Matrix {
        &self.a
    }
}

/// The record of one forward pass over a batch.
///
/// It borrows the batch and the parameters, so the parameters can't be updated until the
/// record is dropped, which releases every cached matrix.
#[derive(Debug)]
pub struct ForwardPass<'a> {
    pub(crate) x: MatrixView<'a>,
    pub(crate) params: &'a NetworkParams,
    pub(crate) caches: Vec<LayerCache>,
}

impl<'a> ForwardPass<'a> {
    /// Runs the batch through every layer.
    ///
    /// # Arguments
    /// * `params` - The network's parameters.
    /// * `x` - The input batch, `input_width x batch_size`.
    ///
    /// # Returns
    /// The forward record or a shape mismatch.
    pub fn run(params: &'a NetworkParams, x: MatrixView<'a>) -> Result<Self> {
        if x.rows() != params.input_width() {
            return Err(MlErr::ShapeMismatch {
                op: "forward",
                left: (params.input_width(), x.cols()),
                right: x.shape(),
            });
        }

        let mut caches: Vec<LayerCache> = Vec::with_capacity(params.num_layers());

        for layer in params.layers() {
            let input = caches.last().map_or(x.reborrow(), |cache| cache.a.view());
            let z = matrix::fused_linear(&layer.w, input, &layer.b)?;
            let a = layer.act_fn.f(&z)?;
            caches.push(LayerCache { z, a });
        }

        trace!("forward pass over {} samples", x.cols());
        Ok(Self { x, params, caches })
    }

    /// The network's output `AL`, one probability distribution per column.
    pub fn output(&self) -> MatrixView<'_> {
        self.caches
            .last()
            .map_or(self.x.reborrow(), |cache| cache.a.view())
    }

    /// The input that fed layer `l`: the batch itself for the first layer, the previous
    /// layer's activation otherwise.
    pub fn input(&self, l: usize) -> MatrixView<'_> {
        match l {
            0 => self.x.reborrow(),
            _ => self.caches[l - 1].a.view(),
        }
    }

    pub fn caches(&self) -> &[LayerCache] {
        &self.caches
    }

    pub fn batch_size(&self) -> usize {
        self.x.cols()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn tiny() -> NetworkParams {
        NetworkParams::from_matrices(vec![
            (
                Matrix::from_rows(&[[1., -1.], [0.5, 0.5]]).unwrap(),
                Matrix::from_rows(&[[0.], [-1.]]).unwrap(),
            ),
            (
                Matrix::from_rows(&[[1., 0.], [0., 1.]]).unwrap(),
                Matrix::from_rows(&[[0.], [0.]]).unwrap(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn caches_every_layer() {
        let params = tiny();
        let x = Matrix::from_rows(&[[2., 1.], [1., 3.]]).unwrap();

        let pass = ForwardPass::run(&params, x.view()).unwrap();
        assert_eq!(pass.caches().len(), 2);
        assert_eq!(pass.batch_size(), 2);

        let hidden = &pass.caches()[0];
        assert_eq!(hidden.z().as_slice(), &[1., -2., 0.5, 1.]);
        assert_eq!(hidden.a().as_slice(), &[1., 0., 0.5, 1.]);
        assert_eq!(pass.input(1).to_owned().unwrap(), *hidden.a());
        assert_eq!(pass.input(0).to_owned().unwrap(), x);

        let out = pass.output();
        let e = 0.5f64.exp();
        assert_abs_diff_eq!(out.get(0, 0).unwrap(), e / (e + 1.), epsilon = 1e-12);
        assert_abs_diff_eq!(out.get(0, 1).unwrap(), 1. / (1. + 1f64.exp()), epsilon = 1e-12);
    }

    #[test]
    fn rejects_inputs_of_the_wrong_width() {
        let params = tiny();
        let x = Matrix::zeros(3, 2).unwrap();
        assert!(matches!(
            ForwardPass::run(&params, x.view()),
            Err(MlErr::ShapeMismatch {
                op: "forward",
                left: (2, 2),
                right: (3, 2),
            })
        ));
    }
}
