use rand::{SeedableRng, distr::Distribution, rngs::StdRng};

use super::{activations::ActFn, init::HeNormal};
use crate::{
    MlErr, Result,
    matrix::Matrix,
};

/// The weights and biases of a single dense layer.
///
/// `w` is `out x in` and `b` is `out x 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParams {
    pub(crate) w: Matrix,
    pub(crate) b: Matrix,
    pub(crate) act_fn: ActFn,
}

impl LayerParams {
    pub fn w(&self) -> &Matrix {
        &self.w
    }

    pub fn b(&self) -> &Matrix {
        &self.b
    }

    pub fn act_fn(&self) -> ActFn {
        self.act_fn
    }

    /// The number of inputs of this layer.
    pub fn fan_in(&self) -> usize {
        self.w.cols()
    }

    /// The number of outputs of this layer.
    pub fn fan_out(&self) -> usize {
        self.w.rows()
    }
}

/// The parameters of the whole network, layer by layer.
///
/// Every hidden layer is followed by `ActFn::Relu` and the last one by `ActFn::Softmax`.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkParams {
    layers: Vec<LayerParams>,
}

fn validate_dims(dims: &[usize]) -> Result<()> {
    if dims.len() < 2 || dims.contains(&0) {
        return Err(MlErr::InvalidLayerDims(dims.to_vec()));
    }

    Ok(())
}

fn act_fn_for(l: usize, nlayers: usize) -> ActFn {
    if l + 1 == nlayers {
        ActFn::Softmax
    } else {
        ActFn::Relu
    }
}

impl NetworkParams {
    /// Initializes a network with He normal weights and zero biases.
    ///
    /// Weights are drawn layer after layer in row-major order from a single generator, so
    /// every process that uses the same seed gets bit-identical parameters.
    ///
    /// # Arguments
    /// * `dims` - The layer widths: input, hidden layers and output.
    /// * `seed` - The seed of the random number generator.
    ///
    /// # Returns
    /// The parameters or an error if the dims are invalid or the matrices can't be allocated.
    pub fn he(dims: &[usize], seed: u64) -> Result<Self> {
        validate_dims(dims)?;

        let mut rng = StdRng::seed_from_u64(seed);
        let nlayers = dims.len() - 1;
        let mut layers = Vec::with_capacity(nlayers);

        for (l, pair) in dims.windows(2).enumerate() {
            let (fan_in, fan_out) = (pair[0], pair[1]);

            let mut w = Matrix::zeros(fan_out, fan_in)?;
            let dist = HeNormal::new(fan_in);
            for (x, sample) in w.as_mut_slice().iter_mut().zip(dist.sample_iter(&mut rng)) {
                *x = sample;
            }

            layers.push(LayerParams {
                w,
                b: Matrix::zeros(fan_out, 1)?,
                act_fn: act_fn_for(l, nlayers),
            });
        }

        Ok(Self { layers })
    }

    /// Builds a network from explicit `(w, b)` pairs.
    ///
    /// # Arguments
    /// * `layers` - The weights and biases of every layer, from input to output.
    ///
    /// # Returns
    /// The parameters or an error if the shapes don't chain.
    pub fn from_matrices(layers: Vec<(Matrix, Matrix)>) -> Result<Self> {
        if layers.is_empty() {
            return Err(MlErr::InvalidLayerDims(Vec::new()));
        }

        let nlayers = layers.len();
        let mut prev_out = None;

        let layers = layers
            .into_iter()
            .enumerate()
            .map(|(l, (w, b))| {
                if b.shape() != (w.rows(), 1) {
                    return Err(MlErr::ShapeMismatch {
                        op: "layer bias",
                        left: w.shape(),
                        right: b.shape(),
                    });
                }

                if let Some(prev) = prev_out.filter(|&prev| prev != w.cols()) {
                    return Err(MlErr::ShapeMismatch {
                        op: "layer chain",
                        left: (prev, 1),
                        right: w.shape(),
                    });
                }

                prev_out = Some(w.rows());
                Ok(LayerParams {
                    w,
                    b,
                    act_fn: act_fn_for(l, nlayers),
                })
            })
            .collect::<Result<_>>()?;

        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[LayerParams] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [LayerParams] {
        &mut self.layers
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Returns the layer widths, input first.
    pub fn dims(&self) -> Vec<usize> {
        let mut dims = vec![self.input_width()];
        dims.extend(self.layers.iter().map(LayerParams::fan_out));
        dims
    }

    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, LayerParams::fan_in)
    }

    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, LayerParams::fan_out)
    }

    /// Returns the total amount of weights and biases.
    pub fn size(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.w.as_slice().len() + layer.b.as_slice().len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn he_builds_chained_layers() {
        let params = NetworkParams::he(&[4, 3, 2], 0).unwrap();

        assert_eq!(params.num_layers(), 2);
        assert_eq!(params.dims(), vec![4, 3, 2]);
        assert_eq!(params.layers()[0].w().shape(), (3, 4));
        assert_eq!(params.layers()[0].b().shape(), (3, 1));
        assert_eq!(params.layers()[1].w().shape(), (2, 3));
        assert_eq!(params.layers()[0].act_fn(), ActFn::Relu);
        assert_eq!(params.layers()[1].act_fn(), ActFn::Softmax);
        assert_eq!(params.size(), 3 * 4 + 3 + 2 * 3 + 2);

        assert!(params.layers().iter().all(|l| l.b().as_slice().iter().all(|&b| b == 0.)));
        assert!(params.layers()[0].w().as_slice().iter().any(|&w| w != 0.));
    }

    #[test]
    fn same_seed_gives_identical_replicas() {
        let a = NetworkParams::he(&[5, 8, 3], 1234).unwrap();
        let b = NetworkParams::he(&[5, 8, 3], 1234).unwrap();
        let c = NetworkParams::he(&[5, 8, 3], 1235).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn invalid_dims_are_rejected() {
        let cases: [&[usize]; 3] = [&[], &[3], &[3, 0, 2]];
        for dims in cases {
            assert!(matches!(
                NetworkParams::he(dims, 0),
                Err(MlErr::InvalidLayerDims(_))
            ));
        }
    }

    #[test]
    fn from_matrices_checks_the_chain() {
        let ok = NetworkParams::from_matrices(vec![
            (Matrix::zeros(3, 2).unwrap(), Matrix::zeros(3, 1).unwrap()),
            (Matrix::zeros(1, 3).unwrap(), Matrix::zeros(1, 1).unwrap()),
        ]);
        assert_eq!(ok.unwrap().dims(), vec![2, 3, 1]);

        let broken_chain = NetworkParams::from_matrices(vec![
            (Matrix::zeros(3, 2).unwrap(), Matrix::zeros(3, 1).unwrap()),
            (Matrix::zeros(1, 4).unwrap(), Matrix::zeros(1, 1).unwrap()),
        ]);
        assert!(broken_chain.is_err());

        let bad_bias = NetworkParams::from_matrices(vec![(
            Matrix::zeros(3, 2).unwrap(),
            Matrix::zeros(2, 1).unwrap(),
        )]);
        assert!(bad_bias.is_err());
    }
}
