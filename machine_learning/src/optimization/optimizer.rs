use crate::{
    Result,
    arch::{Gradients, NetworkParams},
};

pub trait Optimizer {
    /// Applies one step to `params` using the already synchronized `grads`.
    fn update_params(&mut self, params: &mut NetworkParams, grads: &Gradients) -> Result<()>;
}
