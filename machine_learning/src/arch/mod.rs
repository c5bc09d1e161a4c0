pub mod activations;
mod backward;
mod forward;
mod init;
pub mod loss;
mod params;

pub use backward::{Gradients, LayerGrads};
pub use forward::{ForwardPass, LayerCache};
pub use init::HeNormal;
pub use params::{LayerParams, NetworkParams};
