//! A fully-connected classifier trained with mini-batch gradient descent, data-parallel
//! across a `comms` group and thread-parallel inside every matrix kernel.

pub mod arch;
pub mod dataset;
pub mod error;
pub mod matrix;
pub mod optimization;
pub mod training;

pub use error::{MlErr, Result};
pub use training::{TrainConfig, TrainOutcome, compute_accuracy, train_model};
