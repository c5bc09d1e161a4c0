//! Dataset sources and their preparation into per-rank train and test shards.

mod blobs;
mod cifar10;
mod shard;
mod split;

use std::path::PathBuf;

use machine_learning::dataset::TrainData;
use serde::Deserialize;

pub use blobs::Blobs;
pub use cifar10::{CLASS_NAMES, Cifar10};
pub use shard::shard_range;
pub use split::{SplitSizes, split_for_rank};

/// A labeled set of samples stored in appearance order.
pub trait LabeledSamples {
    /// The amount of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The amount of features every sample has.
    fn features(&self) -> usize;

    /// The amount of classes labels are drawn from.
    fn classes(&self) -> usize;

    /// The class of sample `index`, in `0..classes()`.
    fn label(&self, index: usize) -> usize;

    /// The value of `feature` for sample `index`, normalized to `[0, 1]`.
    fn value(&self, index: usize, feature: usize) -> f64;
}

fn default_spread() -> f64 {
    0.1
}

fn default_blobs_seed() -> u64 {
    7
}

/// Where a node's samples come from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum DatasetSource {
    /// The CIFAR-10 binary batches found in `dir`.
    Cifar10 { dir: PathBuf, samples: usize },
    /// Gaussian clusters around random centres, one per class.
    Blobs {
        samples: usize,
        features: usize,
        classes: usize,
        #[serde(default = "default_spread")]
        spread: f64,
        #[serde(default = "default_blobs_seed")]
        seed: u64,
    },
}

impl DatasetSource {
    /// The amount of samples split into train and test sets, before sharding.
    pub fn samples(&self) -> usize {
        match self {
            Self::Cifar10 { samples, .. } | Self::Blobs { samples, .. } => *samples,
        }
    }

    /// Returns `(features, classes)` without loading anything.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Cifar10 { .. } => (cifar10::IMAGE_BYTES, cifar10::CLASSES),
            Self::Blobs {
                features, classes, ..
            } => (*features, *classes),
        }
    }

    pub fn split_sizes(&self, classes: usize) -> SplitSizes {
        SplitSizes::new(self.samples(), classes)
    }

    /// Loads or generates every sample of the source.
    pub fn load(&self) -> anyhow::Result<Box<dyn LabeledSamples>> {
        let samples: Box<dyn LabeledSamples> = match self {
            Self::Cifar10 { dir, .. } => Box::new(Cifar10::load(dir)?),
            Self::Blobs {
                samples,
                features,
                classes,
                spread,
                seed,
            } => Box::new(Blobs::generate(
                *samples, *features, *classes, *spread, *seed,
            )?),
        };

        Ok(samples)
    }

    /// Loads the source and keeps `rank`'s share of the class-balanced split.
    ///
    /// # Arguments
    /// * `rank` - This process's index within the group.
    /// * `world_size` - The amount of processes in the group.
    pub fn prepare(&self, rank: usize, world_size: usize) -> anyhow::Result<TrainData> {
        let samples = self.load()?;
        let sizes = self.split_sizes(samples.classes());
        split_for_rank(samples.as_ref(), sizes, rank, world_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_parse_from_tagged_json() {
        let cifar: DatasetSource =
            serde_json::from_str(r#"{ "kind": "cifar10", "dir": "data", "samples": 1000 }"#)
                .unwrap();
        assert_eq!(cifar.shape(), (3072, 10));
        assert_eq!(cifar.samples(), 1000);

        let blobs: DatasetSource = serde_json::from_str(
            r#"{ "kind": "blobs", "samples": 50, "features": 3, "classes": 5 }"#,
        )
        .unwrap();
        assert_eq!(blobs.shape(), (3, 5));
        assert!(matches!(blobs, DatasetSource::Blobs { seed: 7, .. }));
    }
}
