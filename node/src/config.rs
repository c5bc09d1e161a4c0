use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail, ensure};
use machine_learning::TrainConfig;
use serde::Deserialize;

use crate::data::DatasetSource;

fn default_print_every() -> usize {
    1
}

fn default_threads() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

/// A node's configuration, read from a JSON file. Every member of a group must use the
/// same one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Layer widths: input, hidden layers and output.
    pub layer_dims: Vec<usize>,
    pub learning_rate: f64,
    pub iterations: usize,
    #[serde(default = "default_print_every")]
    pub print_every: usize,
    /// The batch size across the whole group, omitted for full-batch training.
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub dataset: DatasetSource,
    /// Where rank 0 appends a row with the run's results.
    #[serde(default)]
    pub results_csv: Option<PathBuf>,
}

impl NodeConfig {
    /// Reads and parses a configuration file.
    ///
    /// # Arguments
    /// * `path` - The JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display()))?;

        Self::from_json(&content).with_context(|| format!("invalid config '{}'", path.display()))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Checks the constraints the training core relies on but never verifies itself.
    ///
    /// # Arguments
    /// * `world_size` - The amount of processes in the group.
    /// * `features` - The feature count of the loaded dataset.
    /// * `classes` - The class count of the loaded dataset.
    pub fn validate(&self, world_size: usize, features: usize, classes: usize) -> anyhow::Result<()> {
        let dims = &self.layer_dims;

        ensure!(dims.len() >= 2, "layer_dims needs at least an input and an output width");
        ensure!(!dims.contains(&0), "layer widths must be positive, got {dims:?}");
        ensure!(
            dims[0] == features,
            "the input width is {} but the dataset has {features} features",
            dims[0]
        );
        ensure!(
            dims[dims.len() - 1] == classes,
            "the output width is {} but the dataset has {classes} classes",
            dims[dims.len() - 1]
        );

        ensure!(
            self.learning_rate.is_finite() && self.learning_rate > 0.0,
            "learning_rate must be positive, got {}",
            self.learning_rate
        );
        ensure!(self.threads >= 1, "threads must be at least 1");
        ensure!(world_size >= 1, "the group needs at least one member");

        if let Some(batch_size) = self.batch_size {
            ensure!(batch_size > 0, "batch_size must be positive");
            if batch_size % world_size != 0 {
                bail!("batch_size {batch_size} is not divisible by the world size {world_size}");
            }
        }

        let split = self.dataset.split_sizes(classes);
        ensure!(
            split.train_per_class > 0 && split.test_per_class > 0,
            "{} samples leave no train or test samples for some of the {classes} classes",
            self.dataset.samples()
        );
        ensure!(
            split.train_per_class % world_size == 0 && split.test_per_class % world_size == 0,
            "{} train and {} test samples per class can't be split evenly across {world_size} processes",
            split.train_per_class,
            split.test_per_class
        );

        Ok(())
    }

    /// The hyperparameters handed to the training core.
    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            layer_dims: self.layer_dims.clone(),
            learning_rate: self.learning_rate,
            iterations: self.iterations,
            print_every: self.print_every,
            batch_size: self.batch_size.and_then(NonZeroUsize::new),
            threads: NonZeroUsize::new(self.threads).unwrap_or(NonZeroUsize::MIN),
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOBS: &str = r#"{
        "layer_dims": [4, 8, 2],
        "learning_rate": 0.05,
        "iterations": 20,
        "batch_size": 8,
        "dataset": { "kind": "blobs", "samples": 200, "features": 4, "classes": 2 }
    }"#;

    #[test]
    fn defaults_are_filled_in() {
        let config = NodeConfig::from_json(BLOBS).unwrap();

        assert_eq!(config.print_every, 1);
        assert_eq!(config.threads, 1);
        assert_eq!(config.seed, 42);
        assert_eq!(config.results_csv, None);

        let train = config.train_config();
        assert_eq!(train.batch_size, NonZeroUsize::new(8));
        assert_eq!(train.layer_dims, vec![4, 8, 2]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = BLOBS.replace("\"iterations\"", "\"epochs\": 3, \"iterations\"");
        assert!(NodeConfig::from_json(&json).is_err());
    }

    #[test]
    fn validation_checks_widths_and_divisibility() {
        let config = NodeConfig::from_json(BLOBS).unwrap();

        // 180 train and 20 test samples: 90 and 10 per class.
        assert!(config.validate(1, 4, 2).is_ok());
        assert!(config.validate(2, 4, 2).is_ok());
        assert!(config.validate(3, 4, 2).is_err());
        assert!(config.validate(1, 5, 2).is_err());
        assert!(config.validate(1, 4, 3).is_err());

        let mut odd_batch = config.clone();
        odd_batch.batch_size = Some(7);
        assert!(odd_batch.validate(2, 4, 2).is_err());

        let mut no_threads = config;
        no_threads.threads = 0;
        assert!(no_threads.validate(1, 4, 2).is_err());
    }
}
