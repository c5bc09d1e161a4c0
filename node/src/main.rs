use std::env;

use anyhow::Context;
use log::info;
use machine_learning::train_model;

use node::{
    config::NodeConfig,
    group::GroupEnv,
    report::{ProgressReporter, RunRecord},
};

const DEFAULT_CONFIG: &str = "config.json";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = NodeConfig::from_path(&path)?;
    let group_env = GroupEnv::from_env()?;
    let GroupEnv {
        rank, world_size, ..
    } = group_env;

    let (features, classes) = config.dataset.shape();
    config
        .validate(world_size, features, classes)
        .with_context(|| format!("invalid config '{path}'"))?;

    if rank == 0 {
        info!(
            "training {:?} with {world_size} processes of {} threads on {} samples",
            config.layer_dims,
            config.threads,
            config.dataset.samples()
        );
    }

    let data = config
        .dataset
        .prepare(rank, world_size)
        .context("cannot prepare the dataset")?;
    info!(
        "rank {rank} holds {} train and {} test samples",
        data.train.len(),
        data.test.len()
    );

    let group = group_env.join()?;
    let mut reporter = ProgressReporter::new(rank);
    let outcome = train_model(&data, &config.train_config(), group, &mut reporter)
        .context("training failed")?;

    let results_csv = config.results_csv.as_ref().filter(|_| rank == 0);
    if let Some(csv) = results_csv {
        RunRecord {
            world_size,
            threads: config.threads,
            num_samples: config.dataset.samples(),
            learning_rate: config.learning_rate,
            summary: &outcome.summary,
        }
        .append_to(csv)
        .with_context(|| format!("cannot write results to '{}'", csv.display()))?;
    }

    Ok(())
}
