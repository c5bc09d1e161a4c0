mod accuracy;
mod batch;
mod metrics;
mod observer;
mod sync;
mod trainer;

pub use accuracy::{compute_accuracy, count_correct};
pub use batch::{BatchBuffer, EpochPlan};
pub use metrics::{PhaseTimer, TrainMetrics};
pub use observer::{IterationReport, TrainObserver, TrainSummary};
pub use sync::GradSync;
pub use trainer::{Phase, TrainConfig, TrainContext, TrainOutcome, Trainer, train_model};
