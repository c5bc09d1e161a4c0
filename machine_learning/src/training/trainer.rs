use std::{
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use comms::Collective;
use log::{debug, info};

use super::{
    BatchBuffer, EpochPlan, GradSync, IterationReport, TrainMetrics, TrainObserver,
    TrainSummary, accuracy::count_correct,
};
use crate::{
    MlErr, Result,
    arch::{
        ForwardPass, NetworkParams,
        loss::{CrossEntropy, LossFn},
    },
    dataset::{Dataset, TrainData},
    matrix::MatrixView,
    optimization::{GradientDescent, Optimizer},
};

/// The hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Layer widths: input, hidden layers and output.
    pub layer_dims: Vec<usize>,
    pub learning_rate: f64,
    pub iterations: usize,
    /// Evaluate every this many iterations, `0` only evaluates at the end.
    pub print_every: usize,
    /// The batch size across the whole group, `None` trains on the full shard every iteration.
    pub batch_size: Option<NonZeroUsize>,
    pub threads: NonZeroUsize,
    /// Seeds the weight initialization, the same on every member.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            layer_dims: Vec::new(),
            learning_rate: 0.01,
            iterations: 100,
            print_every: 10,
            batch_size: None,
            threads: NonZeroUsize::MIN,
            seed: 42,
        }
    }
}

impl TrainConfig {
    /// Whether `iteration` (0-indexed) ends with an evaluation.
    ///
    /// Only depends on the iteration index, so every member evaluates on the same ones.
    pub fn evaluates_at(&self, iteration: usize) -> bool {
        let periodic = self.print_every > 0 && iteration % self.print_every == 0;
        periodic || iteration + 1 == self.iterations
    }
}

/// Where the scheduler is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Training { iteration: usize, batch: usize },
    Evaluating,
    Done,
}

/// Everything a training run accumulates besides the parameters.
#[derive(Debug, Clone)]
pub struct TrainContext {
    phase: Phase,
    rank: usize,
    group_size: usize,
    metrics: TrainMetrics,
    history: Vec<IterationReport>,
    elapsed: Duration,
}

impl TrainContext {
    fn new(rank: usize, group_size: usize) -> Self {
        Self {
            phase: Phase::Initializing,
            rank,
            group_size,
            metrics: TrainMetrics::default(),
            history: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn metrics(&self) -> &TrainMetrics {
        &self.metrics
    }

    /// One report per finished iteration.
    pub fn history(&self) -> &[IterationReport] {
        &self.history
    }

    /// Wall-clock time of the training loop, evaluations included.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// The result of `train_model`.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub params: NetworkParams,
    pub context: TrainContext,
    pub summary: TrainSummary,
}

/// Drives the iteration loop of a single group member.
pub struct Trainer<'d, C, O, L>
where
    C: Collective,
    O: Optimizer,
    L: LossFn,
{
    data: &'d TrainData,
    config: &'d TrainConfig,
    sync: GradSync<C>,
    optimizer: O,
    loss_fn: L,
    ctx: TrainContext,
}

impl<'d, C, O, L> Trainer<'d, C, O, L>
where
    C: Collective,
    O: Optimizer,
    L: LossFn,
{
    /// Creates a new `Trainer`.
    ///
    /// # Arguments
    /// * `data` - This member's train and test shards.
    /// * `config` - The hyperparameters, identical on every member.
    /// * `group` - The group this member belongs to.
    /// * `optimizer` - The update rule.
    /// * `loss_fn` - The cost being minimized.
    pub fn new(
        data: &'d TrainData,
        config: &'d TrainConfig,
        group: C,
        optimizer: O,
        loss_fn: L,
    ) -> Self {
        let ctx = TrainContext::new(group.rank(), group.size());

        Self {
            data,
            config,
            sync: GradSync::new(group),
            optimizer,
            loss_fn,
            ctx,
        }
    }

    /// Trains a freshly initialized network for `config.iterations` iterations.
    ///
    /// # Arguments
    /// * `observer` - Receives a report after every iteration and a summary at the end.
    ///
    /// # Returns
    /// The trained parameters with the run's context, or the first error found. Errors
    /// caused by the data layout are detected identically on every member.
    pub fn run<B: TrainObserver>(mut self, observer: &mut B) -> Result<TrainOutcome> {
        let (data, config) = (self.data, self.config);
        let TrainData { train, test } = data;

        let mut params = NetworkParams::he(&config.layer_dims, config.seed)?;

        // A member with unusable data still joins the count exchange, so nobody is left
        // waiting on it.
        let widths = check_widths(&params, train).and_then(|_| check_widths(&params, test));
        let usable = if widths.is_ok() { train.len() } else { 0 };
        let plan = self.plan(usable);
        widths?;
        let plan = plan?;
        let mut buffer = if plan.is_full_batch() {
            BatchBuffer::default()
        } else {
            BatchBuffer::for_dataset(train, plan.batch_size())?
        };

        if self.ctx.rank == 0 {
            info!(
                "training {:?} on {} processes: {} iterations, {} batches of {} per iteration",
                config.layer_dims,
                self.ctx.group_size,
                config.iterations,
                plan.num_batches(),
                plan.batch_size(),
            );
        }

        let start = Instant::now();

        for iteration in 0..config.iterations {
            let mut cost_sum = 0.0;

            for (batch, range) in plan.batches().enumerate() {
                self.ctx.phase = Phase::Training { iteration, batch };
                debug!(iteration = iteration, batch = batch; "columns {range:?}");

                let (x, y) = if plan.is_full_batch() {
                    (train.x().view(), train.y().view())
                } else {
                    buffer.load(train, range)?
                };

                cost_sum += self.step(&mut params, x, y)?;
            }

            let cost = cost_sum / plan.num_batches() as f64;

            let (train_accuracy, test_accuracy) = if config.evaluates_at(iteration) {
                let (train_acc, test_acc) = self.evaluate(&params)?;
                (Some(train_acc), Some(test_acc))
            } else {
                (None, None)
            };

            let report = IterationReport {
                iteration,
                cost,
                train_accuracy,
                test_accuracy,
                elapsed: start.elapsed(),
            };

            observer.on_iteration(&report);
            self.ctx.history.push(report);
        }

        let (train_accuracy, test_accuracy) = match self.ctx.history.last() {
            Some(IterationReport {
                train_accuracy: Some(train_acc),
                test_accuracy: Some(test_acc),
                ..
            }) => (*train_acc, *test_acc),
            _ => self.evaluate(&params)?,
        };

        self.ctx.elapsed = start.elapsed();
        self.ctx.phase = Phase::Done;

        let summary = TrainSummary {
            iterations: config.iterations,
            final_cost: self.ctx.history.last().map(|r| r.cost),
            train_accuracy,
            test_accuracy,
            elapsed: self.ctx.elapsed,
            metrics: self.ctx.metrics.clone(),
        };

        if self.ctx.rank == 0 {
            info!(
                "training finished in {:.3}s: train accuracy {train_accuracy:.2}%, test accuracy {test_accuracy:.2}%",
                self.ctx.elapsed.as_secs_f64()
            );
        }

        observer.on_finish(&summary);

        Ok(TrainOutcome {
            params,
            context: self.ctx,
            summary,
        })
    }

    /// Splits the global batch size across the group and checks every member would run
    /// the same amount of batches per iteration.
    fn plan(&mut self, samples: usize) -> Result<EpochPlan> {
        let group = self.sync.size();

        let local_batch = match self.config.batch_size {
            Some(global) => {
                let local = NonZeroUsize::new(global.get() / group).ok_or(
                    MlErr::InvalidBatchSize {
                        global: global.get(),
                        group,
                    },
                )?;
                Some(local)
            }
            None => None,
        };

        let counts = self.sync.gather_counts(samples)?;
        if counts.contains(&0) {
            return Err(MlErr::EmptyDataset);
        }

        let plan = EpochPlan::new(samples, local_batch);
        for count in counts {
            let other = EpochPlan::new(count, local_batch).num_batches();
            if other != plan.num_batches() {
                return Err(MlErr::UnevenBatches {
                    local: plan.num_batches(),
                    other,
                });
            }
        }

        Ok(plan)
    }

    /// Forward, cost, backward, sync and update over a single batch.
    ///
    /// # Returns
    /// The batch's group-wide cost.
    fn step(&mut self, params: &mut NetworkParams, x: MatrixView, y: MatrixView) -> Result<f64> {
        let Self {
            sync,
            optimizer,
            loss_fn,
            ctx,
            ..
        } = self;
        let metrics = &mut ctx.metrics;
        let current: &NetworkParams = params;

        let pass = metrics.forward.time(|| ForwardPass::run(current, x.reborrow()))?;
        let cost = metrics.cost.time(|| loss_fn.loss(pass.output(), y))?;
        let mut grads = metrics.backward.time(|| pass.backward(y, loss_fn))?;
        drop(pass);

        let cost = metrics.sync.time(|| -> Result<f64> {
            sync.sync_gradients(&mut grads)?;
            sync.sync_cost(cost)
        })?;

        metrics
            .update
            .time(|| optimizer.update_params(params, &grads))?;
        metrics.add_batch(x.cols());

        Ok(cost)
    }

    /// Group-wide train and test accuracies.
    fn evaluate(&mut self, params: &NetworkParams) -> Result<(f64, f64)> {
        let data = self.data;
        let TrainData { train, test } = data;
        let previous = self.ctx.phase;
        self.ctx.phase = Phase::Evaluating;

        let Self { sync, ctx, .. } = self;
        let accuracies = ctx.metrics.accuracy.time(|| -> Result<(f64, f64)> {
            let (correct, total) = count_correct(params, train.x().view(), train.y().view())?;
            let train_acc = sync.sync_accuracy(correct, total)?;

            let (correct, total) = count_correct(params, test.x().view(), test.y().view())?;
            let test_acc = sync.sync_accuracy(correct, total)?;

            Ok((train_acc, test_acc))
        })?;

        self.ctx.phase = previous;
        Ok(accuracies)
    }
}

fn check_widths(params: &NetworkParams, data: &Dataset) -> Result<()> {
    if data.features() != params.input_width() || data.classes() != params.output_width() {
        return Err(MlErr::ShapeMismatch {
            op: "dataset widths",
            left: (params.input_width(), params.output_width()),
            right: (data.features(), data.classes()),
        });
    }

    Ok(())
}

/// Trains a network on this process's shard, cooperating with the rest of `group`.
///
/// The loop runs inside a dedicated pool of `config.threads` threads which the matrix
/// kernels split their work across.
///
/// # Arguments
/// * `data` - This process's train and test shards.
/// * `config` - The hyperparameters, identical on every member.
/// * `group` - The group this process belongs to, a `SoloGroup` to train alone.
/// * `observer` - Receives the scheduler's checkpoints.
///
/// # Returns
/// The trained parameters and the run's context.
pub fn train_model<C, B>(
    data: &TrainData,
    config: &TrainConfig,
    group: C,
    observer: &mut B,
) -> Result<TrainOutcome>
where
    C: Collective + Send,
    B: TrainObserver + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.get())
        .build()
        .map_err(|e| MlErr::ThreadPool(e.to_string()))?;

    let learning_rate = config.learning_rate;
    pool.install(move || {
        Trainer::new(
            data,
            config,
            group,
            GradientDescent::new(learning_rate),
            CrossEntropy::new(),
        )
        .run(observer)
    })
}
