use std::time::{Duration, Instant};

/// Accumulated wall-clock time of one phase of the training loop.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PhaseTimer {
    pub total: Duration,
    pub count: u64,
}

impl PhaseTimer {
    #[inline]
    pub fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.count += 1;
    }

    /// Runs `f` and records how long it took.
    #[inline]
    pub fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(start.elapsed());
        out
    }

    /// Mean time per recorded call, zero if nothing was recorded.
    pub fn average(&self) -> Duration {
        match self.count {
            0 => Duration::ZERO,
            n => Duration::from_nanos((self.total.as_nanos() / u128::from(n)) as u64),
        }
    }
}

/// Per-phase timings and throughput counters of a training run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrainMetrics {
    pub forward: PhaseTimer,
    pub cost: PhaseTimer,
    pub backward: PhaseTimer,
    pub sync: PhaseTimer,
    pub update: PhaseTimer,
    pub accuracy: PhaseTimer,

    pub batches: u64,
    pub samples: u64,
}

impl TrainMetrics {
    #[inline]
    pub fn add_batch(&mut self, samples: usize) {
        self.batches += 1;
        self.samples += samples as u64;
    }

    /// Every phase with its name, in loop order.
    pub fn phases(&self) -> [(&'static str, PhaseTimer); 6] {
        [
            ("forward", self.forward),
            ("cost", self.cost),
            ("backward", self.backward),
            ("sync", self.sync),
            ("update", self.update),
            ("accuracy", self.accuracy),
        ]
    }
}
