use std::{fs::OpenOptions, path::Path, time::Duration};

use log::info;
use machine_learning::training::{IterationReport, TrainObserver, TrainSummary};

/// Logs progress and the final timing table, on rank 0 only.
#[derive(Debug, Clone, Copy)]
pub struct ProgressReporter {
    rank: usize,
}

impl ProgressReporter {
    pub fn new(rank: usize) -> Self {
        Self { rank }
    }
}

impl TrainObserver for ProgressReporter {
    fn on_iteration(&mut self, report: &IterationReport) {
        if self.rank != 0 {
            return;
        }

        if let (Some(train), Some(test)) = (report.train_accuracy, report.test_accuracy) {
            info!(
                "iteration {:>5}: cost {:.6}, train accuracy {train:.2}%, test accuracy {test:.2}% ({:.2}s)",
                report.iteration,
                report.cost,
                report.elapsed.as_secs_f64()
            );
        }
    }

    fn on_finish(&mut self, summary: &TrainSummary) {
        if self.rank == 0 {
            for line in timing_table(summary).lines() {
                info!("{line}");
            }
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

/// Renders the per-phase timings of a run.
pub fn timing_table(summary: &TrainSummary) -> String {
    let metrics = &summary.metrics;
    let total = summary.elapsed.as_secs_f64();

    let mut table = format!(
        "{:<10} {:>12} {:>10} {:>12} {:>8}\n",
        "phase", "total (ms)", "calls", "avg (ms)", "share"
    );

    for (name, timer) in metrics.phases() {
        let share = if total > 0.0 {
            100.0 * timer.total.as_secs_f64() / total
        } else {
            0.0
        };
        table.push_str(&format!(
            "{name:<10} {:>12.3} {:>10} {:>12.3} {:>7.1}%\n",
            ms(timer.total),
            timer.count,
            ms(timer.average()),
            share
        ));
    }

    table.push_str(&format!(
        "{} batches, {} samples in {total:.3}s",
        metrics.batches, metrics.samples
    ));
    table
}

/// The settings of a run that end up in the results file next to its outcome.
#[derive(Debug, Clone, Copy)]
pub struct RunRecord<'a> {
    pub world_size: usize,
    pub threads: usize,
    pub num_samples: usize,
    pub learning_rate: f64,
    pub summary: &'a TrainSummary,
}

const PHASES: [&str; 6] = ["forward", "cost", "backward", "sync", "update", "accuracy"];

fn header() -> Vec<String> {
    let mut header: Vec<String> = [
        "world_size",
        "threads",
        "num_samples",
        "num_iterations",
        "learning_rate",
        "train_accuracy",
        "test_accuracy",
        "total_time_sec",
    ]
    .map(String::from)
    .into();

    header.extend(PHASES.map(|p| format!("{p}_time_ms")));
    header.extend(PHASES.map(|p| format!("avg_{p}_ms")));
    header
}

impl RunRecord<'_> {
    fn fields(&self) -> Vec<String> {
        let summary = self.summary;
        let phases = summary.metrics.phases();

        let mut fields = vec![
            self.world_size.to_string(),
            self.threads.to_string(),
            self.num_samples.to_string(),
            summary.iterations.to_string(),
            self.learning_rate.to_string(),
            format!("{:.2}", summary.train_accuracy),
            format!("{:.2}", summary.test_accuracy),
            format!("{:.3}", summary.elapsed.as_secs_f64()),
        ];

        fields.extend(phases.iter().map(|(_, t)| format!("{:.3}", ms(t.total))));
        fields.extend(phases.iter().map(|(_, t)| format!("{:.3}", ms(t.average()))));
        fields
    }

    /// Appends the record to `path`, writing the header first when the file is new or empty.
    pub fn append_to(&self, path: &Path) -> anyhow::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(header())?;
        }
        writer.write_record(self.fields())?;
        writer.flush()?;

        info!("results appended to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use machine_learning::training::TrainMetrics;

    use super::*;

    fn summary() -> TrainSummary {
        let mut metrics = TrainMetrics::default();
        metrics.forward.record(Duration::from_millis(4));
        metrics.forward.record(Duration::from_millis(6));
        metrics.add_batch(32);

        TrainSummary {
            iterations: 10,
            final_cost: Some(0.5),
            train_accuracy: 87.5,
            test_accuracy: 80.0,
            elapsed: Duration::from_millis(1500),
            metrics,
        }
    }

    #[test]
    fn header_matches_fields() {
        let summary = summary();
        let record = RunRecord {
            world_size: 2,
            threads: 4,
            num_samples: 1000,
            learning_rate: 0.01,
            summary: &summary,
        };

        let fields = record.fields();
        assert_eq!(header().len(), fields.len());
        assert_eq!(header()[8], "forward_time_ms");
        assert_eq!(header()[14], "avg_forward_ms");
        assert_eq!(&fields[..8], ["2", "4", "1000", "10", "0.01", "87.50", "80.00", "1.500"]);
        assert_eq!(fields[8], "10.000");
        assert_eq!(fields[14], "5.000");
    }

    #[test]
    fn header_is_written_once() {
        let path = std::env::temp_dir().join(format!("results-{}.csv", std::process::id()));
        let _ = fs::remove_file(&path);

        let summary = summary();
        let record = RunRecord {
            world_size: 1,
            threads: 1,
            num_samples: 100,
            learning_rate: 0.1,
            summary: &summary,
        };
        record.append_to(&path).unwrap();
        record.append_to(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("world_size,threads,num_samples"));
        assert_eq!(lines[1], lines[2]);
    }

    #[test]
    fn timing_table_lists_every_phase() {
        let table = timing_table(&summary());

        for phase in PHASES {
            assert!(table.contains(phase));
        }
        assert!(table.ends_with("1 batches, 32 samples in 1.500s"));
    }
}
