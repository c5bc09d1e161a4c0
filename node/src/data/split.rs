use std::ops::Range;

use anyhow::bail;
use machine_learning::{
    dataset::{Dataset, TrainData},
    matrix::Matrix,
};

use super::{LabeledSamples, shard_range};

/// How `samples` are divided between the train and test sets: 90% train, 10% test, with
/// the same amount of samples of every class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSizes {
    pub train_per_class: usize,
    pub test_per_class: usize,
}

impl SplitSizes {
    pub fn new(samples: usize, classes: usize) -> Self {
        let train = samples - samples / 10;
        let test = samples - train;

        Self {
            train_per_class: train.checked_div(classes).unwrap_or(0),
            test_per_class: test.checked_div(classes).unwrap_or(0),
        }
    }
}

/// Distributes `samples` into class-balanced train and test sets and keeps `rank`'s share.
///
/// Samples are taken in appearance order: each goes to the train set while its class has
/// train quota left, then to the test set, then is skipped. Every rank keeps a contiguous
/// slice of each class's quota, so the shards of a group are disjoint and equally
/// balanced. Kept samples stay in appearance order.
///
/// # Arguments
/// * `samples` - The whole dataset, identical on every rank.
/// * `sizes` - The per-class quotas.
/// * `rank` - This process's index within the group.
/// * `world_size` - The amount of processes in the group.
///
/// # Returns
/// The rank's shards, or an error if some class runs out of samples before its quotas
/// are filled or the shard would be empty.
pub fn split_for_rank(
    samples: &dyn LabeledSamples,
    sizes: SplitSizes,
    rank: usize,
    world_size: usize,
) -> anyhow::Result<TrainData> {
    let classes = samples.classes();
    let train_share = shard_range(sizes.train_per_class, rank, world_size);
    let test_share = shard_range(sizes.test_per_class, rank, world_size);

    let mut train_seen = vec![0; classes];
    let mut test_seen = vec![0; classes];
    let (mut train, mut test) = (Vec::new(), Vec::new());

    for index in 0..samples.len() {
        let class = samples.label(index);

        let (seen, share, kept) = if train_seen[class] < sizes.train_per_class {
            (&mut train_seen[class], &train_share, &mut train)
        } else if test_seen[class] < sizes.test_per_class {
            (&mut test_seen[class], &test_share, &mut test)
        } else {
            continue;
        };

        if share.contains(&*seen) {
            kept.push(index);
        }
        *seen += 1;
    }

    for class in 0..classes {
        if train_seen[class] < sizes.train_per_class || test_seen[class] < sizes.test_per_class {
            bail!(
                "class {class} has {} samples, {} are needed",
                train_seen[class] + test_seen[class],
                sizes.train_per_class + sizes.test_per_class
            );
        }
    }

    Ok(TrainData::new(
        gather(samples, &train, train_share)?,
        gather(samples, &test, test_share)?,
    ))
}

/// Builds a features x samples matrix and its one-hot labels from the kept indices.
fn gather(
    samples: &dyn LabeledSamples,
    indices: &[usize],
    share: Range<usize>,
) -> anyhow::Result<Dataset> {
    let n = indices.len();
    if n == 0 {
        bail!("a quota share of {share:?} leaves this process without samples");
    }

    let (features, classes) = (samples.features(), samples.classes());
    let mut x = Matrix::zeros(features, n)?;
    let mut y = Matrix::zeros(classes, n)?;

    let values = x.as_mut_slice();
    for (col, &index) in indices.iter().enumerate() {
        for feature in 0..features {
            values[feature * n + col] = samples.value(index, feature);
        }
    }

    let labels = y.as_mut_slice();
    for (col, &index) in indices.iter().enumerate() {
        labels[samples.label(index) * n + col] = 1.0;
    }

    Ok(Dataset::new(x, y)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample `i` has label `labels[i]` and a single feature equal to `i`.
    struct Listed {
        labels: Vec<usize>,
    }

    impl LabeledSamples for Listed {
        fn len(&self) -> usize {
            self.labels.len()
        }

        fn features(&self) -> usize {
            1
        }

        fn classes(&self) -> usize {
            2
        }

        fn label(&self, index: usize) -> usize {
            self.labels[index]
        }

        fn value(&self, index: usize, _feature: usize) -> f64 {
            index as f64
        }
    }

    fn ids(data: &Dataset) -> Vec<usize> {
        data.x().as_slice().iter().map(|&v| v as usize).collect()
    }

    #[test]
    fn sizes_follow_the_ninety_ten_rule() {
        let sizes = SplitSizes::new(1000, 10);
        assert_eq!(sizes.train_per_class, 90);
        assert_eq!(sizes.test_per_class, 10);

        assert_eq!(SplitSizes::new(5, 0).train_per_class, 0);

        let huge = SplitSizes::new(usize::MAX, 1);
        assert_eq!(huge.test_per_class, usize::MAX / 10);
        assert_eq!(huge.train_per_class, usize::MAX - usize::MAX / 10);
    }

    #[test]
    fn quotas_are_filled_in_appearance_order() {
        // 20 samples: 9 train and 1 test per class.
        let samples = Listed {
            labels: (0..30).map(|i| usize::from(i % 3 == 0)).collect(),
        };
        let sizes = SplitSizes::new(20, 2);

        let data = split_for_rank(&samples, sizes, 0, 1).unwrap();

        let train = ids(&data.train);
        assert_eq!(train.len(), 18);
        assert!(train.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ids(&data.test), vec![14, 27]);

        assert_eq!(data.train.y().get(1, 0), Some(1.0));
        assert_eq!(data.train.y().get(0, 1), Some(1.0));
        assert_eq!(data.train.y().get(1, 1), Some(0.0));
    }

    #[test]
    fn ranks_get_disjoint_balanced_shares() {
        let samples = Listed {
            labels: (0..40).map(|i| i % 2).collect(),
        };
        let sizes = SplitSizes::new(40, 2);

        let first = split_for_rank(&samples, sizes, 0, 2).unwrap();
        let second = split_for_rank(&samples, sizes, 1, 2).unwrap();

        assert_eq!(first.train.len(), 18);
        assert_eq!(second.train.len(), 18);
        assert_eq!(first.test.len(), 2);
        assert_eq!(ids(&first.test), vec![36, 37]);
        assert_eq!(ids(&second.test), vec![38, 39]);

        let mut all = ids(&first.train);
        all.extend(ids(&second.train));
        all.sort_unstable();
        assert_eq!(all, (0..36).collect::<Vec<_>>());
    }

    #[test]
    fn missing_samples_are_reported() {
        let samples = Listed {
            labels: vec![0; 30],
        };

        assert!(split_for_rank(&samples, SplitSizes::new(20, 2), 0, 1).is_err());
    }
}
