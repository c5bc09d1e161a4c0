use anyhow::{Context, ensure};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use super::LabeledSamples;

/// A synthetic dataset of Gaussian clusters, one per class, with values clamped to
/// `[0, 1]`. Sample `i` belongs to class `i % classes`.
#[derive(Debug, Clone)]
pub struct Blobs {
    features: usize,
    classes: usize,
    values: Vec<f64>,
}

impl Blobs {
    /// Generates the samples.
    ///
    /// # Arguments
    /// * `samples` - The amount of samples.
    /// * `features` - The amount of features per sample.
    /// * `classes` - The amount of clusters.
    /// * `spread` - The standard deviation of every cluster.
    /// * `seed` - Seeds the centres and the noise, every process must use the same one.
    pub fn generate(
        samples: usize,
        features: usize,
        classes: usize,
        spread: f64,
        seed: u64,
    ) -> anyhow::Result<Self> {
        ensure!(features > 0 && classes > 0, "blobs need features and classes");
        ensure!(
            spread.is_finite() && spread >= 0.0,
            "the blob spread must be a non-negative number, got {spread}"
        );

        let noise = Normal::new(0.0, spread).context("invalid blob spread")?;
        let mut rng = StdRng::seed_from_u64(seed);

        let centres: Vec<f64> = (0..classes * features)
            .map(|_| rng.random_range(0.2..0.8))
            .collect();

        let mut values = Vec::with_capacity(samples * features);
        for i in 0..samples {
            let centre = &centres[(i % classes) * features..][..features];
            values.extend(
                centre
                    .iter()
                    .map(|c| (c + noise.sample(&mut rng)).clamp(0.0, 1.0)),
            );
        }

        Ok(Self {
            features,
            classes,
            values,
        })
    }
}

impl LabeledSamples for Blobs {
    fn len(&self) -> usize {
        self.values.len() / self.features
    }

    fn features(&self) -> usize {
        self.features
    }

    fn classes(&self) -> usize {
        self.classes
    }

    fn label(&self, index: usize) -> usize {
        index % self.classes
    }

    fn value(&self, index: usize, feature: usize) -> f64 {
        self.values[index * self.features + feature]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_seeded_and_bounded() {
        let a = Blobs::generate(30, 4, 3, 0.5, 11).unwrap();
        let b = Blobs::generate(30, 4, 3, 0.5, 11).unwrap();

        assert_eq!(a.len(), 30);
        assert_eq!(a.values, b.values);
        assert!(a.values.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(a.label(7), 1);
    }

    #[test]
    fn invalid_spreads_are_rejected() {
        assert!(Blobs::generate(10, 2, 2, -1.0, 0).is_err());
        assert!(Blobs::generate(10, 2, 2, f64::NAN, 0).is_err());
        assert!(Blobs::generate(10, 2, 2, f64::INFINITY, 0).is_err());
        assert!(Blobs::generate(10, 2, 2, 0.0, 0).is_ok());
    }
}
