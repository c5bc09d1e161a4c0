use std::{fs, path::Path};

use anyhow::{Context, bail};
use log::{debug, info};

use super::LabeledSamples;

pub const IMAGE_BYTES: usize = 32 * 32 * 3;
pub const CLASSES: usize = 10;

const RECORD_BYTES: usize = 1 + IMAGE_BYTES;
const BATCH_FILES: usize = 5;

pub const CLASS_NAMES: [&str; CLASSES] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// The CIFAR-10 training images, kept as raw bytes until they are split.
#[derive(Debug, Default, Clone)]
pub struct Cifar10 {
    labels: Vec<u8>,
    pixels: Vec<u8>,
}

impl Cifar10 {
    /// Reads `data_batch_1.bin` through `data_batch_5.bin` from `dir`.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let mut images = Self::default();

        for i in 1..=BATCH_FILES {
            let path = dir.join(format!("data_batch_{i}.bin"));
            let bytes =
                fs::read(&path).with_context(|| format!("cannot read '{}'", path.display()))?;

            images
                .extend_from_bytes(&bytes)
                .with_context(|| format!("malformed batch '{}'", path.display()))?;
            debug!("loaded {}", path.display());
        }

        info!("loaded {} CIFAR-10 images from {}", images.len(), dir.display());
        Ok(images)
    }

    /// Appends the records of a binary batch: one label byte followed by the red, green
    /// and blue planes of a 32x32 image.
    pub fn extend_from_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        if bytes.len() % RECORD_BYTES != 0 {
            bail!(
                "{} bytes is not a whole amount of {RECORD_BYTES} byte records",
                bytes.len()
            );
        }

        let records = bytes.len() / RECORD_BYTES;
        self.labels.reserve(records);
        self.pixels.reserve(records * IMAGE_BYTES);

        for (i, record) in bytes.chunks_exact(RECORD_BYTES).enumerate() {
            let (label, pixels) = (record[0], &record[1..]);
            if usize::from(label) >= CLASSES {
                bail!("record {i} has label {label}, expected one below {CLASSES}");
            }

            self.labels.push(label);
            self.pixels.extend_from_slice(pixels);
        }

        Ok(())
    }
}

impl LabeledSamples for Cifar10 {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn features(&self) -> usize {
        IMAGE_BYTES
    }

    fn classes(&self) -> usize {
        CLASSES
    }

    fn label(&self, index: usize) -> usize {
        usize::from(self.labels[index])
    }

    fn value(&self, index: usize, feature: usize) -> f64 {
        f64::from(self.pixels[index * IMAGE_BYTES + feature]) / 255.0
    }
}
