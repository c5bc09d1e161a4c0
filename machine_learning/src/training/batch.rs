use std::{num::NonZeroUsize, ops::Range};

use ndarray::ArrayView2;

use crate::{MlErr, Result, dataset::Dataset, matrix::MatrixView};

/// How one epoch over `samples` columns is cut into batches.
///
/// Batches are contiguous and in order, only the last one may be shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochPlan {
    samples: usize,
    batch_size: usize,
}

impl EpochPlan {
    /// Creates a new `EpochPlan`.
    ///
    /// # Arguments
    /// * `samples` - The amount of local samples.
    /// * `batch_size` - The local batch size, `None` makes every epoch a single full batch.
    pub fn new(samples: usize, batch_size: Option<NonZeroUsize>) -> Self {
        let batch_size = batch_size.map_or(samples, NonZeroUsize::get);
        Self {
            samples,
            batch_size,
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether the epoch is a single batch covering every sample.
    pub fn is_full_batch(&self) -> bool {
        self.batch_size >= self.samples
    }

    pub fn num_batches(&self) -> usize {
        match self.batch_size {
            0 => 0,
            size => self.samples.div_ceil(size),
        }
    }

    /// The column range of every batch, in order.
    pub fn batches(&self) -> impl Iterator<Item = Range<usize>> + use<> {
        let Self {
            samples,
            batch_size,
        } = *self;

        (0..self.num_batches()).map(move |i| {
            let start = i * batch_size;
            start..(start + batch_size).min(samples)
        })
    }
}

/// Reusable contiguous storage the current batch is copied into.
///
/// The buffers are sized once for a full batch, a short batch just uses fewer columns.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    x: Vec<f64>,
    y: Vec<f64>,
}

fn reserve(buf: &mut Vec<f64>, rows: usize, cols: usize) -> Result<()> {
    let len = rows
        .checked_mul(cols)
        .ok_or(MlErr::Alloc { rows, cols })?;

    buf.try_reserve_exact(len)
        .map_err(|_| MlErr::Alloc { rows, cols })
}

/// Copies `range` of every row of `src` into `dst`, row after row.
fn gather(src: ArrayView2<f64>, range: Range<usize>, dst: &mut Vec<f64>) {
    dst.clear();
    for row in src.rows() {
        dst.extend(row.iter().skip(range.start).take(range.len()));
    }
}

impl BatchBuffer {
    /// Creates a buffer able to hold `batch_size` columns of `dataset` without reallocating.
    ///
    /// # Arguments
    /// * `dataset` - The dataset batches will be taken from.
    /// * `batch_size` - The maximum amount of columns per batch.
    pub fn for_dataset(dataset: &Dataset, batch_size: usize) -> Result<Self> {
        let mut buffer = Self::default();
        reserve(&mut buffer.x, dataset.features(), batch_size)?;
        reserve(&mut buffer.y, dataset.classes(), batch_size)?;
        Ok(buffer)
    }

    /// Copies the columns in `range` of `dataset` into the buffer.
    ///
    /// # Arguments
    /// * `dataset` - The dataset to read from.
    /// * `range` - The sample columns of the batch.
    ///
    /// # Returns
    /// Views of the batch's features and labels, exactly `range.len()` columns wide.
    pub fn load<'a>(
        &'a mut self,
        dataset: &Dataset,
        range: Range<usize>,
    ) -> Result<(MatrixView<'a>, MatrixView<'a>)> {
        if range.is_empty() || range.end > dataset.len() {
            return Err(MlErr::OutOfBounds {
                start: range.start,
                count: range.len(),
                cols: dataset.len(),
            });
        }

        let count = range.len();
        gather(dataset.x().array().view(), range.clone(), &mut self.x);
        gather(dataset.y().array().view(), range, &mut self.y);

        let x = ArrayView2::from_shape((dataset.features(), count), &self.x)?;
        let y = ArrayView2::from_shape((dataset.classes(), count), &self.y)?;

        Ok((MatrixView::from_array(x)?, MatrixView::from_array(y)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;

    fn ten_samples() -> Dataset {
        let x = Matrix::from_vec(2, 10, (0..20).map(f64::from).collect()).unwrap();
        let mut y = Matrix::zeros(2, 10).unwrap();
        for j in 0..10 {
            *y.get_mut(j % 2, j).unwrap() = 1.;
        }
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn ten_samples_in_batches_of_four() {
        let plan = EpochPlan::new(10, NonZeroUsize::new(4));

        assert_eq!(plan.num_batches(), 3);
        assert!(!plan.is_full_batch());
        assert_eq!(plan.batches().collect::<Vec<_>>(), vec![0..4, 4..8, 8..10]);
    }

    #[test]
    fn no_batch_size_means_one_full_batch() {
        let plan = EpochPlan::new(10, None);

        assert!(plan.is_full_batch());
        assert_eq!(plan.batches().collect::<Vec<_>>(), vec![0..10]);
    }

    #[test]
    fn exact_multiples_have_no_short_batch() {
        let plan = EpochPlan::new(12, NonZeroUsize::new(4));
        assert!(plan.batches().all(|r| r.len() == 4));
    }

    #[test]
    fn short_batch_only_holds_its_own_columns() {
        let data = ten_samples();
        let mut buffer = BatchBuffer::for_dataset(&data, 4).unwrap();

        let (x, _) = buffer.load(&data, 0..4).unwrap();
        assert_eq!(x.shape(), (2, 4));

        let (x, y) = buffer.load(&data, 8..10).unwrap();
        assert_eq!(x.shape(), (2, 2));
        assert_eq!(y.shape(), (2, 2));
        assert_eq!(x.to_owned().unwrap().as_slice(), &[8., 9., 18., 19.]);
        assert_eq!(y.to_owned().unwrap().as_slice(), &[1., 0., 0., 1.]);
    }

    #[test]
    fn out_of_range_batches_are_rejected() {
        let data = ten_samples();
        let mut buffer = BatchBuffer::default();

        assert!(buffer.load(&data, 8..11).is_err());
        assert!(buffer.load(&data, 3..3).is_err());
    }
}
