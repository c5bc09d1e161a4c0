use crate::{MlErr, Result, matrix::Matrix};

/// A process's shard of the data: features and one-hot labels, one sample per column.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Matrix,
    y: Matrix,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - The features, `features x samples`.
    /// * `y` - The one-hot labels, `classes x samples`.
    ///
    /// # Returns
    /// The dataset or a shape mismatch if the sample counts differ.
    pub fn new(x: Matrix, y: Matrix) -> Result<Self> {
        if x.cols() != y.cols() {
            return Err(MlErr::ShapeMismatch {
                op: "dataset",
                left: x.shape(),
                right: y.shape(),
            });
        }

        Ok(Self { x, y })
    }

    pub fn x(&self) -> &Matrix {
        &self.x
    }

    pub fn y(&self) -> &Matrix {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn features(&self) -> usize {
        self.x.rows()
    }

    pub fn classes(&self) -> usize {
        self.y.rows()
    }
}

/// The train and test shards handed to the scheduler.
#[derive(Debug, Clone)]
pub struct TrainData {
    pub train: Dataset,
    pub test: Dataset,
}

impl TrainData {
    pub fn new(train: Dataset, test: Dataset) -> Self {
        Self { train, test }
    }
}
