use std::{
    error::Error,
    fmt::{self, Display},
};

use comms::CommsErr;
use ndarray::ShapeError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },
    EmptyShape {
        rows: usize,
        cols: usize,
    },
    Alloc {
        rows: usize,
        cols: usize,
    },
    Layout(ShapeError),
    OutOfBounds {
        start: usize,
        count: usize,
        cols: usize,
    },
    InvalidLayerDims(Vec<usize>),
    ThreadPool(String),
    Comms(CommsErr),
    InvalidBatchSize {
        global: usize,
        group: usize,
    },
    UnevenBatches {
        local: usize,
        other: usize,
    },
    EmptyDataset,
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch { op, left, right } => write!(
                f,
                "Shape mismatch in {op}: {}x{} against {}x{}",
                left.0, left.1, right.0, right.1
            ),
            MlErr::EmptyShape { rows, cols } => {
                write!(f, "Matrices must have positive dimensions, got {rows}x{cols}")
            }
            MlErr::Alloc { rows, cols } => write!(
                f,
                "Failed to allocate a {rows}x{cols} matrix ({} bytes)",
                rows.saturating_mul(*cols).saturating_mul(size_of::<f64>())
            ),
            MlErr::Layout(e) => write!(f, "Invalid matrix layout: {e}"),
            MlErr::OutOfBounds { start, count, cols } => write!(
                f,
                "Columns {start}..{} are out of bounds for a matrix of {cols} columns",
                start + count
            ),
            MlErr::InvalidLayerDims(dims) => write!(
                f,
                "Invalid layer dimensions {dims:?}, expected at least two positive widths"
            ),
            MlErr::ThreadPool(e) => write!(f, "Failed to build the thread pool: {e}"),
            MlErr::Comms(e) => write!(f, "Collective operation failed: {e}"),
            MlErr::InvalidBatchSize { global, group } => write!(
                f,
                "A global batch size of {global} can't be split evenly across {group} processes"
            ),
            MlErr::UnevenBatches { local, other } => write!(
                f,
                "Ranks would run a different amount of batches per iteration: {local} here, {other} elsewhere"
            ),
            MlErr::EmptyDataset => write!(f, "A member of the group has no usable training samples"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Layout(e) => Some(e),
            MlErr::Comms(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CommsErr> for MlErr {
    fn from(value: CommsErr) -> Self {
        Self::Comms(value)
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Layout(value)
    }
}
