use crate::{
    Result,
    arch::{ForwardPass, NetworkParams},
    matrix::MatrixView,
};

/// Columns evaluated per forward pass, bounding the memory used on large sets.
const EVAL_CHUNK: usize = 1024;

/// Index of the first maximum of `values`.
fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);

    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }

    best.0
}

/// Counts how many samples the network classifies correctly.
///
/// The predicted class is the first row holding the column's maximum probability, the true
/// class is the first row whose label is above `0.5`.
///
/// # Arguments
/// * `params` - The network's parameters.
/// * `x` - The features, one sample per column.
/// * `y` - The one-hot labels.
///
/// # Returns
/// A tuple `(correct, total)`.
pub fn count_correct(params: &NetworkParams, x: MatrixView, y: MatrixView) -> Result<(usize, usize)> {
    let total = x.cols();
    let mut correct = 0;

    for start in (0..total).step_by(EVAL_CHUNK) {
        let count = EVAL_CHUNK.min(total - start);
        let (x, y) = (x.columns(start, count)?, y.columns(start, count)?);

        let pass = ForwardPass::run(params, x.reborrow())?;
        let out = pass.output().array();
        let y = y.array();

        correct += out
            .columns()
            .into_iter()
            .zip(y.columns())
            .filter(|(p, t)| {
                let predicted = argmax(p.iter().copied());
                let actual = t.iter().position(|&v| v > 0.5);
                actual == Some(predicted)
            })
            .count();
    }

    Ok((correct, total))
}

/// Returns the percentage of samples of this process's shard the network classifies
/// correctly.
pub fn compute_accuracy(x: MatrixView, y: MatrixView, params: &NetworkParams) -> Result<f64> {
    let (correct, total) = count_correct(params, x, y)?;
    if total == 0 {
        return Ok(0.0);
    }

    Ok(100.0 * correct as f64 / total as f64)
}
