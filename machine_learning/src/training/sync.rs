use comms::Collective;
use log::debug;

use crate::{Result, arch::Gradients, matrix::Matrix};

/// Turns a group's sum reductions into the averages the update rule needs.
///
/// Every method is a collective call: all members must call the same methods, in the same
/// order, with matrices of the same shapes.
pub struct GradSync<C: Collective> {
    group: C,
    scratch: Vec<f64>,
}

impl<C: Collective> GradSync<C> {
    /// Creates a new `GradSync`.
    ///
    /// # Arguments
    /// * `group` - The group this process belongs to.
    pub fn new(group: C) -> Self {
        Self {
            group,
            scratch: Vec::new(),
        }
    }

    pub fn rank(&self) -> usize {
        self.group.rank()
    }

    pub fn size(&self) -> usize {
        self.group.size()
    }

    pub fn into_inner(self) -> C {
        self.group
    }

    fn inv_size(&self) -> f64 {
        1.0 / self.group.size() as f64
    }

    /// Replaces `m` with the elementwise average of every member's `m`.
    pub fn sync_matrix(&mut self, m: &mut Matrix) -> Result<()> {
        let inv = self.inv_size();
        let values = m.as_mut_slice();

        self.group.all_reduce_sum(values)?;
        values.iter_mut().for_each(|x| *x *= inv);
        Ok(())
    }

    /// Averages every `dw` and `db` across the group.
    ///
    /// All the matrices travel packed in a single reduction, element `i` of every matrix
    /// ends up exactly as `sync_matrix` would leave it.
    pub fn sync_gradients(&mut self, grads: &mut Gradients) -> Result<()> {
        let inv = self.inv_size();

        self.scratch.clear();
        for m in grads.iter_mut() {
            self.scratch.extend_from_slice(m.as_slice());
        }

        debug!("reducing {} gradient values", self.scratch.len());
        self.group.all_reduce_sum(&mut self.scratch)?;

        let mut offset = 0;
        for m in grads.iter_mut() {
            let values = m.as_mut_slice();
            let summed = &self.scratch[offset..offset + values.len()];

            for (x, s) in values.iter_mut().zip(summed) {
                *x = s * inv;
            }

            offset += values.len();
        }

        Ok(())
    }

    /// Returns the group-wide average of `cost`.
    pub fn sync_cost(&mut self, cost: f64) -> Result<f64> {
        let mut buf = [cost];
        self.group.all_reduce_sum(&mut buf)?;
        Ok(buf[0] * self.inv_size())
    }

    /// Combines every member's prediction counts into a single percentage.
    ///
    /// Counts are summed before dividing, so members with more samples weigh more.
    ///
    /// # Arguments
    /// * `correct` - The amount of correct predictions of this member.
    /// * `total` - The amount of samples evaluated by this member.
    ///
    /// # Returns
    /// `100 * Σ correct / Σ total`, or `0.0` if the group evaluated no samples at all.
    pub fn sync_accuracy(&mut self, correct: usize, total: usize) -> Result<f64> {
        let mut buf = [correct as f64, total as f64];
        self.group.all_reduce_sum(&mut buf)?;

        let [correct, total] = buf;
        if total == 0.0 {
            return Ok(0.0);
        }

        Ok(100.0 * correct / total)
    }

    /// Gathers one count per member, ordered by rank.
    pub fn gather_counts(&mut self, count: usize) -> Result<Vec<usize>> {
        let mut buf = vec![0.0; self.size()];
        buf[self.rank()] = count as f64;

        self.group.all_reduce_sum(&mut buf)?;
        Ok(buf.into_iter().map(|c| c as usize).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use comms::{LocalGroup, SoloGroup};

    use super::*;

    fn on_two_members<T, F>(f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(GradSync<comms::LocalMember>) -> T + Sync,
    {
        let members = LocalGroup::new(2);

        thread::scope(|s| {
            let handles: Vec<_> = members
                .into_iter()
                .map(|member| {
                    let f = &f;
                    s.spawn(move || f(GradSync::new(member)))
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn averaging_identical_matrices_is_the_identity() {
        let m = Matrix::from_rows(&[[0.1, -3.7], [1e-12, 12345.678]]).unwrap();

        let results = on_two_members(|mut sync| {
            let mut mine = m.clone();
            sync.sync_matrix(&mut mine).unwrap();
            mine
        });

        for r in results {
            assert_eq!(r, m);
        }
    }

    #[test]
    fn two_members_get_the_mean() {
        let results = on_two_members(|mut sync| {
            let mut m = match sync.rank() {
                0 => Matrix::from_rows(&[[1., 2.], [3., 4.]]).unwrap(),
                _ => Matrix::from_rows(&[[3., -2.], [0., 5.]]).unwrap(),
            };
            sync.sync_matrix(&mut m).unwrap();
            m
        });

        for r in results {
            assert_eq!(r.as_slice(), &[2., 0., 1.5, 4.5]);
        }
    }

    #[test]
    fn accuracy_weighs_by_sample_count() {
        // 9/10 and 1/30: the average of percentages would be 46.67.
        let results = on_two_members(|mut sync| match sync.rank() {
            0 => sync.sync_accuracy(9, 10).unwrap(),
            _ => sync.sync_accuracy(1, 30).unwrap(),
        });

        for acc in results {
            assert_eq!(acc, 100. * 10. / 40.);
        }
    }

    #[test]
    fn cost_and_counts() {
        let results = on_two_members(|mut sync| {
            let r = sync.rank();
            let cost = sync.sync_cost(1. + r as f64).unwrap();
            let counts = sync.gather_counts(10 + 5 * r).unwrap();
            (cost, counts)
        });

        for (cost, counts) in results {
            assert_eq!(cost, 1.5);
            assert_eq!(counts, vec![10, 15]);
        }
    }

    #[test]
    fn group_of_one_is_the_identity() {
        let mut sync = GradSync::new(SoloGroup::new());
        let m = Matrix::from_rows(&[[0.3, 0.7]]).unwrap();

        let mut mine = m.clone();
        sync.sync_matrix(&mut mine).unwrap();
        assert_eq!(mine, m);

        assert_eq!(sync.sync_cost(0.123).unwrap(), 0.123);
        assert_eq!(sync.sync_accuracy(3, 4).unwrap(), 75.);
        assert_eq!(sync.sync_accuracy(0, 0).unwrap(), 0.);
        assert_eq!(sync.gather_counts(7).unwrap(), vec![7]);
    }
}
