use std::sync::{Arc, Barrier};

use parking_lot::Mutex;

use super::{Collective, CommsErr};

/// Shared state of an in-process group: one contribution slot per rank.
struct Shared {
    slots: Vec<Mutex<Vec<f64>>>,
    barrier: Barrier,
}

/// An in-process group whose members live on different threads.
///
/// Stands in for a multi-process group wherever spawning real processes is not
/// wanted, the reduction semantics are the same as over the network.
pub struct LocalGroup;

impl LocalGroup {
    /// Creates the members of a new in-process group.
    ///
    /// # Arguments
    /// * `size` - The amount of members.
    ///
    /// # Returns
    /// One `LocalMember` per rank, ordered by rank. Each one should be moved into its own thread.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(size: usize) -> Vec<LocalMember> {
        let shared = Arc::new(Shared {
            slots: (0..size).map(|_| Mutex::new(Vec::new())).collect(),
            barrier: Barrier::new(size),
        });

        (0..size)
            .map(|rank| LocalMember {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

/// A single member of a `LocalGroup`.
pub struct LocalMember {
    rank: usize,
    shared: Arc<Shared>,
}

impl Collective for LocalMember {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.slots.len()
    }

    fn all_reduce_sum(&mut self, buf: &mut [f64]) -> crate::Result<()> {
        let Shared { slots, barrier } = &*self.shared;

        {
            let mut slot = slots[self.rank].lock();
            slot.clear();
            slot.extend_from_slice(buf);
        }

        barrier.wait();

        // Every member sums the slots in rank order, so they all land on the same bits.
        let mut result = Ok(());
        buf.fill(0.0);

        for slot in slots {
            let slot = slot.lock();

            if slot.len() != buf.len() {
                result = Err(CommsErr::LengthMismatch {
                    got: slot.len(),
                    expected: buf.len(),
                });
                break;
            }

            for (acc, x) in buf.iter_mut().zip(slot.iter()) {
                *acc += x;
            }
        }

        // Nobody may overwrite its slot until everyone is done reading.
        barrier.wait();
        result
    }
}
