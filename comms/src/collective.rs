/// A group of cooperating processes that can reduce buffers together.
///
/// Every call is a blocking barrier: it only returns once all members of the group
/// issued the same call. Members must therefore issue the same sequence of calls, with
/// the same buffer lengths, or the group deadlocks.
pub trait Collective {
    /// Returns this member's index within the group, in `0..size()`.
    fn rank(&self) -> usize;

    /// Returns the amount of members in the group.
    fn size(&self) -> usize;

    /// Replaces `buf` with the element-wise sum of every member's `buf`.
    ///
    /// # Arguments
    /// * `buf` - This member's contribution, overwritten with the group-wide sum.
    ///
    /// # Returns
    /// An error if the transport failed or the members disagree on the length of `buf`.
    fn all_reduce_sum(&mut self, buf: &mut [f64]) -> crate::Result<()>;

    /// Whether this member is the group's root, the one that usually does the talking.
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

impl<C: Collective + ?Sized> Collective for &mut C {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn all_reduce_sum(&mut self, buf: &mut [f64]) -> crate::Result<()> {
        (**self).all_reduce_sum(buf)
    }
}

impl<C: Collective + ?Sized> Collective for Box<C> {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn all_reduce_sum(&mut self, buf: &mut [f64]) -> crate::Result<()> {
        (**self).all_reduce_sum(buf)
    }
}
