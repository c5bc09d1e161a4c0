use std::ops::Range;

/// Splits `total` items among `world_size` processes and returns `rank`'s share.
///
/// The ranges are contiguous, disjoint and cover `0..total`, and their lengths differ by
/// at most one.
///
/// # Arguments
/// * `total` - The amount of items to split.
/// * `rank` - The process whose share is returned, in `0..world_size`.
/// * `world_size` - The amount of processes, must be positive.
pub fn shard_range(total: usize, rank: usize, world_size: usize) -> Range<usize> {
    debug_assert!(rank < world_size);

    let base = total / world_size;
    let rem = total % world_size;

    let start = rank * base + rank.min(rem);
    let end = start + base + usize::from(rank < rem);

    start..end
}
