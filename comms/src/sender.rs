//! The sending end of the frame protocol: a big-endian length header followed by the payload.

use std::io::{self, Write};

use crate::{LEN_TYPE_SIZE, LenType};

/// Writes `nums` as a single frame into `tx`.
///
/// The payload is the raw in-memory representation of the numbers, every member of a
/// group is expected to run on the same architecture.
///
/// # Arguments
/// * `tx` - The underlying writer.
/// * `nums` - The numbers to send.
///
/// # Returns
/// An `io::Error` on failure.
pub fn send_frame<W: Write>(tx: &mut W, nums: &[f64]) -> io::Result<()> {
    let payload: &[u8] = bytemuck::cast_slice(nums);
    let header = (payload.len() as LenType).to_be_bytes();
    debug_assert_eq!(header.len(), LEN_TYPE_SIZE);

    tx.write_all(&header)?;
    tx.write_all(payload)?;
    tx.flush()
}

/// Writes a pair of integers, used for the group handshake.
///
/// # Arguments
/// * `tx` - The underlying writer.
/// * `pair` - The two values to send.
pub fn send_pair<W: Write>(tx: &mut W, pair: (u64, u64)) -> io::Result<()> {
    let mut bytes = [0; 2 * LEN_TYPE_SIZE];
    bytes[..LEN_TYPE_SIZE].copy_from_slice(&pair.0.to_be_bytes());
    bytes[LEN_TYPE_SIZE..].copy_from_slice(&pair.1.to_be_bytes());

    tx.write_all(&bytes)?;
    tx.flush()
}
