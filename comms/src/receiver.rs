//! The receiving end of the frame protocol.

use std::io::Read;

use crate::{CommsErr, LEN_TYPE_SIZE, LenType, Result};

const F64_SIZE: usize = size_of::<f64>();

/// Reads a single frame from `rx` into `buf`, resizing it to the received amount of numbers.
///
/// # Arguments
/// * `rx` - The underlying reader.
/// * `buf` - Where the numbers will be written to, reused across calls to avoid allocations.
///
/// # Returns
/// An error on io failures, when the payload is not made of whole `f64`s or when it is too
/// large to allocate.
pub fn recv_frame_into<R: Read>(rx: &mut R, buf: &mut Vec<f64>) -> Result<()> {
    let mut header = [0; LEN_TYPE_SIZE];
    rx.read_exact(&mut header)?;
    let len = LenType::from_be_bytes(header) as usize;

    if len % F64_SIZE != 0 {
        return Err(CommsErr::MalformedFrame(len));
    }

    let count = len / F64_SIZE;
    buf.clear();
    buf.try_reserve_exact(count)
        .map_err(|_| CommsErr::FrameTooLarge(len))?;
    buf.resize(count, 0.0);
    rx.read_exact(bytemuck::cast_slice_mut(buf.as_mut_slice()))?;
    Ok(())
}

/// Reads a pair of integers written by `send_pair`.
///
/// # Arguments
/// * `rx` - The underlying reader.
pub fn recv_pair<R: Read>(rx: &mut R) -> Result<(u64, u64)> {
    let mut bytes = [0; 2 * LEN_TYPE_SIZE];
    rx.read_exact(&mut bytes)?;

    let (a, b) = bytes.split_at(LEN_TYPE_SIZE);
    let mut first = [0; LEN_TYPE_SIZE];
    let mut second = [0; LEN_TYPE_SIZE];
    first.copy_from_slice(a);
    second.copy_from_slice(b);

    Ok((LenType::from_be_bytes(first), LenType::from_be_bytes(second)))
}
