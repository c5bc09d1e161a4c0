use std::{error::Error, fmt, io};

/// The result type used in the entire comms module.
pub type Result<T> = std::result::Result<T, CommsErr>;

/// Failures of the collective layer.
#[derive(Debug)]
pub enum CommsErr {
    Io(io::Error),
    LengthMismatch {
        got: usize,
        expected: usize,
    },
    InvalidRank {
        rank: usize,
        size: usize,
    },
    DuplicateRank(usize),
    GroupSizeMismatch {
        got: usize,
        expected: usize,
    },
    ConnectTimeout {
        addr: String,
        attempts: usize,
    },
    MalformedFrame(usize),
    FrameTooLarge(usize),
}

impl fmt::Display for CommsErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommsErr::Io(e) => write!(f, "io error: {e}"),
            CommsErr::LengthMismatch { got, expected } => write!(
                f,
                "group members disagree on the buffer length: got {got}, expected {expected}"
            ),
            CommsErr::InvalidRank { rank, size } => {
                write!(f, "rank {rank} is out of range for a group of size {size}")
            }
            CommsErr::DuplicateRank(rank) => write!(f, "rank {rank} joined the group twice"),
            CommsErr::GroupSizeMismatch { got, expected } => write!(
                f,
                "a peer believes the group has {got} members, expected {expected}"
            ),
            CommsErr::ConnectTimeout { addr, attempts } => {
                write!(f, "could not reach {addr} after {attempts} attempts")
            }
            CommsErr::MalformedFrame(len) => {
                write!(f, "received a frame of {len} bytes, not a whole number of f64s")
            }
            CommsErr::FrameTooLarge(len) => {
                write!(f, "received a frame of {len} bytes, too large to allocate")
            }
        }
    }
}

impl Error for CommsErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CommsErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CommsErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
