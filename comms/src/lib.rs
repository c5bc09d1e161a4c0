//! Collective reductions over a fixed group of cooperating processes.
//!
//! A group is either a single process (`SoloGroup`), threads standing in for processes
//! (`LocalGroup`) or real processes talking over tcp (`TcpGroup`). All of them expose the
//! same blocking `Collective::all_reduce_sum`.

mod collective;
mod error;
mod local;
mod receiver;
mod sender;
mod solo;
mod tcp;

pub use collective::Collective;
pub use error::{CommsErr, Result};
pub use local::{LocalGroup, LocalMember};
pub use solo::SoloGroup;
pub use tcp::{Rendezvous, TcpGroup};

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();
