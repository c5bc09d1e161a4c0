use std::{
    io::{BufReader, BufWriter},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    thread,
    time::Duration,
};

use log::{debug, info, warn};

use crate::{
    Collective, CommsErr, Result,
    receiver::{recv_frame_into, recv_pair},
    sender::{send_frame, send_pair},
};

const CONNECT_ATTEMPTS: usize = 120;
const RETRY_DELAY: Duration = Duration::from_millis(500);

const STATUS_OK: u64 = 0;
const STATUS_LENGTH_MISMATCH: u64 = 1;

/// Both halves of a connection to a single peer.
struct Link {
    rx: BufReader<TcpStream>,
    tx: BufWriter<TcpStream>,
}

impl Link {
    fn new(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let rx = BufReader::new(stream.try_clone()?);
        let tx = BufWriter::new(stream);
        Ok(Self { rx, tx })
    }
}

enum Role {
    /// Links ordered by peer rank, the link at `i` belongs to rank `i + 1`.
    Root(Vec<Link>),
    Leaf(Link),
}

/// A group of processes connected over tcp in a star around rank 0.
///
/// Contributions travel to the root, which sums them in rank order and sends the
/// result back, so every member ends up with the same bits.
pub struct TcpGroup {
    rank: usize,
    size: usize,
    role: Role,
    scratch: Vec<f64>,
}

/// The root's listening socket, before every peer has joined.
pub struct Rendezvous {
    listener: TcpListener,
    size: usize,
}

impl Rendezvous {
    /// The address peers should connect to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Blocks until the remaining `size - 1` members joined.
    ///
    /// # Returns
    /// The root's end of the group, or an error if a peer sends a bad handshake.
    pub fn accept(self) -> Result<TcpGroup> {
        let Self { listener, size } = self;
        let mut slots: Vec<Option<Link>> = (1..size).map(|_| None).collect();

        for _ in 1..size {
            let (stream, peer_addr) = listener.accept()?;
            let mut link = Link::new(stream)?;
            let (rank, peer_size) = recv_pair(&mut link.rx)?;
            let (rank, peer_size) = (rank as usize, peer_size as usize);

            if peer_size != size {
                return Err(CommsErr::GroupSizeMismatch {
                    got: peer_size,
                    expected: size,
                });
            }

            if rank == 0 || rank >= size {
                return Err(CommsErr::InvalidRank { rank, size });
            }

            let slot = &mut slots[rank - 1];
            if slot.is_some() {
                return Err(CommsErr::DuplicateRank(rank));
            }

            send_pair(&mut link.tx, (0, size as u64))?;
            debug!(rank = rank; "peer joined the group from {peer_addr}");
            *slot = Some(link);
        }

        let links = slots.into_iter().flatten().collect();
        info!("group of {size} members formed");

        Ok(TcpGroup {
            rank: 0,
            size,
            role: Role::Root(links),
            scratch: Vec::new(),
        })
    }
}

impl TcpGroup {
    /// Binds the root's listening socket.
    ///
    /// # Arguments
    /// * `addr` - The address to listen on.
    /// * `size` - The amount of members the group will have, the root included.
    pub fn listen<A: ToSocketAddrs>(addr: A, size: usize) -> Result<Rendezvous> {
        if size == 0 {
            return Err(CommsErr::InvalidRank { rank: 0, size });
        }

        let listener = TcpListener::bind(addr)?;
        Ok(Rendezvous { listener, size })
    }

    /// Joins the group whose root listens on `addr`, retrying while the root is not up yet.
    ///
    /// # Arguments
    /// * `addr` - The root's address.
    /// * `rank` - This member's rank, in `1..size`.
    /// * `size` - The amount of members in the group.
    pub fn connect(addr: &str, rank: usize, size: usize) -> Result<Self> {
        if rank == 0 || rank >= size {
            return Err(CommsErr::InvalidRank { rank, size });
        }

        let stream = connect_with_retries(addr)?;
        let mut link = Link::new(stream)?;

        send_pair(&mut link.tx, (rank as u64, size as u64))?;
        let (_, root_size) = recv_pair(&mut link.rx)?;

        if root_size as usize != size {
            return Err(CommsErr::GroupSizeMismatch {
                got: root_size as usize,
                expected: size,
            });
        }

        debug!("joined the group as rank {rank} of {size}");

        Ok(Self {
            rank,
            size,
            role: Role::Leaf(link),
            scratch: Vec::new(),
        })
    }
}

fn connect_with_retries(addr: &str) -> Result<TcpStream> {
    for attempt in 1..=CONNECT_ATTEMPTS {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                if attempt % 10 == 0 {
                    warn!("still waiting for the root at {addr} after {attempt} attempts: {e}");
                }
                thread::sleep(RETRY_DELAY);
            }
        }
    }

    Err(CommsErr::ConnectTimeout {
        addr: addr.to_string(),
        attempts: CONNECT_ATTEMPTS,
    })
}

impl Collective for TcpGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_sum(&mut self, buf: &mut [f64]) -> Result<()> {
        let Self { role, scratch, .. } = self;

        match role {
            Role::Root(links) => {
                // Every frame must be drained even after a mismatch, or the streams desync.
                let mut mismatch = None;

                for link in links.iter_mut() {
                    recv_frame_into(&mut link.rx, scratch)?;

                    if scratch.len() != buf.len() {
                        mismatch.get_or_insert(scratch.len());
                        continue;
                    }

                    for (acc, x) in buf.iter_mut().zip(scratch.iter()) {
                        *acc += x;
                    }
                }

                let status = match mismatch {
                    Some(_) => STATUS_LENGTH_MISMATCH,
                    None => STATUS_OK,
                };

                for link in links.iter_mut() {
                    send_pair(&mut link.tx, (status, buf.len() as u64))?;
                    if status == STATUS_OK {
                        send_frame(&mut link.tx, buf)?;
                    }
                }

                match mismatch {
                    Some(got) => Err(CommsErr::LengthMismatch {
                        got,
                        expected: buf.len(),
                    }),
                    None => Ok(()),
                }
            }
            Role::Leaf(link) => {
                send_frame(&mut link.tx, buf)?;
                let (status, expected) = recv_pair(&mut link.rx)?;

                if status != STATUS_OK {
                    return Err(CommsErr::LengthMismatch {
                        got: buf.len(),
                        expected: expected as usize,
                    });
                }

                recv_frame_into(&mut link.rx, scratch)?;
                if scratch.len() != buf.len() {
                    return Err(CommsErr::LengthMismatch {
                        got: scratch.len(),
                        expected: buf.len(),
                    });
                }

                buf.copy_from_slice(scratch);
                Ok(())
            }
        }
    }
}
