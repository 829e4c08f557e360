//! The correlated-randomness dealer
//!
//! Parties connect, name a dimension, and wait. The dealer pairs two
//! requests of equal dimension in FIFO order and deals each side one
//! additive share of a fresh Beaver triple. The waiting table is the only
//! state; nothing survives a pairing, which bounds recovery to
//! reconnect-and-retry.

use crate::ServiceError;
use duoram_api::{codec, ring, ProtocolError, TripleShare, OP_TRIPLE_REQUEST};
use itertools::Itertools;
use rand::{thread_rng, Rng};
use std::collections::{HashMap, VecDeque};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;

// ---------
// | Types |
// ---------

/// Sampling range for triple vectors and the `c` blinding term
const SAMPLE_RANGE: RangeInclusive<i64> = 1..=1024;

/// A parked request: the first arrival for its dimension
struct Waiter {
    /// Ticket used to withdraw the entry if the holder gives up
    ticket: u64,
    /// Channel the pairing sequel delivers the share on
    tx: oneshot::Sender<TripleShare>,
}

/// Outcome of inserting a request into the waiting table
enum Pairing {
    /// First arrival for the dimension, parked under the given ticket
    Parked(u64),
    /// Second arrival: the waiter popped for the pairing sequel
    Matched(Waiter),
}

/// Pairing service for Beaver-triple requests
pub struct Dealer {
    /// FIFO of parked requests per dimension
    ///
    /// Held only across queue mutation, never across generation or I/O.
    waiting: Mutex<HashMap<u32, VecDeque<Waiter>>>,
    /// Ticket counter for withdrawable waiting entries
    next_ticket: AtomicU64,
    /// How long a lone request may wait for its peer
    waiter_ttl: Duration,
}

// -------------------------
// | Dealer Implementation |
// -------------------------

impl Dealer {
    /// Create a dealer whose lone requests expire after `waiter_ttl`
    pub fn new(waiter_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            waiting: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
            waiter_ttl,
        })
    }

    /// Accept loop: one task per connection
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (conn, addr) = listener.accept().await?;
            let dealer = Arc::clone(&self);
            tokio::spawn(async move {
                // Malformed or unpaired requests close silently.
                if let Err(err) = dealer.handle_conn(conn).await {
                    debug!(%addr, %err, "dealer connection dropped");
                }
            });
        }
    }

    /// Serve one triple request
    async fn handle_conn(&self, mut conn: TcpStream) -> Result<(), ServiceError> {
        codec::expect_op(&mut conn, OP_TRIPLE_REQUEST).await?;
        let dim = conn.read_u32().await.map_err(ProtocolError::Io)?;
        if dim == 0 {
            return Err(ProtocolError::ZeroDim.into());
        }

        let (tx, mut rx) = oneshot::channel();
        let share = match self.pair(dim, tx) {
            Pairing::Matched(waiter) => {
                // Pairing sequel: generation and delivery happen outside
                // the table lock.
                let (first, second) = gen_triple(dim);
                let sid = first.sid;
                if waiter.tx.send(first).is_err() {
                    // The waiter vanished between the pop and the send; its
                    // half of the triple is gone, so this side fails too.
                    return Err(ServiceError::PairingAborted);
                }
                debug!(dim, sid, "paired two requests");
                second
            },
            Pairing::Parked(ticket) => {
                let mut probe = [0u8; 1];
                tokio::select! {
                    res = timeout(self.waiter_ttl, &mut rx) => match res {
                        Ok(Ok(share)) => share,
                        Ok(Err(_)) => return Err(ServiceError::PairingAborted),
                        Err(_elapsed) => {
                            if self.withdraw(dim, ticket) {
                                return Err(ServiceError::Unpaired { dim });
                            }
                            // A peer claimed the entry before the
                            // withdrawal: the share is already on its way.
                            rx.await.map_err(|_| ServiceError::PairingAborted)?
                        },
                    },
                    _ = conn.read(&mut probe) => {
                        // EOF (or protocol garbage) while parked: the
                        // client is gone, withdraw the entry.
                        if self.withdraw(dim, ticket) {
                            return Err(ServiceError::Unpaired { dim });
                        }
                        rx.await.map_err(|_| ServiceError::PairingAborted)?
                    },
                }
            },
        };

        share.write(&mut conn).await?;
        Ok(())
    }

    /// Insert a request for `dim`: the first arrival parks, the second pops
    /// the longest-waiting entry
    fn pair(&self, dim: u32, tx: oneshot::Sender<TripleShare>) -> Pairing {
        let mut waiting = self.waiting.lock().unwrap();
        let queue = waiting.entry(dim).or_default();
        if let Some(waiter) = queue.pop_front() {
            if queue.is_empty() {
                waiting.remove(&dim);
            }
            Pairing::Matched(waiter)
        } else {
            let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
            queue.push_back(Waiter { ticket, tx });
            Pairing::Parked(ticket)
        }
    }

    /// Remove a parked entry; false when a peer already claimed it
    fn withdraw(&self, dim: u32, ticket: u64) -> bool {
        let mut waiting = self.waiting.lock().unwrap();
        let Some(queue) = waiting.get_mut(&dim) else {
            return false;
        };

        let before = queue.len();
        queue.retain(|waiter| waiter.ticket != ticket);
        let removed = queue.len() != before;
        if queue.is_empty() {
            waiting.remove(&dim);
        }
        removed
    }
}

// ------------------------------------
// | Correlated Randomness Generation |
// ------------------------------------

/// Sample a vector of `n` elements from the dealer's sampling range
fn sample_vec(n: usize) -> Vec<i64> {
    let mut rng = thread_rng();
    (0..n).map(|_| rng.gen_range(SAMPLE_RANGE)).collect_vec()
}

/// Generate one Beaver triple of dimension `dim`, split into the share for
/// the first-arrived request and the share for the second
pub fn gen_triple(dim: u32) -> (TripleShare, TripleShare) {
    let n = dim as usize;
    let (a0, a1) = (sample_vec(n), sample_vec(n));
    let (b0, b1) = (sample_vec(n), sample_vec(n));

    let a = ring::add(&a0, &a1);
    let b = ring::add(&b0, &b1);
    let c = ring::dot(&a, &b);

    let mut rng = thread_rng();
    let c0 = rng.gen_range(SAMPLE_RANGE);
    let c1 = c.wrapping_sub(c0);
    // Session ids stay in the non-negative half of the i64 domain.
    let sid = (rng.gen::<u64>() >> 1) as i64;

    (TripleShare { sid, a: a0, b: b0, c: c0 }, TripleShare { sid, a: a1, b: b1, c: c1 })
}
