//! A duoram party: one additive share of the memory and the request loop
//!
//! Each party listens on two endpoints: one for client requests and one for
//! peer residual frames. Client connections are served strictly serially; a
//! write landing between the two rounds of a read would corrupt the
//! computation, so there is no request concurrency inside one party.

use crate::exchange::{self, Side};
use crate::{Role, ServiceError};
use duoram_api::{
    codec, ring, ProtocolError, TripleShare, OP_READ, OP_TRIPLE_REQUEST, OP_WRITE,
    TAG_CROSS_FIRST, TAG_CROSS_SECOND, WRITE_ACK,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

// ---------
// | Types |
// ---------

/// Configuration of one party process
#[derive(Clone, Debug)]
pub struct PartyConfig {
    /// Role label; decides residual ordering and cross-term sides
    pub role: Role,
    /// Number of logical rows in the shared memory
    pub rows: u32,
    /// Address of the peer's residual listener
    pub peer: String,
    /// Address of the dealer
    pub dealer: String,
    /// How long a read may wait for the dealer to pair its triple request
    pub dealer_timeout: Duration,
}

/// A running party: its memory share plus both listeners
pub struct Party {
    /// Static configuration
    cfg: PartyConfig,
    /// This party's additive share of the memory vector
    share: Vec<i64>,
    /// Listener for client requests, served serially
    user_listener: TcpListener,
    /// Listener for peer residuals, one accept per exchange
    peer_listener: TcpListener,
}

// ------------------------
// | Party Implementation |
// ------------------------

impl Party {
    /// Assemble a party from pre-bound listeners, memory zeroed
    pub fn new(cfg: PartyConfig, user_listener: TcpListener, peer_listener: TcpListener) -> Self {
        let share = vec![0i64; cfg.rows as usize];
        Self { cfg, share, user_listener, peer_listener }
    }

    /// Address of the client-facing listener
    pub fn user_addr(&self) -> std::io::Result<SocketAddr> {
        self.user_listener.local_addr()
    }

    /// Address of the residual listener
    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.peer_listener.local_addr()
    }

    /// Serve client requests forever, strictly one at a time
    pub async fn serve(mut self) -> std::io::Result<()> {
        info!(role = ?self.cfg.role, rows = self.cfg.rows, "party serving");
        loop {
            let (conn, addr) = self.user_listener.accept().await?;
            if let Err(err) = self.handle_user_conn(conn).await {
                // The failed connection is already closed; the next request
                // is unaffected.
                warn!(%addr, %err, "request aborted");
            }
        }
    }

    /// Dispatch one client connection by op byte
    async fn handle_user_conn(&mut self, mut conn: TcpStream) -> Result<(), ServiceError> {
        let op = conn.read_u8().await.map_err(ProtocolError::Io)?;
        match op {
            OP_WRITE => self.handle_write(conn).await,
            OP_READ => self.handle_read(conn).await,
            other => Err(ProtocolError::UnknownOp(other).into()),
        }
    }

    /// Accumulate a basis-vector share into the memory
    async fn handle_write(&mut self, mut conn: TcpStream) -> Result<(), ServiceError> {
        let vec = self.read_request_vec(&mut conn).await?;
        ring::add_assign(&mut self.share, &vec);
        conn.write_all(&WRITE_ACK).await.map_err(ProtocolError::Io)?;
        debug!(role = ?self.cfg.role, "write applied");
        Ok(())
    }

    /// Run the secure inner product and reply with this party's share
    async fn handle_read(&mut self, mut conn: TcpStream) -> Result<(), ServiceError> {
        let e_share = self.read_request_vec(&mut conn).await?;

        let fetch = fetch_triple(&self.cfg.dealer, self.cfg.rows);
        let triple = match timeout(self.cfg.dealer_timeout, fetch).await {
            Ok(res) => res?,
            Err(_elapsed) => return Err(ServiceError::DealerTimeout(self.cfg.dealer_timeout)),
        };

        // First cross-term: A's memory share against B's selector share.
        // The second swaps the sides. Both consume the same triple.
        let (first_side, first_input, second_side, second_input) = match self.cfg.role {
            Role::A => (Side::X, &self.share, Side::Y, &e_share),
            Role::B => (Side::Y, &e_share, Side::X, &self.share),
        };
        let z_first = exchange::cross_term(
            self.cfg.role,
            first_side,
            first_input,
            &triple,
            TAG_CROSS_FIRST,
            &self.peer_listener,
            &self.cfg.peer,
        )
        .await?;
        let z_second = exchange::cross_term(
            self.cfg.role,
            second_side,
            second_input,
            &triple,
            TAG_CROSS_SECOND,
            &self.peer_listener,
            &self.cfg.peer,
        )
        .await?;

        let my_share =
            ring::dot(&self.share, &e_share).wrapping_add(z_first).wrapping_add(z_second);
        conn.write_i64(my_share).await.map_err(ProtocolError::Io)?;
        debug!(role = ?self.cfg.role, sid = triple.sid, "read served");
        Ok(())
    }

    /// Read `[dim:u32][dim × i64]` and insist the dimension equals `rows`
    async fn read_request_vec(&self, conn: &mut TcpStream) -> Result<Vec<i64>, ServiceError> {
        let vec = codec::read_vec(conn).await?;
        if vec.len() as u32 != self.cfg.rows {
            let got = vec.len() as u32;
            return Err(ProtocolError::DimMismatch { expected: self.cfg.rows, got }.into());
        }
        Ok(vec)
    }
}

/// Fetch one triple share from the dealer
pub async fn fetch_triple(dealer: &str, dim: u32) -> Result<TripleShare, ServiceError> {
    let mut conn = TcpStream::connect(dealer).await?;

    let mut buf = Vec::with_capacity(5);
    buf.push(OP_TRIPLE_REQUEST);
    buf.extend_from_slice(&dim.to_be_bytes());
    conn.write_all(&buf).await.map_err(ProtocolError::Io)?;

    Ok(TripleShare::read(&mut conn, dim).await?)
}
