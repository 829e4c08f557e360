//! Shared protocol surface for the duoram service
//!
//! The two parties, the dealer and the client coordinator speak a small
//! big-endian binary protocol over TCP. This crate holds the op bytes, the
//! frame types, the wire codec and the ring arithmetic that every endpoint
//! shares.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]
#![deny(clippy::needless_pass_by_value)]

pub mod codec;
pub mod ring;

use codec::{put_raw, put_vec, read_exact_vec, read_vec};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ------------
// | Op Bytes |
// ------------

/// Request op: a party asks the dealer for one triple share
pub const OP_TRIPLE_REQUEST: u8 = 0x31;
/// Response op: the dealer hands back one triple share
pub const OP_TRIPLE_RESPONSE: u8 = 0x33;
/// Request op: the client pushes a basis-vector share into a party
pub const OP_WRITE: u8 = 0x40;
/// Request op: the client asks a party for its share of a secure read
pub const OP_READ: u8 = 0x41;

/// Residual tag of the first cross-term
pub const TAG_CROSS_FIRST: u8 = 0x01;
/// Residual tag of the second cross-term
pub const TAG_CROSS_SECOND: u8 = 0x10;

/// Two-byte acknowledgement a party sends after applying a write
pub const WRITE_ACK: [u8; 2] = *b"OK";

// ----------
// | Errors |
// ----------

/// Errors raised while framing or validating protocol messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Socket failure; EOF mid-frame lands here as `UnexpectedEof`
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// The op byte does not match the protocol state
    #[error("bad op byte: expected {expected:#04x}, got {got:#04x}")]
    BadOp {
        /// The op the receiver was waiting for
        expected: u8,
        /// The op that arrived
        got: u8,
    },
    /// An op byte no handler exists for
    #[error("unknown op byte {0:#04x}")]
    UnknownOp(u8),
    /// A frame advertised a different dimension than the negotiated one
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimMismatch {
        /// The dimension this endpoint serves
        expected: u32,
        /// The dimension carried by the frame
        got: u32,
    },
    /// Zero-dimension requests are not serviceable
    #[error("zero dimension")]
    ZeroDim,
    /// A residual frame did not carry the expected session id and tag
    #[error(
        "residual header mismatch: expected sid={expected_sid} tag={expected_tag:#04x}, \
         got sid={sid} tag={tag:#04x}"
    )]
    ResidualMismatch {
        /// Session id this read is correlated under
        expected_sid: i64,
        /// Cross-term tag the receiver is waiting on
        expected_tag: u8,
        /// Session id on the wire
        sid: i64,
        /// Tag on the wire
        tag: u8,
    },
    /// A write was acknowledged with something other than `OK`
    #[error("bad write acknowledgement")]
    BadAck,
}

// ----------
// | Frames |
// ----------

/// One party's additive share of a Beaver triple `(a, b, c)` with `c = a · b`
///
/// The dealer splits each component additively: summing the two shares dealt
/// under one session id recovers a triple satisfying the equation in the
/// wrapping i64 ring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TripleShare {
    /// Session id correlating the two halves of one triple
    pub sid: i64,
    /// This party's share of the `a` vector
    pub a: Vec<i64>,
    /// This party's share of the `b` vector
    pub b: Vec<i64>,
    /// This party's share of the scalar `c`
    pub c: i64,
}

impl TripleShare {
    /// Dimension of the triple vectors
    pub fn dim(&self) -> u32 {
        self.a.len() as u32
    }

    /// Frame the share as a dealer response: `[op][dim][sid][a][b][c]`
    pub async fn write<W: AsyncWrite + Unpin>(&self, w: &mut W) -> Result<(), ProtocolError> {
        let mut buf = Vec::with_capacity(13 + 16 * self.a.len() + 8);
        buf.push(OP_TRIPLE_RESPONSE);
        buf.extend_from_slice(&self.dim().to_be_bytes());
        buf.extend_from_slice(&self.sid.to_be_bytes());
        put_raw(&mut buf, &self.a);
        put_raw(&mut buf, &self.b);
        buf.extend_from_slice(&self.c.to_be_bytes());
        w.write_all(&buf).await?;
        Ok(())
    }

    /// Read a dealer response, checking the op byte and the dimension
    pub async fn read<R: AsyncRead + Unpin>(
        r: &mut R,
        expected_dim: u32,
    ) -> Result<Self, ProtocolError> {
        codec::expect_op(r, OP_TRIPLE_RESPONSE).await?;
        let dim = r.read_u32().await?;
        if dim != expected_dim {
            return Err(ProtocolError::DimMismatch { expected: expected_dim, got: dim });
        }

        let sid = r.read_i64().await?;
        let a = read_exact_vec(r, dim).await?;
        let b = read_exact_vec(r, dim).await?;
        let c = r.read_i64().await?;
        Ok(Self { sid, a, b, c })
    }
}

/// One side's half of a residual opening for a single cross-term
///
/// The peers swap these to open `u = x − a` and `v = y − b`; the opened
/// vectors are uniform because `a` and `b` are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Residual {
    /// Session id of the triple the residual belongs to
    pub sid: i64,
    /// Cross-term tag, [`TAG_CROSS_FIRST`] or [`TAG_CROSS_SECOND`]
    pub tag: u8,
    /// This side's additive part of `u`
    pub u_part: Vec<i64>,
    /// This side's additive part of `v`
    pub v_part: Vec<i64>,
}

impl Residual {
    /// Frame the residual: `[sid][tag][|u|][u..][|v|][v..]`
    pub async fn write<W: AsyncWrite + Unpin>(&self, w: &mut W) -> Result<(), ProtocolError> {
        let mut buf = Vec::with_capacity(9 + 8 + 8 * (self.u_part.len() + self.v_part.len()));
        buf.extend_from_slice(&self.sid.to_be_bytes());
        buf.push(self.tag);
        put_vec(&mut buf, &self.u_part);
        put_vec(&mut buf, &self.v_part);
        w.write_all(&buf).await?;
        Ok(())
    }

    /// Read a residual and insist on the expected header and dimension
    pub async fn read_expected<R: AsyncRead + Unpin>(
        r: &mut R,
        expected_sid: i64,
        expected_tag: u8,
        dim: u32,
    ) -> Result<Self, ProtocolError> {
        let sid = r.read_i64().await?;
        let tag = r.read_u8().await?;
        if sid != expected_sid || tag != expected_tag {
            return Err(ProtocolError::ResidualMismatch { expected_sid, expected_tag, sid, tag });
        }

        let u_part = read_vec(r).await?;
        let v_part = read_vec(r).await?;
        for part in [&u_part, &v_part] {
            if part.len() as u32 != dim {
                return Err(ProtocolError::DimMismatch { expected: dim, got: part.len() as u32 });
            }
        }

        Ok(Self { sid, tag, u_part, v_part })
    }
}
