//! Client-side coordination: share splitting and the two-party fan-out
//!
//! The coordinator holds the plaintext request. It splits every vector into
//! two additive shares, talks to both parties in parallel, and reconstructs
//! a read by summing the returned shares. Neither party alone sees anything
//! but a uniformly masked vector.

use crate::ServiceError;
use duoram_api::{codec, ProtocolError, OP_READ, OP_WRITE, WRITE_ACK};
use rand::{thread_rng, Rng};
use std::ops::RangeInclusive;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Sampling range for client-side blinding vectors
const BLIND_RANGE: RangeInclusive<i64> = 1..=1024;

/// Additive shares of `val · e_idx`
///
/// The blinding vector is drawn independently of `val`, so either share
/// alone reveals nothing about the request. The first share goes to party
/// A, the second to party B.
pub fn basis_shares<R: Rng>(rng: &mut R, dim: u32, idx: u32, val: i64) -> (Vec<i64>, Vec<i64>) {
    let blind: Vec<i64> = (0..dim).map(|_| rng.gen_range(BLIND_RANGE)).collect();

    let mut masked = vec![0i64; dim as usize];
    masked[idx as usize] = val;
    for (m, f) in masked.iter_mut().zip(&blind) {
        *m = m.wrapping_sub(*f);
    }
    (masked, blind)
}

/// Write `val` at `idx`: each party accumulates one share of `val · e_idx`
pub async fn write(c0: &str, c1: &str, dim: u32, idx: u32, val: i64) -> Result<(), ServiceError> {
    let (e, f) = basis_shares(&mut thread_rng(), dim, idx, val);
    let (r0, r1) = tokio::join!(write_share(c0, &e), write_share(c1, &f));
    r0?;
    r1
}

/// Read the value at `idx` by reconstructing the two secure-read shares
pub async fn read(c0: &str, c1: &str, dim: u32, idx: u32) -> Result<i64, ServiceError> {
    let (e, f) = basis_shares(&mut thread_rng(), dim, idx, 1);
    let (s0, s1) = tokio::join!(read_share(c0, &e), read_share(c1, &f));
    Ok(s0?.wrapping_add(s1?))
}

/// Push one share vector to a party and await its acknowledgement
pub(crate) async fn write_share(party: &str, share: &[i64]) -> Result<(), ServiceError> {
    let mut conn = TcpStream::connect(party).await?;

    let mut buf = Vec::with_capacity(5 + 8 * share.len());
    buf.push(OP_WRITE);
    codec::put_vec(&mut buf, share);
    conn.write_all(&buf).await.map_err(ProtocolError::Io)?;

    let mut ack = [0u8; 2];
    conn.read_exact(&mut ack).await.map_err(ProtocolError::Io)?;
    if ack != WRITE_ACK {
        return Err(ProtocolError::BadAck.into());
    }
    Ok(())
}

/// Send one selector share to a party and await its result share
pub(crate) async fn read_share(party: &str, share: &[i64]) -> Result<i64, ServiceError> {
    let mut conn = TcpStream::connect(party).await?;

    let mut buf = Vec::with_capacity(5 + 8 * share.len());
    buf.push(OP_READ);
    codec::put_vec(&mut buf, share);
    conn.write_all(&buf).await.map_err(ProtocolError::Io)?;

    Ok(conn.read_i64().await.map_err(ProtocolError::Io)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use duoram_api::ring;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// The two shares sum back to `val · e_idx`
    #[test]
    fn test_basis_shares_reconstruct() {
        let mut rng = StdRng::seed_from_u64(1);
        let (e, f) = basis_shares(&mut rng, 8, 3, -7000);

        let sum = ring::add(&e, &f);
        for (i, &x) in sum.iter().enumerate() {
            assert_eq!(x, if i == 3 { -7000 } else { 0 });
        }
    }

    /// Extreme values still reconstruct under wraparound
    #[test]
    fn test_basis_shares_wrap() {
        let mut rng = StdRng::seed_from_u64(2);
        let (e, f) = basis_shares(&mut rng, 4, 0, i64::MIN);
        assert_eq!(ring::add(&e, &f)[0], i64::MIN);
    }

    /// The blinding vector does not depend on the written value
    #[test]
    fn test_blinding_independent_of_value() {
        let (_, f1) = basis_shares(&mut StdRng::seed_from_u64(7), 16, 5, 42);
        let (_, f2) = basis_shares(&mut StdRng::seed_from_u64(7), 16, 5, -9_000_000);
        assert_eq!(f1, f2);
    }
}
