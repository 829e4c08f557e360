//! Big-endian wire primitives
//!
//! Three integer widths travel on the wire: `u8`, `u32` and `i64`. A vector
//! is a `u32` count followed by that many `i64` elements. All reads are
//! exact; EOF inside a frame is fatal for the connection.

use crate::ProtocolError;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read one op byte and check it against the expected value
pub async fn expect_op<R: AsyncRead + Unpin>(r: &mut R, expected: u8) -> Result<(), ProtocolError> {
    let got = r.read_u8().await?;
    if got != expected {
        return Err(ProtocolError::BadOp { expected, got });
    }
    Ok(())
}

/// Read a `u32`-prefixed vector of `i64`
pub async fn read_vec<R: AsyncRead + Unpin>(r: &mut R) -> Result<Vec<i64>, ProtocolError> {
    let len = r.read_u32().await?;
    read_exact_vec(r, len).await
}

/// Read exactly `n` `i64` elements with no count prefix
pub async fn read_exact_vec<R: AsyncRead + Unpin>(
    r: &mut R,
    n: u32,
) -> Result<Vec<i64>, ProtocolError> {
    let mut buf = vec![0u8; n as usize * 8];
    r.read_exact(&mut buf).await?;

    let vec = buf
        .chunks_exact(8)
        .map(|chunk| i64::from_be_bytes(chunk.try_into().unwrap()))
        .collect();
    Ok(vec)
}

/// Append a `u32`-prefixed vector of `i64` to an outgoing frame
pub fn put_vec(buf: &mut Vec<u8>, v: &[i64]) {
    buf.extend_from_slice(&(v.len() as u32).to_be_bytes());
    put_raw(buf, v);
}

/// Append raw `i64` elements with no count prefix
pub fn put_raw(buf: &mut Vec<u8>, v: &[i64]) {
    for x in v {
        buf.extend_from_slice(&x.to_be_bytes());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Prefixed vectors survive a write/read cycle
    #[tokio::test]
    async fn test_vec_round_trip() {
        let v = vec![0i64, -1, i64::MIN, i64::MAX, 1024];

        let mut buf = Vec::new();
        put_vec(&mut buf, &v);
        assert_eq!(buf.len(), 4 + 8 * v.len());

        let parsed = read_vec(&mut buf.as_slice()).await.unwrap();
        assert_eq!(v, parsed);
    }

    /// A short buffer fails instead of yielding a partial vector
    #[tokio::test]
    async fn test_short_read_is_fatal() {
        let mut buf = Vec::new();
        put_vec(&mut buf, &[1, 2, 3]);
        buf.truncate(buf.len() - 4);

        assert!(read_vec(&mut buf.as_slice()).await.is_err());
    }

    /// An op byte other than the expected one is rejected
    #[tokio::test]
    async fn test_expect_op() {
        let buf = [0x31u8];
        expect_op(&mut buf.as_slice(), 0x31).await.unwrap();

        let buf = [0x77u8];
        let err = expect_op(&mut buf.as_slice(), 0x31).await.unwrap_err();
        assert!(matches!(err, ProtocolError::BadOp { expected: 0x31, got: 0x77 }));
    }
}
