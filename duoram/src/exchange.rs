//! Residual transport and the Du–Atallah cross-term
//!
//! Each secure read reduces to the inner product of two additively shared
//! vectors. The self-terms are local; the two cross-terms are evaluated
//! with one shared triple and two residual exchanges, distinguished only by
//! tag. Party A always sends its residual before receiving and party B
//! always receives before sending, which breaks the symmetric deadlock
//! without extra synchronisation.

use crate::{Role, ServiceError};
use duoram_api::{ring, Residual, TripleShare};
use tokio::net::{TcpListener, TcpStream};

/// The side of the cross-term multiplication a party plays
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Holds the `x` input and masks it with its `a` share
    X,
    /// Holds the `y` input and masks it with its `b` share
    Y,
}

/// Evaluate one cross-term of the shared inner product
///
/// Returns this party's additive share of `x · y`, where `x` is the X-side
/// input and `y` the Y-side input. Both parties must hold triple shares
/// correlated under the same session id; the tag routes the residuals of
/// the two cross-terms sharing that triple.
pub async fn cross_term(
    role: Role,
    side: Side,
    my_input: &[i64],
    triple: &TripleShare,
    tag: u8,
    peer_listener: &TcpListener,
    peer_addr: &str,
) -> Result<i64, ServiceError> {
    let dim = triple.dim();
    let (u_mine, v_mine) = match side {
        Side::X => (ring::sub(my_input, &triple.a), ring::neg(&triple.b)),
        Side::Y => (ring::neg(&triple.a), ring::sub(my_input, &triple.b)),
    };
    let mine = Residual { sid: triple.sid, tag, u_part: u_mine, v_part: v_mine };

    let theirs = match role {
        Role::A => {
            send_residual(peer_addr, &mine).await?;
            recv_residual(peer_listener, triple.sid, tag, dim).await?
        },
        Role::B => {
            let theirs = recv_residual(peer_listener, triple.sid, tag, dim).await?;
            send_residual(peer_addr, &mine).await?;
            theirs
        },
    };

    // The opened maskings: u = x − a and v = y − b.
    let u = ring::add(&mine.u_part, &theirs.u_part);
    let v = ring::add(&mine.v_part, &theirs.v_part);

    let mut z = ring::dot(&u, &triple.b)
        .wrapping_add(ring::dot(&triple.a, &v))
        .wrapping_add(triple.c);
    if role == Role::B {
        // The u·v term is credited to exactly one side.
        z = z.wrapping_add(ring::dot(&u, &v));
    }
    Ok(z)
}

/// Open a fresh peer connection and push one residual frame
async fn send_residual(peer_addr: &str, residual: &Residual) -> Result<(), ServiceError> {
    let mut conn = TcpStream::connect(peer_addr).await?;
    residual.write(&mut conn).await?;
    Ok(())
}

/// Accept one peer connection and read the matching residual frame
async fn recv_residual(
    listener: &TcpListener,
    sid: i64,
    tag: u8,
    dim: u32,
) -> Result<Residual, ServiceError> {
    let (mut conn, _) = listener.accept().await?;
    Ok(Residual::read_expected(&mut conn, sid, tag, dim).await?)
}
