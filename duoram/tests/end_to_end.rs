//! End-to-end scenarios: dealer, both parties and client coordination over
//! loopback sockets

use duoram::coordinator;
use duoram::dealer::Dealer;
use duoram::party::{Party, PartyConfig};
use duoram::strings;
use duoram::Role;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Client endpoints of a freshly started deployment
struct Deployment {
    /// Party A's client-facing address
    a: String,
    /// Party B's client-facing address
    b: String,
}

/// Bind a listener on an ephemeral loopback port
async fn bind() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

/// Start a dealer and both parties on ephemeral ports
async fn start(rows: u32) -> Deployment {
    let dealer_ls = bind().await;
    let dealer = dealer_ls.local_addr().unwrap().to_string();
    tokio::spawn(Dealer::new(Duration::from_secs(10)).serve(dealer_ls));

    let (a_user, a_peer) = (bind().await, bind().await);
    let (b_user, b_peer) = (bind().await, bind().await);
    let a_peer_addr = a_peer.local_addr().unwrap().to_string();
    let b_peer_addr = b_peer.local_addr().unwrap().to_string();

    let party_a = Party::new(
        PartyConfig {
            role: Role::A,
            rows,
            peer: b_peer_addr,
            dealer: dealer.clone(),
            dealer_timeout: Duration::from_secs(2),
        },
        a_user,
        a_peer,
    );
    let party_b = Party::new(
        PartyConfig {
            role: Role::B,
            rows,
            peer: a_peer_addr,
            dealer,
            dealer_timeout: Duration::from_secs(2),
        },
        b_user,
        b_peer,
    );
    let a = party_a.user_addr().unwrap().to_string();
    let b = party_b.user_addr().unwrap().to_string();
    tokio::spawn(party_a.serve());
    tokio::spawn(party_b.serve());

    Deployment { a, b }
}

/// Frame a well-formed READ request for `dim` zeroed selector shares
fn read_request_bytes(dim: u32) -> Vec<u8> {
    let mut buf = vec![0x41u8];
    buf.extend_from_slice(&dim.to_be_bytes());
    for _ in 0..dim {
        buf.extend_from_slice(&0i64.to_be_bytes());
    }
    buf
}

#[tokio::test]
async fn test_write_then_read() {
    let d = start(4).await;

    coordinator::write(&d.a, &d.b, 4, 2, 7).await.unwrap();
    assert_eq!(coordinator::read(&d.a, &d.b, 4, 2).await.unwrap(), 7);
}

#[tokio::test]
async fn test_writes_accumulate() {
    let d = start(4).await;

    coordinator::write(&d.a, &d.b, 4, 2, 7).await.unwrap();
    coordinator::write(&d.a, &d.b, 4, 2, 5).await.unwrap();
    assert_eq!(coordinator::read(&d.a, &d.b, 4, 2).await.unwrap(), 12);
}

#[tokio::test]
async fn test_independent_indices() {
    let d = start(4).await;

    coordinator::write(&d.a, &d.b, 4, 0, 100).await.unwrap();
    coordinator::write(&d.a, &d.b, 4, 3, -50).await.unwrap();

    assert_eq!(coordinator::read(&d.a, &d.b, 4, 0).await.unwrap(), 100);
    assert_eq!(coordinator::read(&d.a, &d.b, 4, 3).await.unwrap(), -50);
    assert_eq!(coordinator::read(&d.a, &d.b, 4, 1).await.unwrap(), 0);
}

#[tokio::test]
async fn test_accumulation_wraps() {
    let d = start(2).await;

    coordinator::write(&d.a, &d.b, 2, 1, i64::MAX).await.unwrap();
    coordinator::write(&d.a, &d.b, 2, 1, 1).await.unwrap();
    assert_eq!(coordinator::read(&d.a, &d.b, 2, 1).await.unwrap(), i64::MIN);
}

#[tokio::test]
async fn test_concurrent_reads() {
    let d = start(4).await;

    coordinator::write(&d.a, &d.b, 4, 1, 11).await.unwrap();
    coordinator::write(&d.a, &d.b, 4, 2, 22).await.unwrap();

    let (r1, r2) = tokio::join!(
        coordinator::read(&d.a, &d.b, 4, 1),
        coordinator::read(&d.a, &d.b, 4, 2),
    );
    assert_eq!(r1.unwrap(), 11);
    assert_eq!(r2.unwrap(), 22);
}

#[tokio::test]
async fn test_lone_party_read_fails() {
    let d = start(4).await;

    // Only party A sees the read, so its triple request never pairs; the
    // reply socket must close without a share inside the dealer timeout.
    let mut conn = TcpStream::connect(&d.a).await.unwrap();
    conn.write_all(&read_request_bytes(4)).await.unwrap();

    let mut reply = [0u8; 8];
    assert!(conn.read_exact(&mut reply).await.is_err());
}

#[tokio::test]
async fn test_malformed_op_does_not_poison_the_party() {
    let d = start(4).await;

    let mut conn = TcpStream::connect(&d.a).await.unwrap();
    conn.write_all(&[0x77]).await.unwrap();
    let mut byte = [0u8; 1];
    assert_eq!(conn.read(&mut byte).await.unwrap(), 0);

    // A well-formed round trip still succeeds afterwards.
    coordinator::write(&d.a, &d.b, 4, 0, 9).await.unwrap();
    assert_eq!(coordinator::read(&d.a, &d.b, 4, 0).await.unwrap(), 9);
}

#[tokio::test]
async fn test_wrong_dimension_write_is_rejected() {
    let d = start(4).await;

    // A write of dimension 3 against 4-row parties must be dropped with no
    // acknowledgement.
    let mut conn = TcpStream::connect(&d.a).await.unwrap();
    let mut buf = vec![0x40u8];
    buf.extend_from_slice(&3u32.to_be_bytes());
    for _ in 0..3 {
        buf.extend_from_slice(&1i64.to_be_bytes());
    }
    conn.write_all(&buf).await.unwrap();
    let mut ack = [0u8; 2];
    assert!(conn.read_exact(&mut ack).await.is_err());

    // The memory is untouched.
    assert_eq!(coordinator::read(&d.a, &d.b, 4, 0).await.unwrap(), 0);
}

#[tokio::test]
async fn test_string_slot_round_trip() {
    let slots = 2u32;
    let d = start(strings::backing_rows(slots)).await;

    strings::put(&d.a, &d.b, slots, 1, "hi").await.unwrap();
    assert_eq!(strings::get(&d.a, &d.b, slots, 1).await.unwrap(), "hi");

    // Overwriting lands on the new text despite the accumulating rows.
    strings::put(&d.a, &d.b, slots, 1, "goodbye").await.unwrap();
    assert_eq!(strings::get(&d.a, &d.b, slots, 1).await.unwrap(), "goodbye");

    // The neighbouring slot is untouched.
    assert_eq!(strings::get(&d.a, &d.b, slots, 0).await.unwrap(), "");
}
