//! Two-party Duoram-style oblivious read/write service
//!
//! A client that trusts neither party alone stores i64 values at secret
//! indices: both the address and the value stay hidden from each party in
//! isolation, while the sum of the two shares reconstructs the truth.
//! Writes are accumulated basis-vector shares and never cross the parties;
//! reads are secure inner products evaluated with one Beaver triple from
//! the dealer and two Du–Atallah cross-term exchanges between the parties.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

pub mod coordinator;
pub mod dealer;
pub mod exchange;
pub mod party;
pub mod strings;

use clap::ValueEnum;
use duoram_api::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Fixed role label of a party process
///
/// The label decides residual ordering and which side of each cross-term
/// the party plays. It is independent of the order in which the dealer
/// pairs the two triple requests of a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Sends each residual before receiving the peer's
    #[value(name = "A")]
    A,
    /// Receives each residual before sending its own
    #[value(name = "B")]
    B,
}

/// Errors raised while serving or issuing duoram requests
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Framing or validation failure on some connection
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Socket setup or transport failure
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// The dealer did not pair this request in time
    #[error("dealer did not pair the request within {0:?}")]
    DealerTimeout(Duration),
    /// A triple request expired or lost its client before a peer arrived
    #[error("triple request for dimension {dim} expired unpaired")]
    Unpaired {
        /// Dimension of the expired request
        dim: u32,
    },
    /// The pairing sequel dropped this request before dealing a share
    #[error("pairing aborted before a share was dealt")]
    PairingAborted,
}
