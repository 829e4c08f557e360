//! Fixed-width text storage striped across logical rows
//!
//! A text slot occupies [`STR_WIDTH`] consecutive rows of a widened memory:
//! slot `idx` maps to rows `[STR_WIDTH·idx, STR_WIDTH·(idx+1))`, one
//! character code per row. Because the underlying write accumulates, an
//! update first reads the stored codes back and then writes the delta to
//! each row.

use crate::{coordinator, ServiceError};
use duoram_api::ring;
use rand::thread_rng;
use tracing::warn;

/// Number of rows a single text slot occupies
pub const STR_WIDTH: u32 = 10;

/// Rows of the widened memory backing `dim` text slots
pub fn backing_rows(dim: u32) -> u32 {
    dim * STR_WIDTH
}

/// Store `text` at slot `idx`, truncating beyond [`STR_WIDTH`] characters
pub async fn put(
    c0: &str,
    c1: &str,
    dim: u32,
    idx: u32,
    text: &str,
) -> Result<(), ServiceError> {
    let rows = backing_rows(dim);

    let mut codes = [0i64; STR_WIDTH as usize];
    let mut chars = text.chars();
    for code in codes.iter_mut() {
        match chars.next() {
            Some(ch) => *code = ch as i64,
            None => break,
        }
    }
    if chars.next().is_some() {
        warn!(limit = STR_WIDTH, "truncating text to the slot width");
    }

    // Read the stored codes back, then push one combined delta write per
    // party so the accumulating rows land exactly on the new codes.
    let stored = read_codes(c0, c1, dim, idx).await?;
    let mut rng = thread_rng();
    let mut delta0 = vec![0i64; rows as usize];
    let mut delta1 = vec![0i64; rows as usize];
    for (offset, (new, old)) in codes.iter().zip(&stored).enumerate() {
        let row = STR_WIDTH * idx + offset as u32;
        let (e, f) = coordinator::basis_shares(&mut rng, rows, row, new.wrapping_sub(*old));
        ring::add_assign(&mut delta0, &e);
        ring::add_assign(&mut delta1, &f);
    }

    let (r0, r1) = tokio::join!(
        coordinator::write_share(c0, &delta0),
        coordinator::write_share(c1, &delta1),
    );
    r0?;
    r1
}

/// Load the text stored at slot `idx`, trimming trailing NUL rows
pub async fn get(c0: &str, c1: &str, dim: u32, idx: u32) -> Result<String, ServiceError> {
    let codes = read_codes(c0, c1, dim, idx).await?;

    let mut out = String::with_capacity(STR_WIDTH as usize);
    for code in codes {
        out.push(char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    Ok(out.trim_end_matches('\0').to_string())
}

/// Securely read the [`STR_WIDTH`] rows backing one slot
///
/// Rows are read one at a time: the parties serve requests serially and
/// the dealer pairs in FIFO order, so interleaving reads could correlate
/// mismatched sessions across the two parties.
async fn read_codes(c0: &str, c1: &str, dim: u32, idx: u32) -> Result<Vec<i64>, ServiceError> {
    let rows = backing_rows(dim);
    let mut codes = Vec::with_capacity(STR_WIDTH as usize);
    for offset in 0..STR_WIDTH {
        codes.push(coordinator::read(c0, c1, rows, STR_WIDTH * idx + offset).await?);
    }
    Ok(codes)
}
