//! Change-detection hash over message ids.
//!
//! A cheap, order-sensitive fingerprint used to skip re-decrypting a history
//! page that has not changed since the last poll. It only covers ids: an edit
//! that keeps the id is invisible to it.

const MULTIPLIER: u64 = 0x4F25;
const MASK:       u64 = 0x7FFF_FFFF;

/// 31-bit hash of `ids` in order.
///
/// `h = ((h * 0x4F25) mod 2^31 + id) mod 2^31`, starting from 0.
pub fn item_hash<I>(ids: I) -> u32
where
    I: IntoIterator<Item = i64>,
{
    let h = ids.into_iter().fold(0u64, |h, id| {
        let mixed = (h * MULTIPLIER) & MASK;
        (mixed as i64).wrapping_add(id) as u64 & MASK
    });
    h as u32
}
