//! Hash functions for routing keys to reducers.
//!
//! Every process that takes part in a job must agree on which reducer owns a
//! key, whatever language it is written in. The algorithms here are
//! therefore specified bit for bit, including the 32-bit wraparound, and are
//! not tuned for speed.

/// FNV-1a 32-bit offset basis.
pub const FNV_OFFSET_BASIS: u32 = 2_166_136_261;

/// FNV-1a 32-bit prime.
pub const FNV_PRIME: u32 = 16_777_619;

const DJB2_SEED: u32 = 5381;

/// 32-bit FNV-1a: XOR each byte into the accumulator, then multiply by the
/// FNV prime modulo 2^32.
pub fn fnv1a_32(bytes: impl AsRef<[u8]>) -> u32 {
    bytes.as_ref().iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Bernstein's DJB2, XOR variant.
///
/// Distributes our keys poorly; kept so that older partition layouts can
/// still be reproduced.
pub fn djb2(bytes: impl AsRef<[u8]>) -> u32 {
    bytes
        .as_ref()
        .iter()
        .fold(DJB2_SEED, |hash, &b| hash.wrapping_mul(33) ^ u32::from(b))
}

/// The current partitioning hash.
#[inline]
pub fn of(bytes: impl AsRef<[u8]>) -> u32 {
    fnv1a_32(bytes)
}

/// Index of the reducer that receives `key`: `of(key) % reducer_count`.
///
/// # Panics
///
/// Panics if `reducer_count` is zero.
#[inline]
pub fn reducer_for(key: impl AsRef<[u8]>, reducer_count: u32) -> u32 {
    of(key) % reducer_count
}

/// Divides the inclusive integer range `min..=max` into `bin_count` bins of
/// consecutive integers, numbered from 0, and returns the bin holding `x`.
///
/// The top edge (and any float rounding near it) is clamped into the last
/// bin, values below `min` land in bin 0, and a degenerate range where
/// `max <= min` puts everything in bin 0.
pub fn consecutive(x: i64, bin_count: u32, min: i64, max: i64) -> u32 {
    let last = bin_count.saturating_sub(1);
    if max <= min {
        return 0;
    }
    // Offsets can exceed i64 for wide ranges.
    let per_bin = (i128::from(max) - i128::from(min)) as f64 / f64::from(bin_count);
    let bin = ((i128::from(x) - i128::from(min)) as f64 / per_bin).min(f64::from(last));
    // `as` saturates: negative offsets become 0.
    bin.floor() as u32
}
