//! Fixed, little-endian wire types for redistribution fragments.
//!
//! Fragments carry raw values only: a grid fragment is a run of [`WireValue`],
//! a point fragment a run of [`WireCoord`] (`dim` per point). Sizes are
//! therefore `len * 8` bytes and both ends can compute them in advance.

use bytemuck::{Pod, Zeroable};
use bytes::Bytes;
use static_assertions::{assert_eq_align, assert_eq_size};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// One grid scalar on the wire.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireValue {
    pub v_le: u64,
}

impl WireValue {
    pub const SIZE: usize = 8;

    pub fn of(v: u64) -> Self {
        Self { v_le: v.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.v_le)
    }
}

/// One point coordinate on the wire (IEEE-754 bits).
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCoord {
    pub bits_le: u64,
}

impl WireCoord {
    pub const SIZE: usize = 8;

    pub fn of(x: f64) -> Self {
        Self {
            bits_le: x.to_bits().to_le(),
        }
    }
    pub fn get(&self) -> f64 {
        f64::from_bits(u64::from_le(self.bits_le))
    }
}

/// Readiness sentinel. Its value carries no meaning.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireSentinel {
    pub rank_le: u32,
}

impl WireSentinel {
    pub fn new(rank: usize) -> Self {
        Self {
            rank_le: (rank as u32).to_le(),
        }
    }
}

assert_eq_size!(WireValue, u64);
assert_eq_size!(WireCoord, u64);
assert_eq_size!(WireSentinel, u32);
assert_eq_align!(WireValue, u64);

/// Encode grid values into an owned send buffer.
pub fn encode_values<I: IntoIterator<Item = u64>>(values: I) -> Bytes {
    let wire: Vec<WireValue> = values.into_iter().map(WireValue::of).collect();
    Bytes::copy_from_slice(cast_slice(&wire))
}

/// Encode point coordinates into an owned send buffer.
pub fn encode_coords(coords: &[f64]) -> Bytes {
    let wire: Vec<WireCoord> = coords.iter().copied().map(WireCoord::of).collect();
    Bytes::copy_from_slice(cast_slice(&wire))
}

/// Decode grid values. `bytes.len()` must be a multiple of 8.
pub fn decode_values(bytes: &[u8]) -> impl Iterator<Item = u64> + '_ {
    // Received buffers carry no alignment guarantee.
    bytes
        .chunks_exact(WireValue::SIZE)
        .map(|c| bytemuck::pod_read_unaligned::<WireValue>(c).get())
}

/// Decode point coordinates. `bytes.len()` must be a multiple of 8.
pub fn decode_coords(bytes: &[u8]) -> impl Iterator<Item = f64> + '_ {
    bytes
        .chunks_exact(WireCoord::SIZE)
        .map(|c| bytemuck::pod_read_unaligned::<WireCoord>(c).get())
}
