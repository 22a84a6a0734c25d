mod bitset;
mod composite_file;
mod counting_writer;
mod serialize;
mod vint;

pub use self::bitset::BitSet;
pub use self::composite_file::{CompositeFile, CompositeWrite};
pub use self::counting_writer::CountingWriter;
pub use self::serialize::{BinarySerializable, FixedSize};
pub use self::vint::VInt;

/// Maps a `u64` to itself. Here for symmetry with the signed/float mappings.
#[inline(always)]
pub fn u64_to_sortable(val: u64) -> u64 {
    val
}

/// Maps an `i64` to a `u64` so that the natural order of the `u64`s
/// matches the natural order of the original `i64`s.
#[inline(always)]
pub fn i64_to_sortable(val: i64) -> u64 {
    (val as u64) ^ (1u64 << 63)
}

/// Inverse of [`i64_to_sortable`].
#[inline(always)]
pub fn sortable_to_i64(val: u64) -> i64 {
    (val ^ (1u64 << 63)) as i64
}

/// Maps an `f64` to a `u64` monotonically: for finite floats `a < b`
/// implies `map(a) < map(b)`.
///
/// Positive floats flip only the sign bit, negative floats flip every bit.
#[inline(always)]
pub fn f64_to_sortable(val: f64) -> u64 {
    let bits = val.to_bits();
    if bits & (1u64 << 63) == 0 {
        bits | (1u64 << 63)
    } else {
        !bits
    }
}

/// Inverse of [`f64_to_sortable`].
#[inline(always)]
pub fn sortable_to_f64(val: u64) -> f64 {
    let bits = if val & (1u64 << 63) != 0 {
        val & !(1u64 << 63)
    } else {
        !val
    };
    f64::from_bits(bits)
}
