//! Storage backend abstraction for dense bitsets.
//!
//! [`BitStore`] allocates fixed-length arrays of 64-bit words that back a
//! [`BitArrayBase`](crate::bit_array::BitArrayBase). The `count` parameter is the number
//! of `u64` words, not bits.

/// A storage backend for fixed-length arrays of 64-bit words.
pub trait BitStore {
    /// Allocate `count` words of `u64`, initialized to zero.
    fn new_zeroed(count: usize) -> Self;
}

impl BitStore for Box<[u64]> {
    fn new_zeroed(count: usize) -> Self {
        vec![0u64; count].into_boxed_slice()
    }
}
