//! Dense fixed-length bitsets used for document deletion masks.

pub mod bit_array;
pub mod bit_store;

pub use bit_array::BitArray;
