//! A fixed-size array of bits.

use crate::bit_store::BitStore;

/// A fixed-size array of bits with `[u64]` word storage.
///
/// # Storage Format
///
/// Bits are stored in little-endian order within an array of `u64` words:
/// - Bit 0 corresponds to the least significant bit (LSB) of the first word
/// - Bit 63 corresponds to the most significant bit (MSB) of the first word
/// - Bit 64 corresponds to the LSB of the second word, and so on
///
/// The number of words allocated is `len.div_ceil(64)`. Any bits beyond the array's
/// length in the final word are guaranteed to be 0, so population counts never need
/// to look at the tail separately.
///
/// # Performance
///
/// - Individual bit access: O(1)
/// - Whole-array copy and subset checks: O(n/64)
/// - Count operations: O(n/64) using popcount instructions
#[derive(Clone, PartialEq, Eq)]
pub struct BitArrayBase<S> {
    len: usize,
    bits: S,
}

impl<S: AsMut<[u64]>> BitArrayBase<S> {
    /// Creates a new bit array with all bits set to 0.
    pub fn empty(len: usize) -> BitArrayBase<S>
    where
        S: BitStore,
    {
        let count = len.div_ceil(64);
        let bits = S::new_zeroed(count);
        BitArrayBase { len, bits }
    }

    /// Creates a new bit array with bits set at the specified positions.
    ///
    /// # Panics
    ///
    /// In debug builds, if any position is `>= len`.
    pub fn from_positions(positions: impl Iterator<Item = usize>, len: usize) -> BitArrayBase<S>
    where
        S: BitStore,
    {
        let mut bit_array = BitArrayBase::empty(len);
        for position in positions {
            bit_array.set(position);
        }
        bit_array
    }

    /// Creates a new bit array from bytes in LSB order: bit 0 is the LSB of the first
    /// byte, bit 8 the LSB of the second byte, and so on.
    ///
    /// Missing trailing bytes read as zero; bits beyond `len` are dropped.
    pub fn from_lsb_bytes(bytes: &[u8], len: usize) -> BitArrayBase<S>
    where
        S: BitStore,
    {
        let mut bit_array = BitArrayBase::empty(len);
        let byte_len = len.div_ceil(8).min(bytes.len());
        if byte_len != 0 {
            bytemuck::cast_slice_mut::<_, u8>(bit_array.storage_mut())[..byte_len]
                .copy_from_slice(&bytes[..byte_len]);
        }
        Self::mask_tail(bit_array.storage_mut(), len);
        bit_array
    }

    /// Sets the bit at the given index to 1.
    #[inline]
    pub fn set(&mut self, index: usize) {
        debug_assert!(
            index < self.len,
            "Index {index} out of bounds (len: {})",
            self.len
        );
        let (word_index, bit_position) = Self::bit_position(index);
        self.storage_mut()[word_index] |= 1u64 << bit_position;
    }

    /// Overwrites this array with the contents of `other`, reusing the existing storage.
    ///
    /// # Panics
    ///
    /// If the lengths differ.
    pub fn copy_from<S1: AsRef<[u64]>>(&mut self, other: &BitArrayBase<S1>) {
        assert_eq!(
            self.len, other.len,
            "BitArrays must have the same length for copy: {} != {}",
            self.len, other.len
        );
        self.storage_mut().copy_from_slice(other.storage());
    }

    #[inline]
    fn storage_mut(&mut self) -> &mut [u64] {
        self.bits.as_mut()
    }
}

impl<S: AsRef<[u64]>> BitArrayBase<S> {
    /// Check if the bit at the given index is set.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        debug_assert!(
            index < self.len,
            "Index {index} out of bounds (len: {})",
            self.len
        );
        let (word_index, bit_position) = Self::bit_position(index);
        (self.storage()[word_index] & (1u64 << bit_position)) != 0
    }

    /// Counts the number of set bits (1s) in the bit array.
    pub fn count_ones(&self) -> usize {
        self.storage()
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// Counts the number of unset bits (0s) in the bit array.
    pub fn count_zeros(&self) -> usize {
        self.len - self.count_ones()
    }

    /// Returns `true` when every bit set in `other` is also set in `self`.
    pub fn is_superset_of<S1: AsRef<[u64]>>(&self, other: &BitArrayBase<S1>) -> bool {
        self.len == other.len
            && self
                .storage()
                .iter()
                .zip(other.storage().iter())
                .all(|(&l, &r)| r & !l == 0)
    }

    /// Returns an iterator over the positions of set bits, in ascending order.
    pub fn iter(&self) -> BitArrayIter<'_> {
        BitArrayIter {
            words: self.storage().iter(),
            current_word: 0,
            next_word_index: 0,
            base_index: 0,
            len: self.len,
        }
    }

    /// Serializes the bits in LSB byte order, `len.div_ceil(8)` bytes long.
    ///
    /// This is the inverse of [`BitArrayBase::from_lsb_bytes`].
    pub fn to_lsb_bytes(&self) -> Vec<u8> {
        let byte_len = self.len.div_ceil(8);
        bytemuck::cast_slice::<u64, u8>(self.storage())[..byte_len].to_vec()
    }

    #[inline]
    fn storage(&self) -> &[u64] {
        self.bits.as_ref()
    }
}

impl<S> BitArrayBase<S> {
    /// Returns the number of bits in the array.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the bit array has zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn bit_position(index: usize) -> (usize, usize) {
        (index / 64, index % 64)
    }

    /// Zeroes any bits beyond `len` in the last storage word.
    ///
    /// # Panics
    ///
    /// If `bits` is too short for `len`, or has a fully unused trailing word.
    #[inline]
    pub(crate) fn mask_tail(bits: &mut [u64], len: usize) {
        let raw_len = bits.len() * 64;
        assert!(raw_len >= len, "{raw_len} >= {len}");
        assert!(raw_len - len < 64, "{raw_len} - {len}");

        let partial = len % 64;
        if partial == 0 {
            return;
        }
        if let Some(last) = bits.last_mut() {
            *last &= (1u64 << partial) - 1;
        }
    }
}

impl<S: AsRef<[u64]>> std::fmt::Debug for BitArrayBase<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitArray")
            .field("len", &self.len)
            .field("ones", &self.count_ones())
            .finish()
    }
}

/// An iterator over the positions of set bits in a `BitArray`.
#[derive(Clone)]
pub struct BitArrayIter<'a> {
    words: std::slice::Iter<'a, u64>,
    current_word: u64,
    next_word_index: usize,
    base_index: usize,
    len: usize,
}

impl<'a> Iterator for BitArrayIter<'a> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit_offset = self.current_word.trailing_zeros() as usize;
                let index = self.base_index + bit_offset;
                if index >= self.len {
                    return None;
                }
                // Clear the least significant set bit
                self.current_word &= self.current_word - 1;
                return Some(index);
            }

            match self.words.next() {
                Some(&word) => {
                    self.current_word = word;
                    self.base_index = self.next_word_index * 64;
                    self.next_word_index += 1;
                }
                None => return None,
            }
        }
    }
}

pub type BitArray = BitArrayBase<Box<[u64]>>;
