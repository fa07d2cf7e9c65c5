//! Fixed-capacity bitmaps over `u32` words.
//!
//! Register descriptors describe which logical registers and sub-packets exist
//! with variable-length bitmaps, and the finger cache tracks slot state the same
//! way. Every search and count takes an explicit bit limit; words past the limit
//! are never inspected and partial words are masked on both ends.

use crate::reg::{MAX_SLOTS, PRESENCE_BITS, SUBPACKET_BITS};

const WORD_BITS: usize = u32::BITS as usize;

const fn words_for(bits: usize) -> usize {
  (bits + WORD_BITS - 1) / WORD_BITS
}

/// Presence bitmap of a register descriptor.
pub type PresenceMap = BitSet<{ words_for(PRESENCE_BITS) }>;
/// Sub-packet bitmap of a single register descriptor item.
pub type SubPacketMap = BitSet<{ words_for(SUBPACKET_BITS) }>;
/// One bit per hardware finger slot.
pub type SlotMask = BitSet<{ words_for(MAX_SLOTS) }>;

/// Mask selecting bit `start % 32` and everything above it in its word.
#[inline]
const fn first_word_mask(start: usize) -> u32 {
  u32::MAX << (start % WORD_BITS)
}

/// Mask selecting the bits of the last word that lie below `nbits`.
#[inline]
const fn last_word_mask(nbits: usize) -> u32 {
  u32::MAX >> (nbits.wrapping_neg() % WORD_BITS)
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitSet<const WORDS: usize> {
  words: [u32; WORDS],
}

impl<const WORDS: usize> BitSet<WORDS> {
  /// Number of addressable bits.
  pub const CAPACITY: usize = WORDS * WORD_BITS;

  pub const fn new() -> Self {
    Self { words: [0; WORDS] }
  }

  /// Set `len` consecutive bits starting at `start`.
  ///
  /// # Panics
  ///
  /// Panics if the run extends past [`Self::CAPACITY`].
  pub fn set_run(&mut self, start: usize, len: usize) {
    if len == 0 {
      return;
    }
    let end = start + len;
    assert!(end <= Self::CAPACITY, "bit run {}..{} exceeds capacity {}", start, end, Self::CAPACITY);

    let mut word = start / WORD_BITS;
    let mut remaining = len;
    let mut bits_to_set = WORD_BITS - start % WORD_BITS;
    let mut mask = first_word_mask(start);

    while remaining >= bits_to_set {
      self.words[word] |= mask;
      remaining -= bits_to_set;
      bits_to_set = WORD_BITS;
      mask = u32::MAX;
      word += 1;
    }

    if remaining > 0 {
      mask &= last_word_mask(end);
      self.words[word] |= mask;
    }
  }

  #[inline]
  pub fn set(&mut self, bit: usize) {
    self.set_run(bit, 1);
  }

  pub fn clear(&mut self, bit: usize) {
    if bit < Self::CAPACITY {
      self.words[bit / WORD_BITS] &= !(1 << (bit % WORD_BITS));
    }
  }

  pub fn contains(&self, bit: usize) -> bool {
    bit < Self::CAPACITY && self.words[bit / WORD_BITS] & (1 << (bit % WORD_BITS)) != 0
  }

  pub fn is_empty(&self) -> bool {
    self.words.iter().all(|&w| w == 0)
  }

  /// Count the set bits below `bits`.
  pub fn population_count(&self, bits: usize) -> usize {
    let bits = bits.min(Self::CAPACITY);
    let full = bits / WORD_BITS;

    let mut weight: usize = self.words[..full].iter().map(|w| w.count_ones() as usize).sum();
    if bits % WORD_BITS != 0 {
      weight += (self.words[full] & last_word_mask(bits)).count_ones() as usize;
    }
    weight
  }

  /// Index of the lowest set bit below `bits`, or `bits` when there is none.
  #[inline]
  pub fn find_first_set(&self, bits: usize) -> usize {
    self.find_next_set(bits, 0)
  }

  /// Index of the lowest set bit in `from..bits`, or `bits` when there is none.
  pub fn find_next_set(&self, bits: usize, from: usize) -> usize {
    let bits = bits.min(Self::CAPACITY);
    if from >= bits {
      return bits;
    }

    let mut base = from - from % WORD_BITS;
    let mut word = self.words[base / WORD_BITS] & first_word_mask(from);

    while word == 0 {
      base += WORD_BITS;
      if base >= bits {
        return bits;
      }
      word = self.words[base / WORD_BITS];
    }

    (base + word.trailing_zeros() as usize).min(bits)
  }

  /// Iterate the set bits below `bits` in ascending order.
  pub fn iter_set(&self, bits: usize) -> SetBits<'_, WORDS> {
    let bits = bits.min(Self::CAPACITY);
    SetBits { set: self, bits, next: self.find_first_set(bits) }
  }
}

impl<const WORDS: usize> Default for BitSet<WORDS> {
  fn default() -> Self {
    Self::new()
  }
}

impl<const WORDS: usize> core::fmt::Debug for BitSet<WORDS> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_set().entries(self.iter_set(Self::CAPACITY)).finish()
  }
}

/// Iterator returned by [`BitSet::iter_set`].
pub struct SetBits<'a, const WORDS: usize> {
  set: &'a BitSet<WORDS>,
  bits: usize,
  next: usize,
}

impl<const WORDS: usize> Iterator for SetBits<'_, WORDS> {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    if self.next >= self.bits {
      return None;
    }
    let current = self.next;
    self.next = self.set.find_next_set(self.bits, current + 1);
    Some(current)
  }
}
