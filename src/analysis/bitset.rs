// This module implements the dense bit-vector used by liveness analysis to represent
// per-block live-in/live-out sets over the value-id universe. Storage is a slice of
// u64 words allocated from a caller-provided bump arena, so a whole analysis run's
// sets are superseded together when the arena is reset; a stale set from before an
// id-space change can never be grown and reused by accident. The merge operation
// (or_with) reports whether the set grew, which is what drives the liveness worklist
// to a fixed point.

//! Arena-allocated dense bit-vector keyed by value id.

use bumpalo::Bump;

/// Fixed-capacity bit set over `[0, capacity)`.
pub struct BitSet<'a> {
    words: &'a mut [u64],
    capacity: u32,
}

impl<'a> BitSet<'a> {
    /// Allocate an all-zero set for `capacity` bits in the given arena.
    pub fn new_in(arena: &'a Bump, capacity: u32) -> BitSet<'a> {
        let words = arena.alloc_slice_fill_copy(capacity.div_ceil(64) as usize, 0u64);
        BitSet { words, capacity }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn contains(&self, bit: u32) -> bool {
        debug_assert!(bit < self.capacity);
        self.words[(bit / 64) as usize] & (1u64 << (bit % 64)) != 0
    }

    pub fn insert(&mut self, bit: u32) {
        debug_assert!(bit < self.capacity);
        self.words[(bit / 64) as usize] |= 1u64 << (bit % 64);
    }

    pub fn remove(&mut self, bit: u32) {
        debug_assert!(bit < self.capacity);
        self.words[(bit / 64) as usize] &= !(1u64 << (bit % 64));
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Overwrite this set with the contents of another set of equal capacity.
    pub fn copy_from(&mut self, other: &BitSet<'_>) {
        assert_eq!(self.capacity, other.capacity, "bit set universes differ");
        self.words.copy_from_slice(other.words);
    }

    /// Merge `other` into `self`, returning true if `self` grew.
    pub fn or_with(&mut self, other: &BitSet<'_>) -> bool {
        assert_eq!(self.capacity, other.capacity, "bit set universes differ");
        let mut grew = false;
        for (dst, &src) in self.words.iter_mut().zip(other.words.iter()) {
            let merged = *dst | src;
            grew |= merged != *dst;
            *dst = merged;
        }
        grew
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Iterate set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let base = i as u32 * 64;
            BitIter { word, base }
        })
    }
}

struct BitIter {
    word: u64,
    base: u32,
}

impl Iterator for BitIter {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.word == 0 {
            return None;
        }
        let bit = self.word.trailing_zeros();
        self.word &= self.word - 1;
        Some(self.base + bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_contains() {
        let arena = Bump::new();
        let mut set = BitSet::new_in(&arena, 130);
        assert!(set.is_empty());
        set.insert(0);
        set.insert(64);
        set.insert(129);
        assert!(set.contains(0) && set.contains(64) && set.contains(129));
        assert!(!set.contains(1));
        set.remove(64);
        assert!(!set.contains(64));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn test_or_with_reports_growth() {
        let arena = Bump::new();
        let mut a = BitSet::new_in(&arena, 100);
        let mut b = BitSet::new_in(&arena, 100);
        b.insert(7);
        b.insert(99);
        assert!(a.or_with(&b));
        assert!(a.contains(7) && a.contains(99));
        // A second merge of the same bits changes nothing.
        assert!(!a.or_with(&b));
    }

    #[test]
    fn test_iter_ascending() {
        let arena = Bump::new();
        let mut set = BitSet::new_in(&arena, 200);
        for bit in [3, 64, 65, 199] {
            set.insert(bit);
        }
        let bits: Vec<u32> = set.iter().collect();
        assert_eq!(bits, vec![3, 64, 65, 199]);
    }

    #[test]
    fn test_copy_from() {
        let arena = Bump::new();
        let mut a = BitSet::new_in(&arena, 70);
        let mut b = BitSet::new_in(&arena, 70);
        a.insert(1);
        b.insert(69);
        a.copy_from(&b);
        assert!(!a.contains(1));
        assert!(a.contains(69));
    }
}
