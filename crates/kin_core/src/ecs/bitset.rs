// bitset.rs - Growable bit vector used for every entity and component mask
//
// Indices past the allocated words are implicitly zero. Equality and hashing
// follow that model, so trailing zero words never change a mask's identity.

use std::fmt;
use std::hash::{Hash, Hasher};

const WORD_BITS: usize = u64::BITS as usize;

#[inline]
fn word_of(index: usize) -> usize {
    index / WORD_BITS
}

#[inline]
fn bit_of(index: usize) -> u64 {
    1u64 << (index % WORD_BITS)
}

/// Arbitrary-length bitset.
///
/// Storage grows on `set` and never shrinks. Reads and `clear` past the
/// allocated range are cheap no-ops.
#[derive(Clone, Default)]
pub struct Mask {
    words: Vec<u64>,
}

impl Mask {
    /// Create an empty mask without allocating.
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Create an empty mask with room for `bits` bits.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(WORD_BITS)),
        }
    }

    #[inline]
    fn grow_to(&mut self, word: usize) {
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(word_of(index))
            .is_some_and(|word| word & bit_of(index) != 0)
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        let word = word_of(index);
        self.grow_to(word);
        self.words[word] |= bit_of(index);
    }

    /// Set a bit, returning `true` if it was previously clear.
    #[inline]
    pub fn set_changed(&mut self, index: usize) -> bool {
        let word = word_of(index);
        self.grow_to(word);
        let bit = bit_of(index);
        let changed = self.words[word] & bit == 0;
        self.words[word] |= bit;
        changed
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(word_of(index)) {
            *word &= !bit_of(index);
        }
    }

    /// Clear a bit, returning `true` if it was previously set.
    #[inline]
    pub fn clear_changed(&mut self, index: usize) -> bool {
        match self.words.get_mut(word_of(index)) {
            Some(word) => {
                let bit = bit_of(index);
                let changed = *word & bit != 0;
                *word &= !bit;
                changed
            }
            None => false,
        }
    }

    /// Clear every bit, keeping the allocation.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Overwrite this mask with the contents of `other`, reusing storage.
    pub fn copy_from(&mut self, other: &Mask) -> &mut Self {
        self.words.clear();
        self.words.extend_from_slice(&other.words);
        self
    }

    /// Keep only the bits also set in `other`.
    pub fn and(&mut self, other: &Mask) -> &mut Self {
        let common = self.words.len().min(other.words.len());
        for (word, other) in self.words[..common].iter_mut().zip(&other.words) {
            *word &= *other;
        }
        self.words[common..].fill(0);
        self
    }

    /// Set every bit that is set in `other`.
    pub fn or(&mut self, other: &Mask) -> &mut Self {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, other) in self.words.iter_mut().zip(&other.words) {
            *word |= *other;
        }
        self
    }

    /// Clear every bit that is set in `other`.
    pub fn and_not(&mut self, other: &Mask) -> &mut Self {
        for (word, other) in self.words.iter_mut().zip(&other.words) {
            *word &= !*other;
        }
        self
    }

    /// Index of the first set bit at or after `from`.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        let mut index = word_of(from);
        let mut word = *self.words.get(index)? & (!0u64 << (from % WORD_BITS));
        loop {
            if word != 0 {
                return Some(index * WORD_BITS + word.trailing_zeros() as usize);
            }
            index += 1;
            word = *self.words.get(index)?;
        }
    }

    /// Index of the first clear bit at or after `from`. Always exists.
    pub fn next_clear_bit(&self, from: usize) -> usize {
        let mut index = word_of(from);
        let Some(first) = self.words.get(index) else {
            return from;
        };
        let mut word = !*first & (!0u64 << (from % WORD_BITS));
        loop {
            if word != 0 {
                return index * WORD_BITS + word.trailing_zeros() as usize;
            }
            index += 1;
            match self.words.get(index) {
                Some(next) => word = !*next,
                None => return index * WORD_BITS,
            }
        }
    }

    /// Number of set bits.
    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Highest set bit, if any.
    pub fn highest_bit(&self) -> Option<usize> {
        let index = self.significant_words().checked_sub(1)?;
        let word = self.words[index];
        Some(index * WORD_BITS + (WORD_BITS - 1 - word.leading_zeros() as usize))
    }

    /// `true` if every bit of `other` is also set here.
    pub fn is_superset_of(&self, other: &Mask) -> bool {
        let common = self.words.len().min(other.words.len());
        other.words[common..].iter().all(|&word| word == 0)
            && self.words[..common]
                .iter()
                .zip(&other.words)
                .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    pub fn is_subset_of(&self, other: &Mask) -> bool {
        other.is_superset_of(self)
    }

    /// `true` if at least one bit is set in both masks.
    pub fn intersects(&self, other: &Mask) -> bool {
        self.first_common(other).is_some()
    }

    /// Lowest bit set in both masks.
    pub fn first_common(&self, other: &Mask) -> Option<usize> {
        self.words
            .iter()
            .zip(&other.words)
            .enumerate()
            .find_map(|(index, (mine, theirs))| {
                let both = mine & theirs;
                (both != 0).then(|| index * WORD_BITS + both.trailing_zeros() as usize)
            })
    }

    /// Iterate set bits in ascending order.
    pub fn ones(&self) -> Ones<'_> {
        Ones {
            words: &self.words,
            index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Number of words up to and including the last non-zero one.
    fn significant_words(&self) -> usize {
        self.words
            .iter()
            .rposition(|&word| word != 0)
            .map_or(0, |last| last + 1)
    }
}

/// Ascending iterator over the set bits of a [`Mask`].
pub struct Ones<'a> {
    words: &'a [u64],
    index: usize,
    current: u64,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.index * WORD_BITS + bit);
            }
            self.index += 1;
            self.current = *self.words.get(self.index)?;
        }
    }
}

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        let (short, long) = if self.words.len() <= other.words.len() {
            (&self.words, &other.words)
        } else {
            (&other.words, &self.words)
        };
        long[..short.len()] == short[..] && long[short.len()..].iter().all(|&word| word == 0)
    }
}

impl Eq for Mask {}

impl Hash for Mask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.words[..self.significant_words()].hash(state);
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ones()).finish()
    }
}

impl FromIterator<usize> for Mask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut mask = Mask::new();
        mask.extend(iter);
        mask
    }
}

impl Extend<usize> for Mask {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for index in iter {
            self.set(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(mask: &Mask) -> u64 {
        let mut hasher = DefaultHasher::new();
        mask.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_set_get_clear() {
        let mut mask = Mask::new();
        let indices = [0, 1, 63, 64, 65, 200, 1000];
        for &i in &indices {
            mask.set(i);
        }
        for &i in &indices {
            assert!(mask.get(i), "bit {i} should be set");
        }
        assert!(!mask.get(2));
        assert!(!mask.get(5000));
        assert_eq!(mask.cardinality(), indices.len());

        mask.clear(64);
        assert!(!mask.get(64));
        mask.clear(10_000);
        assert_eq!(mask.cardinality(), indices.len() - 1);
    }

    #[test]
    fn test_changed_variants_report_flips() {
        let mut mask = Mask::new();
        assert!(mask.set_changed(70));
        assert!(!mask.set_changed(70));
        assert!(mask.clear_changed(70));
        assert!(!mask.clear_changed(70));
        assert!(!mask.clear_changed(9_999));
    }

    #[test]
    fn test_trailing_zero_words_do_not_affect_identity() {
        let mut grown = Mask::new();
        grown.set(3);
        grown.set(500);
        grown.clear(500);

        let mut small = Mask::new();
        small.set(3);

        assert_eq!(grown, small);
        assert_eq!(small, grown);
        assert_eq!(hash_of(&grown), hash_of(&small));
        assert!(grown.is_superset_of(&small));
        assert!(small.is_superset_of(&grown));
        assert_eq!(Mask::new(), Mask::with_capacity(256));
    }

    #[test]
    fn test_next_set_bit_walk() {
        let mask: Mask = [2, 64, 130].into_iter().collect();
        assert_eq!(mask.next_set_bit(0), Some(2));
        assert_eq!(mask.next_set_bit(3), Some(64));
        assert_eq!(mask.next_set_bit(65), Some(130));
        assert_eq!(mask.next_set_bit(131), None);
        assert_eq!(mask.next_set_bit(10_000), None);
        assert_eq!(mask.ones().collect::<Vec<_>>(), vec![2, 64, 130]);
        assert_eq!(Mask::new().ones().count(), 0);
    }

    #[test]
    fn test_next_clear_bit_walk() {
        let mut mask: Mask = (0..64).collect();
        assert_eq!(mask.next_clear_bit(0), 64);
        mask.clear(10);
        assert_eq!(mask.next_clear_bit(0), 10);
        assert_eq!(mask.next_clear_bit(11), 64);
        assert_eq!(Mask::new().next_clear_bit(7), 7);
    }

    #[test]
    fn test_boolean_operations() {
        let a: Mask = [1, 2, 3, 100].into_iter().collect();
        let b: Mask = [2, 3, 4].into_iter().collect();

        let mut and = a.clone();
        and.and(&b);
        assert_eq!(and.ones().collect::<Vec<_>>(), vec![2, 3]);

        let mut or = b.clone();
        or.or(&a);
        assert_eq!(or.ones().collect::<Vec<_>>(), vec![1, 2, 3, 4, 100]);

        let mut diff = a.clone();
        diff.and_not(&b);
        assert_eq!(diff.ones().collect::<Vec<_>>(), vec![1, 100]);

        assert!(a.intersects(&b));
        assert_eq!(a.first_common(&b), Some(2));
        assert!(!diff.intersects(&b));
        assert!(or.is_superset_of(&a));
        assert!(a.is_subset_of(&or));
        assert!(!a.is_superset_of(&b));
    }

    #[test]
    fn test_copy_from_shrinks_logically() {
        let mut target: Mask = [500].into_iter().collect();
        let source: Mask = [1].into_iter().collect();
        target.copy_from(&source);
        assert_eq!(target, source);
        assert_eq!(target.highest_bit(), Some(1));
        target.clear_all();
        assert!(target.is_empty());
        assert_eq!(target.highest_bit(), None);
    }
}
