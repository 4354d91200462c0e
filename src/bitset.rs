//! Word-packed bit set used as the row storage of [`BoolMatrix`][crate::matrix::BoolMatrix].
//!
//! Bits beyond the allocated words read as zero, so a set can be grown lazily
//! when the matrix it belongs to gains new columns.

/// A growable bit set backed by a vector of `u64` words.
#[derive(Debug, Clone, Default)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    /// Number of bits per word.
    const BITS_PER_WORD: usize = 64;

    /// Creates an empty bit set able to hold `capacity` bits without reallocating.
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; Self::num_words(capacity)],
        }
    }

    fn num_words(bits: usize) -> usize {
        (bits + Self::BITS_PER_WORD - 1) / Self::BITS_PER_WORD
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, u64) {
        (index / Self::BITS_PER_WORD, 1u64 << (index % Self::BITS_PER_WORD))
    }

    /// Ensures the set can hold at least `bits` bits.
    pub fn reserve(&mut self, bits: usize) {
        let needed = Self::num_words(bits);
        if needed > self.words.len() {
            self.words.resize(needed, 0);
        }
    }

    /// Returns the number of set bits.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns true if no bits are set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns true if the bit at the given index is set.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        let (word, mask) = Self::word_and_bit(index);
        self.words.get(word).map_or(false, |w| w & mask != 0)
    }

    /// Sets the bit at the given index. Returns true if it was previously clear.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        let (word, mask) = Self::word_and_bit(index);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_clear = self.words[word] & mask == 0;
        self.words[word] |= mask;
        was_clear
    }

    /// Clears the bit at the given index. Returns true if it was previously set.
    #[inline]
    pub fn remove(&mut self, index: usize) -> bool {
        let (word, mask) = Self::word_and_bit(index);
        match self.words.get_mut(word) {
            Some(w) if *w & mask != 0 => {
                *w &= !mask;
                true
            }
            _ => false,
        }
    }

    /// Sets or clears the bit at the given index.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        if value {
            self.insert(index);
        } else {
            self.remove(index);
        }
    }

    /// Clears all bits, keeping the allocation.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Returns the smallest set index, if any.
    pub fn first(&self) -> Option<usize> {
        let i = self.words.iter().position(|&w| w != 0)?;
        Some(i * Self::BITS_PER_WORD + self.words[i].trailing_zeros() as usize)
    }

    /// In-place union: `self |= other`.
    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (w, &o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// Returns `self & !other` as a new set.
    pub fn difference(&self, other: &BitSet) -> BitSet {
        let words = self
            .words
            .iter()
            .enumerate()
            .map(|(i, &w)| w & !other.words.get(i).copied().unwrap_or(0))
            .collect();
        BitSet { words }
    }

    /// Extends the bit set by setting all bits from an iterator.
    pub fn extend(&mut self, iter: impl IntoIterator<Item = usize>) {
        for index in iter {
            self.insert(index);
        }
    }

    /// Returns an iterator over all set bit indices, in increasing order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

// Trailing zero words do not affect equality.
impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        let n = self.words.len().max(other.words.len());
        (0..n).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for BitSet {}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bs = BitSet::default();
        bs.extend(iter);
        bs
    }
}

/// Iterator over set bits in a [`BitSet`].
pub struct BitSetIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // clear lowest set bit
                return Some(self.word_idx * BitSet::BITS_PER_WORD + bit);
            }
            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}
