/// Fixed-capacity bit set, one bit per pool pair.
///
/// The collector clears it at the start of every collection, so it tracks a
/// running count of set bits instead of recounting on sweep.
#[derive(Clone, Debug, Default)]
pub struct BitSet {
    count: usize,
    capacity: usize,
    data: Vec<usize>,
}

impl BitSet {
    const BITS_PER_WORD: usize = std::mem::size_of::<usize>() * 8;

    /// Creates an empty bitset able to hold `capacity` bits.
    pub fn with_capacity(capacity: usize) -> Self {
        BitSet {
            count: 0,
            capacity,
            data: vec![0; capacity.div_ceil(Self::BITS_PER_WORD)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Gets the value of the given bit.
    pub fn get(&self, idx: usize) -> bool {
        let word = idx / Self::BITS_PER_WORD;
        let bit = idx % Self::BITS_PER_WORD;
        match self.data.get(word) {
            Some(w) => w & (1 << bit) != 0,
            None => false,
        }
    }

    /// Sets the given bit. Returns true if it was previously clear.
    pub fn set(&mut self, idx: usize) -> bool {
        debug_assert!(idx < self.capacity, "bit {idx} out of range");
        let word = idx / Self::BITS_PER_WORD;
        let bit = idx % Self::BITS_PER_WORD;
        let was_clear = self.data[word] & (1 << bit) == 0;
        if was_clear {
            self.count += 1;
            self.data[word] |= 1 << bit;
        }
        was_clear
    }

    /// Clears every bit.
    pub fn clear_all(&mut self) {
        self.data.iter_mut().for_each(|w| *w = 0);
        self.count = 0;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Iterator over the bits that are set, in increasing order.
    pub fn bits_set(&self) -> impl '_ + Iterator<Item = usize> {
        (0..self.capacity).filter(|&i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::BitSet;

    #[test]
    fn exhaustive_single_bits() {
        let mut bs = BitSet::with_capacity(255);
        for i in 0..255usize {
            assert!(!bs.get(i));
            assert!(bs.set(i));
            for j in 0..255usize {
                assert_eq!(bs.get(j), i == j);
            }
            assert_eq!(bs.count(), 1);
            bs.clear_all();
        }
    }

    #[test]
    fn set_twice_counts_once() {
        let mut bs = BitSet::with_capacity(100);
        assert!(bs.set(64));
        assert!(!bs.set(64));
        assert_eq!(bs.count(), 1);
    }

    #[test]
    fn even_bits() {
        let mut bs = BitSet::with_capacity(255);
        for i in (0..255usize).filter(|i| i % 2 == 0) {
            bs.set(i);
        }
        assert_eq!(bs.count(), 128);
        assert!(!bs.get(1));
        assert!(bs.get(254));
        // Out of range reads are clear.
        assert!(!bs.get(100_000));
    }

    #[test]
    fn iterator() {
        let indices = vec![0, 1, 2, 5, 143, 1023];
        let mut bs = BitSet::with_capacity(1024);
        for &i in indices.iter() {
            bs.set(i);
        }
        assert_eq!(bs.bits_set().collect::<Vec<_>>(), indices);
    }
}
