//! FIFO buffers used by the push decoder
//!
//! Values are appended at the tail and consumed from the head. The backing
//! storage is only shifted once the consumed prefix grows past half of the
//! capacity, so the copy cost is amortized over many reads.

/// Append-at-tail, consume-at-head buffer with lazy compaction
#[derive(Debug, Clone)]
pub struct FifoBuffer<T> {
    data: Vec<T>,
    read_pos: usize,
    write_pos: usize,
}

/// Byte-side accumulation buffer
pub type FifoByteBuffer = FifoBuffer<u8>;

/// Character-side output buffer
pub type FifoCharBuffer = FifoBuffer<char>;

impl<T: Copy + Default> FifoBuffer<T> {
    /// Create a buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity.max(1)],
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Current capacity of the backing storage
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of unconsumed values
    pub fn available(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Check if there is nothing left to consume
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Append a value at the tail
    ///
    /// Writing past the capacity without consuming is a caller error. The
    /// buffer compacts first and only grows if the head has nothing to give
    /// back, so the data is never lost.
    pub fn write(&mut self, value: T) {
        if self.write_pos == self.data.len() {
            if self.read_pos > 0 {
                self.shift_to_front();
            } else {
                let grown = self.data.len() * 2;
                self.data.resize(grown, T::default());
            }
        }
        self.data[self.write_pos] = value;
        self.write_pos += 1;
    }

    /// Consume one value from the head
    pub fn read(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.compact();
        let value = self.data[self.read_pos];
        self.read_pos += 1;
        Some(value)
    }

    /// The unconsumed values, oldest first
    pub fn as_slice(&self) -> &[T] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// Drop `count` values from the head after they have been used
    pub fn discard_first(&mut self, count: usize) {
        self.read_pos += count.min(self.available());
        self.compact();
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    fn compact(&mut self) {
        if self.read_pos > self.data.len() / 2 {
            self.shift_to_front();
        }
    }

    fn shift_to_front(&mut self) {
        self.data.copy_within(self.read_pos..self.write_pos, 0);
        self.write_pos -= self.read_pos;
        self.read_pos = 0;
    }
}
