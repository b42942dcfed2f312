//! Fixed-capacity circular buffer between the microphone callback and the
//! STT engine.
//!
//! The capture thread pushes, the control loop pops.  When the engine falls
//! behind and the buffer fills up, new samples **overwrite** the oldest so
//! that recognition resumes on recent speech rather than a stale backlog.
//!
//! # Example
//!
//! ```rust
//! use speech_service::audio::RingBuffer;
//!
//! let mut ring = RingBuffer::new(4);
//! ring.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]); // oldest sample dropped
//! let mut out = [0.0_f32; 3];
//! assert_eq!(ring.pop_into(&mut out), 3);
//! assert_eq!(out, [2.0, 3.0, 4.0]);
//! ```

pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the next write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest samples on overflow.
    pub fn push_slice(&mut self, data: &[T]) {
        for &item in data {
            self.buf[self.write_pos] = item;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            }
        }
    }

    fn read_pos(&self) -> usize {
        (self.write_pos + self.capacity - self.len) % self.capacity
    }

    /// Move up to `out.len()` of the oldest samples into `out`.  Returns the
    /// number of samples written.
    pub fn pop_into(&mut self, out: &mut [T]) -> usize {
        let n = out.len().min(self.len);
        let start = self.read_pos();
        for (i, slot) in out.iter_mut().take(n).enumerate() {
            *slot = self.buf[(start + i) % self.capacity];
        }
        self.len -= n;
        n
    }

    /// Take every stored sample in chronological order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = vec![T::default(); self.len];
        self.pop_into(&mut out);
        self.clear();
        out
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_within_capacity_keeps_order() {
        let mut ring = RingBuffer::new(8);
        ring.push_slice(&[1.0_f32, 2.0, 3.0]);

        let mut out = [0.0_f32; 2];
        assert_eq!(ring.pop_into(&mut out), 2);
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.drain(), vec![3.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn overflow_keeps_newest() {
        let mut ring = RingBuffer::new(4);
        ring.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);

        assert_eq!(ring.len(), 4);
        assert_eq!(ring.drain(), vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn interleaved_push_and_pop_wraps_correctly() {
        let mut ring = RingBuffer::new(3);
        ring.push_slice(&[1.0_f32, 2.0]);

        let mut one = [0.0_f32; 1];
        ring.pop_into(&mut one);
        assert_eq!(one, [1.0]);

        ring.push_slice(&[3.0, 4.0]);
        assert_eq!(ring.drain(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn pop_from_empty_writes_nothing() {
        let mut ring: RingBuffer<f32> = RingBuffer::new(4);
        let mut out = [9.0_f32; 2];
        assert_eq!(ring.pop_into(&mut out), 0);
        assert_eq!(out, [9.0, 9.0]);
    }

    #[test]
    fn clear_resets_state() {
        let mut ring = RingBuffer::new(4);
        ring.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]);
        ring.clear();
        assert!(ring.is_empty());

        ring.push_slice(&[9.0_f32]);
        assert_eq!(ring.drain(), vec![9.0]);
        assert_eq!(ring.capacity(), 4);
    }

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ring: RingBuffer<f32> = RingBuffer::new(0);
    }
}
