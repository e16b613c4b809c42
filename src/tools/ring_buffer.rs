//! Ring buffer for LZ type compression windows
use num_traits::PrimInt;

/// Fixed size ring addressed by absolute stream position.
/// Positions that are a multiple of the ring length apart share a slot, so
/// a value is only meaningful while its position is still inside the window.
pub struct RingBuffer<T: PrimInt> {
    buf: Vec<T>,
    n: usize
}

impl <T: PrimInt> RingBuffer<T> {
    pub fn create(fill: T,n: usize) -> Self {
        Self {
            buf: vec![fill;n],
            n
        }
    }
    /// get value at absolute position
    pub fn get_abs(&self,abs: usize) -> T {
        self.buf[abs % self.n]
    }
    /// set value at absolute position
    pub fn set_abs(&mut self,abs: usize,val: T) {
        self.buf[abs % self.n] = val;
    }
}

#[test]
fn wrapping() {
    let mut ring: RingBuffer<usize> = RingBuffer::create(usize::MAX,4);
    assert_eq!(ring.get_abs(2),usize::MAX);
    ring.set_abs(5,7);
    assert_eq!(ring.get_abs(1),7);
    assert_eq!(ring.get_abs(9),7);
    ring.set_abs(9,8);
    assert_eq!(ring.get_abs(5),8);
}
