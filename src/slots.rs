//! Unsynchronized overwrite-oldest ring core.
//!
//! # Invariants
//! - `head < N`, `tail < N` and `count <= N`.
//! - Slots in the logical range `[head, head + count)` (wrapping modulo `N`) are initialized.
//! - When `count == N`, `head == tail`: the next insert lands on the oldest element.
//!
//! Callers provide the synchronization; `RingBuffer` wraps this in its lock strategy and
//! `EventLog` wraps it in a mutex, so both evict with the exact same policy.

use core::mem::MaybeUninit;

fn uninit_array<T, const N: usize>() -> [MaybeUninit<T>; N] {
    core::array::from_fn(|_| MaybeUninit::uninit())
}

pub(crate) struct Slots<T: Copy, const N: usize> {
    slots: [MaybeUninit<T>; N],
    head: usize,
    tail: usize,
    count: usize,
}

impl<T: Copy, const N: usize> Slots<T, N> {
    pub(crate) fn new() -> Self {
        assert!(N > 0, "ring capacity must be > 0");
        Self {
            slots: uninit_array::<T, N>(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    #[inline(always)]
    const fn next(idx: usize) -> usize {
        (idx + 1) % N
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Insert at `tail`. Returns the evicted oldest value if the ring was already full.
    #[inline]
    pub(crate) fn push_overwrite(&mut self, value: T) -> Option<T> {
        let evicted = if self.count == N {
            // SAFETY: a full ring has every slot initialized and `tail == head`.
            Some(unsafe { self.slots[self.tail].assume_init_read() })
        } else {
            None
        };

        self.slots[self.tail].write(value);
        self.tail = Self::next(self.tail);

        if evicted.is_some() {
            self.head = Self::next(self.head);
        } else {
            self.count += 1;
        }
        evicted
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        // SAFETY: `count > 0` means `head` is inside the initialized range.
        let v = unsafe { self.slots[self.head].assume_init_read() };
        self.head = Self::next(self.head);
        self.count -= 1;
        Some(v)
    }

    #[cfg(test)]
    pub(crate) fn cursors(&self) -> (usize, usize, usize) {
        (self.head, self.tail, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::Slots;
    use std::vec::Vec;

    fn drain<const N: usize>(s: &mut Slots<u32, N>) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(v) = s.pop() {
            out.push(v);
        }
        out
    }

    #[test]
    fn overwrite_drops_oldest() {
        let mut s = Slots::<u32, 4>::new();
        for v in 1..=4 {
            assert_eq!(s.push_overwrite(v), None);
        }
        assert_eq!(s.push_overwrite(5), Some(1));
        assert_eq!(s.len(), 4);
        assert_eq!(drain(&mut s), [2, 3, 4, 5]);
    }

    #[test]
    fn pop_empty_leaves_cursors() {
        let mut s = Slots::<u32, 3>::new();
        s.push_overwrite(7);
        assert_eq!(s.pop(), Some(7));
        let before = s.cursors();
        assert_eq!(s.pop(), None);
        assert_eq!(s.cursors(), before);
    }

    #[test]
    fn full_ring_has_head_at_tail() {
        let mut s = Slots::<u32, 3>::new();
        for v in 0..7 {
            s.push_overwrite(v);
        }
        let (head, tail, count) = s.cursors();
        assert_eq!(count, 3);
        assert_eq!(head, tail);
        assert_eq!(drain(&mut s), [4, 5, 6]);
    }

    #[test]
    fn single_slot_ring_keeps_newest() {
        let mut s = Slots::<u32, 1>::new();
        s.push_overwrite(1);
        assert_eq!(s.push_overwrite(2), Some(1));
        assert_eq!(drain(&mut s), [2]);
    }
}
