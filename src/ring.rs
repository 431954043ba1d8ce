//! Fixed-capacity SPSC overwrite ring guarded by a pluggable lock.
//!
//! # Overview
//! - Single producer, single consumer, capacity `N` fixed at compile time.
//! - `enqueue` never fails: a full ring drops its oldest element to make room.
//! - `dequeue` returns [`Empty`] when there is nothing to read; callers poll.
//! - Every slot/cursor mutation happens under the lock strategy `L`, acquired with the
//!   caller's [`Role`].
//! - After the lock is released each operation reports to the trace sink `S`.
//!
//! # Termination
//! The producer ends the stream with [`Producer::finish`], which enqueues [`Sentinel::SENTINEL`].
//! [`Consumer::recv`] busy-waits for data and returns `None` once it sees the sentinel.
//!
//! # Notes
//! - `T` is `Copy`, so evicted values need no drop and reads return by copy.
//! - Running more than one producer or consumer is memory-safe but breaks FIFO and termination
//!   guarantees, and trips a debug assertion in the bundled locks.

use core::cell::UnsafeCell;
use core::fmt;
use core::hint::spin_loop;

use crossbeam_utils::CachePadded;

use crate::atomic::{AtomicUsize, Ordering};
use crate::lock::{RawLock, Role, SpinLock};
use crate::slots::Slots;
use crate::trace::Trace;

/// Returned by [`RingBuffer::dequeue`] when no element is retained.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("ring buffer is empty")]
pub struct Empty;

/// Reserved end-of-stream payload, never sent as regular data.
pub trait Sentinel: Copy + PartialEq {
    const SENTINEL: Self;

    #[inline]
    fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

macro_rules! max_sentinel {
    ($($t:ty),*) => {
        $(impl Sentinel for $t {
            const SENTINEL: Self = <$t>::MAX;
        })*
    };
}

max_sentinel!(u8, u16, u32, u64, usize);

/// Overwrite ring shared by one producer and one consumer.
///
/// Without an explicit `L` the ring is guarded by a [`SpinLock`], which also works without `std`
/// (runtime selection through `AnyLock` defaults to the mutex instead).
pub struct RingBuffer<T: Copy, const N: usize, L = SpinLock, S = ()> {
    lock: L,
    // Mirror of the slot count, readable without the lock for the empty pre-check.
    len: CachePadded<AtomicUsize>,
    overwritten: AtomicUsize,
    state: UnsafeCell<Slots<T, N>>,
    trace: S,
}

unsafe impl<T: Copy + Send, const N: usize, L: Sync, S: Sync> Sync for RingBuffer<T, N, L, S> {}

impl<T: Copy, const N: usize, L: RawLock + Default> RingBuffer<T, N, L, ()> {
    pub fn new() -> Self {
        Self::with_trace(L::default(), ())
    }
}

impl<T: Copy, const N: usize, L: RawLock + Default> Default for RingBuffer<T, N, L, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize, L: RawLock> RingBuffer<T, N, L, ()> {
    pub fn with_lock(lock: L) -> Self {
        Self::with_trace(lock, ())
    }
}

impl<T: Copy, const N: usize, L: RawLock, S: Trace<T>> RingBuffer<T, N, L, S> {
    /// Build a ring reporting every operation to `trace`.
    ///
    /// # Panics
    /// Panics if `N == 0`.
    pub fn with_trace(lock: L, trace: S) -> Self {
        let state = Slots::new();
        tracing::debug!(capacity = N, strategy = %lock.strategy(), "ring buffer created");
        Self {
            lock,
            len: CachePadded::new(AtomicUsize::new(0)),
            overwritten: AtomicUsize::new(0),
            state: UnsafeCell::new(state),
            trace,
        }
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of retained elements. A snapshot; the other side may change it immediately.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements dropped by overwrite since creation.
    #[inline]
    pub fn overwritten(&self) -> usize {
        self.overwritten.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lock(&self) -> &L {
        &self.lock
    }

    #[inline]
    pub fn trace(&self) -> &S {
        &self.trace
    }

    /// Create the producer handle. Only one producer may be active.
    #[inline]
    pub fn producer(&self) -> Producer<'_, T, N, L, S> {
        Producer { ring: self }
    }

    /// Create the consumer handle. Only one consumer may be active.
    #[inline]
    pub fn consumer(&self) -> Consumer<'_, T, N, L, S> {
        Consumer {
            ring: self,
            idle_polls: 0,
            finished: false,
        }
    }

    /// Append `value`, dropping the oldest element if the ring is full.
    pub fn enqueue(&self, value: T) {
        let evicted = {
            let _guard = self.lock.lock(Role::Producer);
            // SAFETY: the lock is held, so no other reference to the slots exists.
            let state = unsafe { &mut *self.state.get() };
            let evicted = state.push_overwrite(value).is_some();
            if evicted {
                self.overwritten.fetch_add(1, Ordering::Relaxed);
            }
            self.len.store(state.len(), Ordering::Release);
            evicted
        };

        if evicted {
            tracing::trace!(capacity = N, "ring full, oldest element dropped");
        }
        self.trace.enqueued(&value);
    }

    /// Remove and return the oldest element.
    pub fn dequeue(&self) -> Result<T, Empty> {
        if self.len.load(Ordering::Acquire) == 0 {
            return Err(Empty);
        }

        let value = {
            let _guard = self.lock.lock(Role::Consumer);
            // SAFETY: the lock is held, so no other reference to the slots exists.
            let state = unsafe { &mut *self.state.get() };
            // The pre-check raced with nothing held; only this answer is authoritative.
            let value = state.pop().ok_or(Empty)?;
            self.len.store(state.len(), Ordering::Release);
            value
        };

        self.trace.dequeued(&value);
        Ok(value)
    }

    #[cfg(test)]
    fn cursors(&self) -> (usize, usize, usize) {
        let _guard = self.lock.lock(Role::Consumer);
        // SAFETY: the lock is held.
        unsafe { (*self.state.get()).cursors() }
    }
}

impl<T: Copy, const N: usize, L: RawLock + fmt::Debug, S> fmt::Debug for RingBuffer<T, N, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &N)
            .field("len", &self.len.load(Ordering::Acquire))
            .field("overwritten", &self.overwritten.load(Ordering::Relaxed))
            .field("lock", &self.lock)
            .finish()
    }
}

pub struct Producer<'a, T: Copy, const N: usize, L, S> {
    ring: &'a RingBuffer<T, N, L, S>,
}

impl<'a, T: Copy, const N: usize, L: RawLock, S: Trace<T>> Producer<'a, T, N, L, S> {
    #[inline]
    pub fn push(&self, value: T) {
        self.ring.enqueue(value)
    }
}

impl<'a, T: Sentinel, const N: usize, L: RawLock, S: Trace<T>> Producer<'a, T, N, L, S> {
    /// Enqueue the sentinel and give up the handle.
    ///
    /// Like any enqueue this may evict unread data, but the sentinel itself is always the
    /// newest element and is never evicted by this producer.
    pub fn finish(self) {
        self.ring.enqueue(T::SENTINEL);
    }
}

pub struct Consumer<'a, T: Copy, const N: usize, L, S> {
    ring: &'a RingBuffer<T, N, L, S>,
    idle_polls: u64,
    finished: bool,
}

impl<'a, T: Copy, const N: usize, L: RawLock, S: Trace<T>> Consumer<'a, T, N, L, S> {
    /// Single non-blocking attempt.
    #[inline]
    pub fn pop(&mut self) -> Result<T, Empty> {
        self.ring.dequeue()
    }

    /// Total empty polls spent inside [`recv`](Self::recv).
    #[inline]
    pub fn idle_polls(&self) -> u64 {
        self.idle_polls
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<'a, T: Sentinel, const N: usize, L: RawLock, S: Trace<T>> Consumer<'a, T, N, L, S> {
    /// Busy-wait for the next element. Returns `None` once the sentinel has been received.
    ///
    /// The thread never sleeps. If the ring was empty on entry, an idle event carrying the
    /// number of empty polls is traced right after the dequeue that ended the wait.
    pub fn recv(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }

        let mut polls = 0u64;
        let value = loop {
            match self.ring.dequeue() {
                Ok(v) => break v,
                Err(Empty) => {
                    polls += 1;
                    spin_loop();
                }
            }
        };

        if polls > 0 {
            self.idle_polls += polls;
            self.ring.trace.idled(polls);
        }

        if value.is_sentinel() {
            self.finished = true;
            self.ring.trace.ended(&value);
            tracing::debug!(idle_polls = self.idle_polls, "consumer received end-of-stream");
            return None;
        }
        Some(value)
    }
}

impl<'a, T: Sentinel, const N: usize, L: RawLock, S: Trace<T>> Iterator
    for Consumer<'a, T, N, L, S>
{
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.recv()
    }
}
