//! Timestamped event trace for the ring's own operations.
//!
//! # Overview
//! - [`Trace`] is the sink a [`RingBuffer`](crate::RingBuffer) reports to after each operation.
//!   `()` is the no-op sink.
//! - [`EventLog`] (requires `std`) is a fixed 100-record overwrite ring behind its own mutex,
//!   meant to be drained once after the producer and consumer have been joined.
//!
//! # Ordering
//! Events are appended after the ring's lock is released, so under contention the order of
//! `enq`/`deq` records can differ slightly from the true order of the ring mutations. The
//! timestamp is taken under the log's mutex, so timestamps are non-decreasing in log order.

use core::fmt;
use core::time::Duration;

/// What happened.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Enq,
    Deq,
    /// The consumer spun on an empty ring; the value is the number of idle polls.
    DeqIdle,
    /// The consumer received the end-of-stream sentinel.
    End,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Enq => "enq",
            EventKind::Deq => "deq",
            EventKind::DeqIdle => "idle",
            EventKind::End => "end",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub kind: EventKind,
    pub value: u64,
    /// Monotonic time since the owning log was created.
    pub timestamp: Duration,
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} value={} time={}.{:09}",
            self.kind,
            self.value,
            self.timestamp.as_secs(),
            self.timestamp.subsec_nanos()
        )
    }
}

/// Receives ring events. Called outside the ring's critical section.
pub trait Trace<T> {
    fn enqueued(&self, value: &T);

    fn dequeued(&self, value: &T);

    /// The consumer polled an empty ring `polls` times before its last successful dequeue.
    fn idled(&self, _polls: u64) {}

    /// The consumer received the sentinel and stopped.
    fn ended(&self, _value: &T) {}
}

impl<T> Trace<T> for () {
    #[inline(always)]
    fn enqueued(&self, _: &T) {}

    #[inline(always)]
    fn dequeued(&self, _: &T) {}
}

impl<T, S: Trace<T> + ?Sized> Trace<T> for &S {
    #[inline]
    fn enqueued(&self, value: &T) {
        (**self).enqueued(value)
    }

    #[inline]
    fn dequeued(&self, value: &T) {
        (**self).dequeued(value)
    }

    #[inline]
    fn idled(&self, polls: u64) {
        (**self).idled(polls)
    }

    #[inline]
    fn ended(&self, value: &T) {
        (**self).ended(value)
    }
}

#[cfg(feature = "std")]
pub use log::{EVENT_LOG_CAPACITY, EventLog};

#[cfg(feature = "std")]
mod log {
    use std::io;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::time::Instant;
    use std::vec::Vec;

    use super::{EventKind, EventRecord, Trace};
    use crate::slots::Slots;

    pub const EVENT_LOG_CAPACITY: usize = 100;

    struct Inner {
        ring: Slots<EventRecord, EVENT_LOG_CAPACITY>,
        overwritten: u64,
    }

    /// Fixed-capacity, overwrite-oldest log of [`EventRecord`]s.
    pub struct EventLog {
        epoch: Instant,
        inner: Mutex<Inner>,
    }

    impl EventLog {
        pub fn new() -> Self {
            tracing::debug!(capacity = EVENT_LOG_CAPACITY, "event log created");
            Self {
                epoch: Instant::now(),
                inner: Mutex::new(Inner {
                    ring: Slots::new(),
                    overwritten: 0,
                }),
            }
        }

        fn inner(&self) -> MutexGuard<'_, Inner> {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner)
        }

        #[inline]
        pub const fn capacity(&self) -> usize {
            EVENT_LOG_CAPACITY
        }

        pub fn len(&self) -> usize {
            self.inner().ring.len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Records evicted by newer appends since creation.
        pub fn overwritten(&self) -> u64 {
            self.inner().overwritten
        }

        /// Append a record stamped with the current monotonic time. Never fails; a full log
        /// drops its oldest record.
        pub fn append(&self, kind: EventKind, value: u64) {
            let mut inner = self.inner();
            let record = EventRecord {
                kind,
                value,
                timestamp: self.epoch.elapsed(),
            };
            if let Some(old) = inner.ring.push_overwrite(record) {
                inner.overwritten += 1;
                tracing::trace!(evicted = %old, "event log full");
            }
        }

        /// Remove and return every retained record, oldest first.
        ///
        /// Meant for after all appending threads have been joined; records appended
        /// concurrently may or may not be included.
        pub fn drain_all(&self) -> Vec<EventRecord> {
            let mut inner = self.inner();
            let mut out = Vec::with_capacity(inner.ring.len());
            while let Some(record) = inner.ring.pop() {
                out.push(record);
            }
            out
        }

        /// Drain the log and write it as `index: record` lines. Returns the number of records.
        pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<usize> {
            let records = self.drain_all();
            writeln!(out, "dumping log")?;
            for (idx, record) in records.iter().enumerate() {
                writeln!(out, "{idx}: {record}")?;
            }
            writeln!(out, "done")?;
            Ok(records.len())
        }
    }

    impl Default for EventLog {
        fn default() -> Self {
            Self::new()
        }
    }

    impl core::fmt::Debug for EventLog {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            let inner = self.inner();
            f.debug_struct("EventLog")
                .field("len", &inner.ring.len())
                .field("overwritten", &inner.overwritten)
                .finish()
        }
    }

    impl<T: Copy + Into<u64>> Trace<T> for EventLog {
        #[inline]
        fn enqueued(&self, value: &T) {
            self.append(EventKind::Enq, (*value).into());
        }

        #[inline]
        fn dequeued(&self, value: &T) {
            self.append(EventKind::Deq, (*value).into());
        }

        fn idled(&self, polls: u64) {
            self.append(EventKind::DeqIdle, polls);
        }

        fn ended(&self, value: &T) {
            self.append(EventKind::End, (*value).into());
        }
    }

    impl<T, S: Trace<T> + ?Sized> Trace<T> for Arc<S> {
        #[inline]
        fn enqueued(&self, value: &T) {
            (**self).enqueued(value)
        }

        #[inline]
        fn dequeued(&self, value: &T) {
            (**self).dequeued(value)
        }

        #[inline]
        fn idled(&self, polls: u64) {
            (**self).idled(polls)
        }

        #[inline]
        fn ended(&self, value: &T) {
            (**self).ended(value)
        }
    }
}
