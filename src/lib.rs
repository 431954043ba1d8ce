//! Fixed-capacity SPSC overwrite ring with pluggable locking and an event trace.
//!
//! # Highlights
//! - One producer, one consumer, capacity fixed at compile time, no allocation.
//! - Overwrite-oldest: `enqueue` never fails, a full ring drops its oldest element.
//! - Two interchangeable lock strategies behind [`RawLock`]: a blocking [`MutexLock`] and a
//!   busy-waiting [`SpinLock`] that counts contended attempts per role.
//! - An optional [`EventLog`] records every enqueue, dequeue and idle stretch with a monotonic
//!   timestamp for offline inspection.
//!
//! # Quick start
//! ```
//! use ph_lockring::{EventLog, EventKind, MutexLock, RingBuffer};
//!
//! let log = EventLog::new();
//! let ring = RingBuffer::<u32, 4, _, _>::with_trace(MutexLock::new(), &log);
//!
//! for v in 1..=5 {
//!     ring.enqueue(v);
//! }
//! assert_eq!(ring.dequeue(), Ok(2));
//!
//! let records = log.drain_all();
//! assert_eq!(records.len(), 6);
//! assert_eq!(records[5].kind, EventKind::Deq);
//! ```
//!
//! # Producer and consumer threads
//! ```
//! use std::thread;
//! use ph_lockring::{RingBuffer, SpinLock};
//!
//! let ring = RingBuffer::<u32, 16, SpinLock>::new();
//! thread::scope(|s| {
//!     s.spawn(|| {
//!         let producer = ring.producer();
//!         for v in 0..1000 {
//!             producer.push(v);
//!         }
//!         producer.finish();
//!     });
//!     let mut last = None;
//!     for v in ring.consumer() {
//!         assert!(last < Some(v));
//!         last = Some(v);
//!     }
//! });
//! ```
//!
//! # No-std
//! The crate is `#![no_std]`. The default `std` feature adds [`MutexLock`], [`AnyLock`] and
//! [`EventLog`]. The `portable-atomic` features route atomics through `portable_atomic` for
//! targets without native compare-and-swap.
//!
//! # Semantics
//! - `dequeue` returns [`Empty`] rather than blocking; the consumer's [`Consumer::recv`]
//!   busy-waits and never sleeps.
//! - End of stream is a reserved [`Sentinel`] value (`MAX` for unsigned integers).
//! - Trace events are appended after the ring's lock is released, so the trace is an
//!   approximate, not authoritative, ordering of ring operations.
#![no_std]

#[cfg(any(feature = "std", test))]
extern crate std;

mod atomic;
pub mod lock;
pub mod ring;
mod slots;
pub mod trace;

pub use lock::{LockGuard, LockStats, LockStrategy, ParseStrategyError, RawLock, Role, SpinLock};
#[cfg(feature = "std")]
pub use lock::{AnyLock, MutexLock};
pub use ring::{Consumer, Empty, Producer, RingBuffer, Sentinel};
#[cfg(feature = "std")]
pub use trace::{EVENT_LOG_CAPACITY, EventLog};
pub use trace::{EventKind, EventRecord, Trace};
