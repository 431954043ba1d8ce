//! Lock strategies guarding the ring's critical sections.
//!
//! # Overview
//! - [`RawLock`] is an explicit `acquire(role)` / `release()` lock. Each acquisition names the
//!   logical [`Role`] taking it so contention can be attributed.
//! - [`SpinLock`] busy-waits on an atomic holder cell and never suspends the thread.
//! - [`MutexLock`] (requires `std`) suspends the caller until the lock is free.
//! - [`AnyLock`] (requires `std`) picks one of the two at construction time from a
//!   [`LockStrategy`].
//!
//! Both strategies give the same contract: mutual exclusion between the producer and consumer
//! for the duration of a ring operation. The spinlock is only a good trade when critical
//! sections are a handful of instructions and contention is between exactly two threads.

use core::fmt;
use core::hint::spin_loop;
use core::str::FromStr;

use crossbeam_utils::CachePadded;

use crate::atomic::{AtomicU8, AtomicUsize, Ordering};

const FREE: u8 = 0;

/// Which side of the SPSC pair holds (or wants) the lock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Role {
    Producer = 1,
    Consumer = 2,
}

impl Role {
    #[inline(always)]
    const fn tag(self) -> u8 {
        self as u8
    }

    #[inline]
    const fn from_tag(tag: u8) -> Option<Role> {
        match tag {
            1 => Some(Role::Producer),
            2 => Some(Role::Consumer),
            _ => None,
        }
    }

    #[inline(always)]
    const fn index(self) -> usize {
        self as usize - 1
    }
}

/// Failed acquisition attempts, attributed to the role that held the lock at the time.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Attempts that found the producer holding the lock.
    pub producer: usize,
    /// Attempts that found the consumer holding the lock.
    pub consumer: usize,
}

impl LockStats {
    #[inline]
    pub fn total(&self) -> usize {
        self.producer.wrapping_add(self.consumer)
    }

    // Wraps like the spinlock's `fetch_add` counters.
    fn bump(&mut self, holder: Role) {
        match holder {
            Role::Producer => self.producer = self.producer.wrapping_add(1),
            Role::Consumer => self.consumer = self.consumer.wrapping_add(1),
        }
    }
}

/// Runtime name of a lock strategy.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LockStrategy {
    #[default]
    Mutex,
    Spin,
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStrategy::Mutex => f.write_str("mutex"),
            LockStrategy::Spin => f.write_str("spin"),
        }
    }
}

/// Returned when a strategy name is neither `mutex` nor `spin`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown lock strategy (expected `mutex` or `spin`)")]
pub struct ParseStrategyError;

impl FromStr for LockStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("mutex") {
            Ok(LockStrategy::Mutex)
        } else if s.eq_ignore_ascii_case("spin") || s.eq_ignore_ascii_case("spinlock") {
            Ok(LockStrategy::Spin)
        } else {
            Err(ParseStrategyError)
        }
    }
}

/// An explicit acquire/release lock tagged with the acquiring role.
///
/// Prefer [`RawLock::lock`], which pairs `acquire` and `release` through a guard.
///
/// # Safety
/// Implementations must provide mutual exclusion: once `acquire` returns, no other call to
/// `acquire` may return until `release` has been called, and everything written before
/// `release` must be visible to the next acquirer (release/acquire ordering).
/// [`RingBuffer`](crate::RingBuffer) hands out `&mut` access to its slots on that promise.
///
/// Releasing is `unsafe`, so a lock reached through [`RingBuffer::lock`](crate::RingBuffer::lock)
/// cannot be freed from under an operation in safe code:
///
/// ```compile_fail,E0133
/// use ph_lockring::{RawLock, RingBuffer, SpinLock};
///
/// let ring = RingBuffer::<u32, 4, SpinLock>::new();
/// ring.lock().release();
/// ```
///
/// and a lock that does not exclude cannot be plugged in without `unsafe impl`:
///
/// ```compile_fail,E0200
/// use ph_lockring::{LockStrategy, RawLock, Role};
///
/// struct NoLock;
///
/// impl RawLock for NoLock {
///     fn acquire(&self, _: Role) {}
///     unsafe fn release(&self) {}
///     fn strategy(&self) -> LockStrategy {
///         LockStrategy::Spin
///     }
/// }
/// ```
pub unsafe trait RawLock: Send + Sync {
    /// Block or spin until the lock is held by `role`.
    fn acquire(&self, role: Role);

    /// # Safety
    /// Must pair with an earlier `acquire` that has not been released yet, and the caller must
    /// not touch the protected data afterwards.
    unsafe fn release(&self);

    fn strategy(&self) -> LockStrategy;

    /// Contention counters. Strategies that do not track contention report zero.
    fn stats(&self) -> LockStats {
        LockStats::default()
    }

    #[inline]
    fn lock(&self, role: Role) -> LockGuard<'_, Self> {
        self.acquire(role);
        LockGuard { lock: self }
    }
}

/// Releases the lock when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a, L: RawLock + ?Sized> {
    lock: &'a L,
}

impl<L: RawLock + ?Sized> Drop for LockGuard<'_, L> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: a guard only exists after a successful `acquire`.
        unsafe { self.lock.release() }
    }
}

/// Compare-and-exchange spinlock with an enumerated holder cell.
pub struct SpinLock {
    holder: CachePadded<AtomicU8>,
    contended: CachePadded<[AtomicUsize; 2]>,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            holder: CachePadded::new(AtomicU8::new(FREE)),
            contended: CachePadded::new([AtomicUsize::new(0), AtomicUsize::new(0)]),
        }
    }

    /// The role currently holding the lock, if any. Racy by nature; diagnostics only.
    #[inline]
    pub fn holder(&self) -> Option<Role> {
        Role::from_tag(self.holder.load(Ordering::Relaxed))
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: a single CAS on `holder` admits one owner; Acquire/Release order the data.
unsafe impl RawLock for SpinLock {
    #[inline]
    fn acquire(&self, role: Role) {
        let want = role.tag();
        loop {
            match self
                .holder
                .compare_exchange_weak(FREE, want, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => {
                    debug_assert_ne!(
                        current, want,
                        "{role:?} lock requested while another {role:?} holds it (SPSC contract violated)"
                    );
                    // A spurious failure reports FREE and is not contention.
                    if let Some(owner) = Role::from_tag(current) {
                        self.contended[owner.index()].fetch_add(1, Ordering::Relaxed);
                    }
                    spin_loop();
                }
            }
        }
    }

    #[inline]
    unsafe fn release(&self) {
        self.holder.store(FREE, Ordering::Release);
    }

    fn strategy(&self) -> LockStrategy {
        LockStrategy::Spin
    }

    fn stats(&self) -> LockStats {
        LockStats {
            producer: self.contended[Role::Producer.index()].load(Ordering::Relaxed),
            consumer: self.contended[Role::Consumer.index()].load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("holder", &self.holder())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(feature = "std")]
pub use blocking::{AnyLock, MutexLock};

#[cfg(feature = "std")]
mod blocking {
    use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

    use super::{LockStats, LockStrategy, RawLock, Role, SpinLock};

    #[derive(Default)]
    struct Held {
        holder: Option<Role>,
        contended: LockStats,
    }

    /// Blocking lock: waiters sleep on a condition variable and `release` wakes one of them.
    ///
    /// Waits are counted against the role holding the lock, the same way the spinlock counts
    /// failed attempts.
    #[derive(Default)]
    pub struct MutexLock {
        state: Mutex<Held>,
        freed: Condvar,
    }

    impl MutexLock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn holder(&self) -> Option<Role> {
            self.state().holder
        }

        // Only plain flags live behind the mutex, so a poisoned state is still consistent.
        fn state(&self) -> MutexGuard<'_, Held> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    // SAFETY: `holder` is only claimed while the inner mutex is held and only while it is None.
    unsafe impl RawLock for MutexLock {
        fn acquire(&self, role: Role) {
            let mut held = self.state();
            while let Some(owner) = held.holder {
                debug_assert_ne!(
                    owner, role,
                    "{role:?} lock requested while another {role:?} holds it (SPSC contract violated)"
                );
                held.contended.bump(owner);
                held = self
                    .freed
                    .wait(held)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            held.holder = Some(role);
        }

        unsafe fn release(&self) {
            self.state().holder = None;
            self.freed.notify_one();
        }

        fn strategy(&self) -> LockStrategy {
            LockStrategy::Mutex
        }

        fn stats(&self) -> LockStats {
            self.state().contended
        }
    }

    impl core::fmt::Debug for MutexLock {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            let held = self.state();
            f.debug_struct("MutexLock")
                .field("holder", &held.holder)
                .field("stats", &held.contended)
                .finish()
        }
    }

    /// A lock whose strategy is chosen at runtime.
    #[derive(Debug)]
    pub enum AnyLock {
        Mutex(MutexLock),
        Spin(SpinLock),
    }

    impl AnyLock {
        pub fn new(strategy: LockStrategy) -> Self {
            tracing::debug!(%strategy, "lock strategy selected");
            match strategy {
                LockStrategy::Mutex => AnyLock::Mutex(MutexLock::new()),
                LockStrategy::Spin => AnyLock::Spin(SpinLock::new()),
            }
        }
    }

    impl Default for AnyLock {
        fn default() -> Self {
            Self::new(LockStrategy::default())
        }
    }

    impl From<LockStrategy> for AnyLock {
        fn from(strategy: LockStrategy) -> Self {
            Self::new(strategy)
        }
    }

    // SAFETY: forwards to one of the two sound strategies above.
    unsafe impl RawLock for AnyLock {
        #[inline]
        fn acquire(&self, role: Role) {
            match self {
                AnyLock::Mutex(l) => l.acquire(role),
                AnyLock::Spin(l) => l.acquire(role),
            }
        }

        #[inline]
        unsafe fn release(&self) {
            // SAFETY: the caller holds the lock, so it holds the inner one.
            unsafe {
                match self {
                    AnyLock::Mutex(l) => l.release(),
                    AnyLock::Spin(l) => l.release(),
                }
            }
        }

        fn strategy(&self) -> LockStrategy {
            match self {
                AnyLock::Mutex(l) => l.strategy(),
                AnyLock::Spin(l) => l.strategy(),
            }
        }

        fn stats(&self) -> LockStats {
            match self {
                AnyLock::Mutex(l) => l.stats(),
                AnyLock::Spin(l) => l.stats(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LockStats, LockStrategy, RawLock, Role, SpinLock};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Non-atomic read-modify-write under the lock; lost updates mean broken exclusion.
    fn hammer<L: RawLock>(lock: &L) {
        const ROUNDS: usize = 20_000;
        let counter = AtomicUsize::new(0);
        thread::scope(|s| {
            for role in [Role::Producer, Role::Consumer] {
                let counter = &counter;
                s.spawn(move || {
                    for _ in 0..ROUNDS {
                        let _g = lock.lock(role);
                        let v = counter.load(Ordering::Relaxed);
                        counter.store(v + 1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(counter.load(Ordering::Relaxed), 2 * ROUNDS);
    }

    /// Hold the lock as producer until the consumer has been seen waiting on it.
    fn attributes_to_holder<L: RawLock>(lock: &L) {
        let held = lock.lock(Role::Producer);
        thread::scope(|s| {
            let waiter = s.spawn(|| drop(lock.lock(Role::Consumer)));
            while lock.stats().producer == 0 {
                thread::yield_now();
            }
            drop(held);
            waiter.join().unwrap();
        });
        let stats = lock.stats();
        assert!(stats.producer > 0);
        assert_eq!(stats.consumer, 0);
    }

    #[test]
    fn spin_is_mutually_exclusive() {
        hammer(&SpinLock::new());
    }

    #[test]
    fn spin_tracks_holder() {
        let lock = SpinLock::new();
        assert_eq!(lock.holder(), None);
        {
            let _g = lock.lock(Role::Consumer);
            assert_eq!(lock.holder(), Some(Role::Consumer));
        }
        assert_eq!(lock.holder(), None);
        assert_eq!(lock.stats().total(), 0);
    }

    #[test]
    fn stats_wrap_instead_of_overflowing() {
        let mut stats = LockStats {
            producer: usize::MAX,
            consumer: 1,
        };
        assert_eq!(stats.total(), 0);
        stats.bump(Role::Producer);
        stats.bump(Role::Consumer);
        assert_eq!(stats, LockStats { producer: 0, consumer: 2 });
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "SPSC contract violated")]
    fn spin_rejects_second_same_role_holder() {
        let lock = SpinLock::new();
        let _held = lock.lock(Role::Producer);
        let _second = lock.lock(Role::Producer);
    }

    #[test]
    fn spin_counts_contention_against_holder() {
        attributes_to_holder(&SpinLock::new());
    }

    #[test]
    fn strategy_parses_case_insensitive() {
        assert_eq!("mutex".parse::<LockStrategy>(), Ok(LockStrategy::Mutex));
        assert_eq!(" Spin ".parse::<LockStrategy>(), Ok(LockStrategy::Spin));
        assert_eq!("SPINLOCK".parse::<LockStrategy>(), Ok(LockStrategy::Spin));
        assert!("futex".parse::<LockStrategy>().is_err());
        assert_eq!(LockStrategy::default(), LockStrategy::Mutex);
    }

    #[cfg(feature = "std")]
    mod blocking {
        use super::super::{AnyLock, MutexLock};
        use super::*;
        use std::string::ToString;

        #[test]
        fn mutex_is_mutually_exclusive() {
            hammer(&MutexLock::new());
        }

        #[test]
        fn mutex_counts_waits_against_holder() {
            attributes_to_holder(&MutexLock::new());
        }

        #[cfg(debug_assertions)]
        #[test]
        #[should_panic(expected = "SPSC contract violated")]
        fn mutex_rejects_second_same_role_holder() {
            let lock = MutexLock::new();
            let _held = lock.lock(Role::Consumer);
            let _second = lock.lock(Role::Consumer);
        }

        #[test]
        fn any_lock_follows_strategy() {
            for strategy in [LockStrategy::Mutex, LockStrategy::Spin] {
                let lock = AnyLock::new(strategy);
                assert_eq!(lock.strategy(), strategy);
                assert_eq!(lock.strategy().to_string().parse::<LockStrategy>(), Ok(strategy));
                hammer(&lock);
            }
        }
    }
}
