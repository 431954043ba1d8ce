//! Atomic types used throughout the crate.
//!
//! Targets without native compare-and-swap (thumbv6m, riscv32imc, ...) can enable the
//! `portable-atomic` feature to route every atomic through the `portable_atomic` crate.

#[cfg(not(feature = "portable-atomic"))]
pub(crate) use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

#[cfg(feature = "portable-atomic")]
pub(crate) use portable_atomic::{AtomicU8, AtomicUsize, Ordering};
