//! Fixed-capacity 32-bit handle allocators over caller-owned memory.
//!
//! A handle is a 32-bit token packing a slot index, a generation
//! counter, an in-use bit, and optional caller-defined userflags (see
//! [`layout`] for the exact bit placement). Given a handle, any of the
//! pool types here answers in O(1) whether it still refers to a live
//! slot.
//!
//! - [`HandlePool`] — single-threaded, FIFO or LIFO reuse order.
//! - [`AtomicHandlePool`] — lock-free, CAS-based, LIFO-only, safe for
//!   concurrent acquire/release from any number of threads.
//! - [`DenseHandlePool`] — wraps a FIFO [`HandlePool`] with a
//!   dense↔sparse index mapping so a caller's own payload array can
//!   stay gap-free under swap-and-pop release.
//! - [`SparseSet`] — the standalone dense↔sparse primitive, not tied
//!   to handle allocation, with a caller-chosen index width.
//!
//! None of these types allocate: every constructor takes a
//! caller-supplied `&mut [u8]` sized by the matching
//! `memory_size_needed` function, per the "caller-owned memory
//! region" rule — there is no internal heap, no I/O, and no dynamic
//! growth past the capacity fixed at `init`.

#![cfg_attr(not(test), no_std)]

mod atomic_pool;
mod dense;
mod error;
mod flags;
mod layout;
mod pool;
mod record;
mod sparse_set;

pub use atomic_pool::AtomicHandlePool;
pub use dense::{DenseHandlePool, DenseRelease};
pub use error::StatusFlags;
pub use flags::InitFlags;
pub use pool::HandlePool;
pub use sparse_set::{SparseRemoval, SparseSet, Width};

/// Returned by `acquire`/`release` in place of a slot index when the
/// operation could not be performed (pool full, handle stale, sparse
/// index not live). Never a valid index into any pool's slot table,
/// and never produced as part of a live handle's index field.
pub const INVALID_INDEX: u32 = u32::MAX;
