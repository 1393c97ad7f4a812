//! Initialization-time configuration flags.

use bitflags::bitflags;

bitflags! {
    /// Flags accepted by the various `init` constructors.
    ///
    /// Exactly one of [`InitFlags::FIFO`] or [`InitFlags::LIFO`] must be
    /// set; passing both or neither is reported back as
    /// [`crate::StatusFlags::INVALID_INPUT_FLAGS`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct InitFlags: u32 {
        /// Reuse released slots last-in-first-out.
        const LIFO = 1 << 0;
        /// Reuse released slots first-in-first-out.
        const FIFO = 1 << 1;
        /// Build the lock-free, CAS-based acquire/release path. Only
        /// meaningful together with `LIFO` — `FIFO | THREADSAFE` is
        /// reported as [`crate::StatusFlags::THREADSAFE_UNSUPPORTED`].
        const THREADSAFE = 1 << 2;
        /// Place the in-use bit adjacent to the index bits (Layout B)
        /// instead of at bit 31 (Layout A, the default).
        const DONT_USE_MSB_AS_IN_USE_BIT = 1 << 3;
    }
}
