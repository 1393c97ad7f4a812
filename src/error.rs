//! Initialization status codes.
//!
//! Configuration errors are surfaced as a bitset rather than a single
//! variant, matching the C original's `enum ijha_h32_init_res`: several
//! independent problems (oversized payload, oversized handle offset, a
//! bad flag combination) can all be true of the same call, and the
//! caller may want to report all of them rather than just the first one
//! found.

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Bits set by [`crate::HandlePool::init`] (and the other `init`
    /// constructors) on a configuration problem. The empty set means
    /// initialization succeeded.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u32 {
        /// The requested userflag bits plus the bits needed to index
        /// `capacity` (rounded to a power of two) do not fit in 32 bits.
        const CONFIGURATION_UNSUPPORTED = 1 << 0;
        /// `THREADSAFE` was requested together with `FIFO`; the lock-free
        /// variant only supports LIFO reuse order.
        const THREADSAFE_UNSUPPORTED = 1 << 1;
        /// `payload_size` does not fit in 16 bits.
        const USERDATA_TOO_BIG = 1 << 2;
        /// `handle_offset_in_record` does not fit in 8 bits.
        const HANDLE_OFFSET_TOO_BIG = 1 << 3;
        /// `handle_record_size` does not fit in 8 bits, or the combined
        /// per-slot stride does not fit in 16 bits.
        const HANDLE_NON_INLINE_SIZE_TOO_BIG = 1 << 4;
        /// Neither (exclusively) `LIFO` nor `FIFO` was set, or other
        /// reserved bits were passed where a plain bit count was expected.
        const INVALID_INPUT_FLAGS = 1 << 5;
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no error");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        Ok(())
    }
}
