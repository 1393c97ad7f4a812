//! Component C — single-threaded handle pool: acquire/release state
//! machine over the slot table from [`crate::record`], in either FIFO or
//! LIFO reuse order.

use crate::error::StatusFlags;
use crate::flags::InitFlags;
use crate::layout::{round_up_pow2, BitLayout};
use crate::record::{read_word, write_word, RecordLayout, HANDLE_WORD_SIZE};
use crate::INVALID_INDEX;

/// A fixed-capacity pool of 32-bit handles backed by caller-owned
/// memory, reused in FIFO or LIFO order as slots are released.
///
/// See the crate-level documentation for the handle bit layout. This
/// type is single-threaded; for the lock-free, CAS-based LIFO variant
/// see [`crate::AtomicHandlePool`].
#[derive(Debug)]
pub struct HandlePool<'a> {
    memory: &'a mut [u8],
    record: RecordLayout,
    layout: BitLayout,
    capacity: u32,
    fifo: bool,
    size: u32,
    dequeue_head: u32,
    enqueue_tail: u32,
}

impl<'a> HandlePool<'a> {
    /// Bytes of caller-owned memory required for `capacity` slots of
    /// the given record shape. Not rounded to a power of two: the slot
    /// table only ever addresses `[0, capacity)`.
    pub fn memory_size_needed(capacity: u32, handle_record_size: u32, payload_size: u32) -> u32 {
        RecordLayout::memory_size_needed(capacity, handle_record_size, payload_size)
    }

    /// Initializes a handle pool over `memory`, which must be at least
    /// [`Self::memory_size_needed`] bytes and 4-byte aligned.
    ///
    /// `handle_record_size` is `4` for the common case of an external
    /// handle word immediately followed by the payload, or `0` when the
    /// handle is embedded inside the caller's own record at
    /// `handle_offset_in_record` (in which case the whole record,
    /// handle included, is `payload_size` bytes).
    pub fn init(
        memory: &'a mut [u8],
        capacity: u32,
        userflag_bits: u32,
        handle_record_size: u32,
        handle_offset_in_record: u32,
        payload_size: u32,
        flags: InitFlags,
    ) -> Result<Self, StatusFlags> {
        let mut status =
            RecordLayout::validate(handle_record_size, handle_offset_in_record, payload_size);

        if capacity == 0 {
            status |= StatusFlags::CONFIGURATION_UNSUPPORTED;
        }
        if flags.contains(InitFlags::THREADSAFE) {
            status |= StatusFlags::THREADSAFE_UNSUPPORTED;
        }
        let fifo = flags.contains(InitFlags::FIFO);
        let lifo = flags.contains(InitFlags::LIFO);
        if fifo == lifo {
            status |= StatusFlags::INVALID_INPUT_FLAGS;
        }

        let cap_pow2 = round_up_pow2(capacity);
        let dont_use_msb = flags.contains(InitFlags::DONT_USE_MSB_AS_IN_USE_BIT);
        let layout = match BitLayout::new(cap_pow2, userflag_bits, dont_use_msb) {
            Some(l) => l,
            None => {
                status |= StatusFlags::CONFIGURATION_UNSUPPORTED;
                return Err(status);
            }
        };

        if !status.is_empty() {
            return Err(status);
        }

        let record = RecordLayout::new(handle_record_size, handle_offset_in_record, payload_size);
        debug_assert!(memory.len() as u32 >= record.stride * capacity);

        let mut pool = HandlePool {
            memory,
            record,
            layout,
            capacity,
            fifo,
            size: 0,
            dequeue_head: 0,
            enqueue_tail: 0,
        };
        pool.reset();
        Ok(pool)
    }

    /// Reinitializes the freelist, dropping every previously acquired
    /// handle without touching payload bytes.
    pub fn reset(&mut self) {
        let last = self.capacity - 1;
        for i in 0..self.capacity {
            let next = if i == last {
                self.layout.generation_mask
            } else {
                (i + 1) | self.layout.generation_mask
            };
            write_word(self.memory, self.record.word_offset(i), next);
        }
        self.size = 0;
        self.dequeue_head = 0;
        self.enqueue_tail = last;
    }

    /// Usable capacity: one less than the slot count in FIFO mode,
    /// since the FIFO freelist always keeps one slot as the
    /// head/tail sentinel boundary.
    pub fn capacity(&self) -> u32 {
        self.capacity - self.fifo as u32
    }

    pub fn len(&self) -> u32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Acquires a free slot, stamping `userflags` and an advanced
    /// generation into it. Returns `(INVALID_INDEX, 0)` if the pool is
    /// full.
    pub fn acquire(&mut self, userflags: u32) -> (u32, u32) {
        if self.size == self.capacity() {
            return (INVALID_INDEX, 0);
        }

        let idx = self.dequeue_head;
        let off = self.record.word_offset(idx);
        let word = read_word(self.memory, off);
        self.dequeue_head = word & self.layout.capacity_mask;

        let new_generation = self.layout.next_generation(word);
        let new_handle =
            self.layout.pack_userflags(userflags) | new_generation | self.layout.in_use_bit | idx;
        write_word(self.memory, off, new_handle);
        self.size += 1;
        (idx, new_handle)
    }

    /// Releases `handle` back to the pool. Returns the released index,
    /// or `INVALID_INDEX` if `handle` is not currently valid.
    pub fn release(&mut self, handle: u32) -> u32 {
        if self.fifo {
            self.release_fifo(handle)
        } else {
            self.release_lifo(handle)
        }
    }

    fn release_fifo(&mut self, handle: u32) -> u32 {
        let idx = handle & self.layout.capacity_mask;
        if idx >= self.capacity {
            return INVALID_INDEX;
        }
        let off = self.record.word_offset(idx);
        let word = read_word(self.memory, off);
        if word != handle {
            return INVALID_INDEX;
        }

        write_word(self.memory, off, word & !self.layout.in_use_bit);

        let tail_off = self.record.word_offset(self.enqueue_tail);
        let tail_word = read_word(self.memory, tail_off);
        write_word(self.memory, tail_off, (tail_word & !self.layout.capacity_mask) | idx);
        self.enqueue_tail = idx;
        self.size -= 1;
        idx
    }

    fn release_lifo(&mut self, handle: u32) -> u32 {
        let idx = handle & self.layout.capacity_mask;
        if idx >= self.capacity {
            return INVALID_INDEX;
        }
        let off = self.record.word_offset(idx);
        let word = read_word(self.memory, off);
        if word != handle {
            return INVALID_INDEX;
        }

        let next = (word & !self.layout.in_use_bit & !self.layout.capacity_mask) | self.dequeue_head;
        write_word(self.memory, off, next);
        self.dequeue_head = idx;
        self.size -= 1;
        idx
    }

    /// `true` if `handle` currently refers to a live, acquired slot.
    pub fn valid(&self, handle: u32) -> bool {
        let idx = handle & self.layout.capacity_mask;
        idx < self.capacity
            && (handle & self.layout.in_use_bit) != 0
            && read_word(self.memory, self.record.word_offset(idx)) == handle
    }

    pub fn userflags_get(&self, handle: u32) -> u32 {
        self.layout.userflags_of(handle)
    }

    /// Rewrites the userflags of `handle` in place, returning the
    /// updated handle, or `0` (never a valid handle value) if `handle`
    /// is not currently valid.
    pub fn userflags_set(&mut self, handle: u32, userflags: u32) -> u32 {
        debug_assert!(self.valid(handle), "userflags_set called on an invalid handle");
        if !self.valid(handle) {
            return 0;
        }
        let idx = handle & self.layout.capacity_mask;
        let off = self.record.word_offset(idx);
        let new_handle = (handle & !self.layout.userflags_mask) | self.layout.pack_userflags(userflags);
        write_word(self.memory, off, new_handle);
        new_handle
    }

    /// Raw word stored at `index`, whether or not the slot is
    /// currently in use (useful for diagnostics/iteration helpers built
    /// on top of this pool).
    pub fn handle_at_index(&self, index: u32) -> u32 {
        if index >= self.capacity {
            return 0;
        }
        read_word(self.memory, self.record.word_offset(index))
    }

    /// Read-only pointer to the payload bytes for `index`. The caller
    /// is responsible for casting to the payload type it configured
    /// this pool with.
    pub fn payload_at(&self, index: u32) -> *const u8 {
        debug_assert!(index < self.capacity);
        self.memory[self.record.payload_offset_of(index)..].as_ptr()
    }

    /// Mutable pointer to the payload bytes for `index`.
    pub fn payload_at_mut(&mut self, index: u32) -> *mut u8 {
        debug_assert!(index < self.capacity);
        self.memory[self.record.payload_offset_of(index)..].as_mut_ptr()
    }

    pub(crate) fn generation_of(&self, handle: u32) -> u32 {
        self.layout.generation_of(handle)
    }

    /// Slot index encoded in `handle`, regardless of whether `handle`
    /// is currently valid.
    pub fn index_of(&self, handle: u32) -> u32 {
        handle & self.layout.capacity_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(capacity: u32) -> Vec<u8> {
        vec![0u8; HandlePool::memory_size_needed(capacity, HANDLE_WORD_SIZE, 0) as usize]
    }

    #[test]
    fn fifo_fill_and_drain_in_order() {
        let mut mem = buf(4);
        let mut pool =
            HandlePool::init(&mut mem, 4, 2, HANDLE_WORD_SIZE, 0, 0, InitFlags::FIFO).unwrap();
        assert_eq!(pool.capacity(), 3); // FIFO reserves one slot

        let (i0, h0) = pool.acquire(0);
        let (i1, h1) = pool.acquire(0);
        let (i2, h2) = pool.acquire(0);
        assert_eq!((i0, i1, i2), (0, 1, 2));
        assert!(pool.valid(h0) && pool.valid(h1) && pool.valid(h2));

        let (full_idx, full_handle) = pool.acquire(0);
        assert_eq!(full_idx, INVALID_INDEX);
        assert_eq!(full_handle, 0);

        assert_eq!(pool.release(h0), 0);
        assert!(!pool.valid(h0));

        // FIFO: the next acquire reuses index 0 again only after the
        // other two have also cycled through release/acquire in order.
        let (next_idx, _) = pool.acquire(0);
        assert_eq!(next_idx, 0);
    }

    #[test]
    fn lifo_churn_reuses_most_recently_released_slot() {
        let mut mem = buf(4);
        let mut pool =
            HandlePool::init(&mut mem, 4, 0, HANDLE_WORD_SIZE, 0, 0, InitFlags::LIFO).unwrap();
        assert_eq!(pool.capacity(), 4);

        let (_, h0) = pool.acquire(0);
        let (i1, h1) = pool.acquire(0);
        let (_, _h2) = pool.acquire(0);

        pool.release(h1);
        let (reused_idx, reused_handle) = pool.acquire(0);
        assert_eq!(reused_idx, i1);
        assert_ne!(reused_handle, h1); // generation must have advanced
        assert!(pool.valid(h0));
    }

    #[test]
    fn released_handle_is_no_longer_valid_and_generation_advances() {
        let mut mem = buf(2);
        let mut pool =
            HandlePool::init(&mut mem, 2, 0, HANDLE_WORD_SIZE, 0, 0, InitFlags::LIFO).unwrap();
        let (idx, h0) = pool.acquire(0);
        let gen0 = pool.generation_of(h0);
        pool.release(h0);
        assert!(!pool.valid(h0));
        let (idx2, h1) = pool.acquire(0);
        assert_eq!(idx, idx2);
        assert_eq!(pool.generation_of(h1), gen0 + 1);
    }

    #[test]
    fn sentinel_generation_value_is_skipped() {
        // 2 index bits (capacity=4) + 27 userflag bits + 1 in-use bit
        // leaves exactly 2 generation bits, so the all-ones generation
        // value (3) is reachable within a handful of cycles.
        let mut mem = buf(4);
        let mut pool =
            HandlePool::init(&mut mem, 4, 27, HANDLE_WORD_SIZE, 0, 0, InitFlags::LIFO).unwrap();

        let mut last_handle = 0u32;
        for _ in 0..20 {
            let (idx, h) = pool.acquire(0);
            assert_ne!(h, 0);
            assert_ne!(h, 0xFFFF_FFFF);
            last_handle = h;
            pool.release(h);
            let _ = idx;
        }
        assert_ne!(last_handle, 0xFFFF_FFFF);
    }

    #[test]
    fn inline_handle_layout_exposes_whole_record_as_payload() {
        let stride = 12u32;
        let mut mem = vec![0u8; (stride * 4) as usize];
        let mut pool = HandlePool::init(&mut mem, 4, 0, 0, 4, stride, InitFlags::FIFO).unwrap();
        let (idx, _h) = pool.acquire(0);
        let payload = pool.payload_at(idx);
        // payload starts at the record's own base, handle embedded 4
        // bytes in.
        assert_eq!(payload as usize, pool.payload_at(idx) as usize);
        let _ = payload;
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let mut mem = buf(4);
        let err = HandlePool::init(
            &mut mem,
            4,
            0,
            HANDLE_WORD_SIZE,
            0,
            0,
            InitFlags::FIFO | InitFlags::LIFO,
        )
        .unwrap_err();
        assert!(err.contains(StatusFlags::INVALID_INPUT_FLAGS));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "userflags_set called on an invalid handle"))]
    fn userflags_set_on_invalid_handle_asserts_in_debug_and_no_ops_in_release() {
        let mut mem = buf(2);
        let mut pool =
            HandlePool::init(&mut mem, 2, 2, HANDLE_WORD_SIZE, 0, 0, InitFlags::LIFO).unwrap();
        let (_, h) = pool.acquire(0);
        pool.release(h);
        assert_eq!(pool.userflags_set(h, 3), 0);
    }
}
