//! Component D — lock-free LIFO handle pool.
//!
//! Acquire and release are implemented as CAS loops over a single
//! `AtomicU32` freelist head, in the classic Treiber-stack shape: the
//! head word packs a monotonically increasing serial number in its
//! upper bits above a plain slot index, so a retrying CAS can never be
//! fooled by another thread popping and re-pushing the same index
//! between this thread's read and its compare-exchange (the ABA
//! problem). Slot `0` is permanently reserved as the "freelist empty"
//! sentinel, which is why this pool always has one fewer usable slot
//! than its backing buffer.
//!
//! Everything except the head pointer is accessed through raw,
//! unsynchronized reads/writes into the caller's buffer; correctness
//! relies entirely on the acquire/release ordering of the head CAS to
//! publish those plain writes to other threads; see the `Safety` notes
//! on the raw accessors below.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::StatusFlags;
use crate::flags::InitFlags;
use crate::layout::{round_up_pow2, BitLayout};
use crate::record::RecordLayout;
use crate::INVALID_INDEX;

#[derive(Debug)]
pub struct AtomicHandlePool<'a> {
    memory: *mut u8,
    memory_len: usize,
    _marker: PhantomData<&'a mut [u8]>,
    record: RecordLayout,
    layout: BitLayout,
    capacity: u32,
    head: AtomicU32,
    size: AtomicU32,
}

// SAFETY: the raw `memory` pointer is derived from an exclusively
// borrowed `&'a mut [u8]` at construction time and is only ever
// dereferenced through the CAS-guarded accessors below, which treat
// every per-slot word as owned by exactly one thread at a time (the
// thread that most recently won the head CAS for that index).
unsafe impl<'a> Send for AtomicHandlePool<'a> {}
unsafe impl<'a> Sync for AtomicHandlePool<'a> {}

impl<'a> AtomicHandlePool<'a> {
    pub fn memory_size_needed(capacity: u32, handle_record_size: u32, payload_size: u32) -> u32 {
        RecordLayout::memory_size_needed(capacity, handle_record_size, payload_size)
    }

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

        if capacity < 2 {
            // slot 0 is reserved, so at least 2 slots are needed for
            // even a single usable handle.
            status |= StatusFlags::CONFIGURATION_UNSUPPORTED;
        }
        if flags.contains(InitFlags::FIFO) {
            status |= StatusFlags::THREADSAFE_UNSUPPORTED;
        }
        if !flags.contains(InitFlags::LIFO) || !flags.contains(InitFlags::THREADSAFE) {
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

        let memory_len = memory.len();
        let mut pool = AtomicHandlePool {
            memory: memory.as_mut_ptr(),
            memory_len,
            _marker: PhantomData,
            record,
            layout,
            capacity,
            head: AtomicU32::new(0),
            size: AtomicU32::new(0),
        };
        pool.reset();
        Ok(pool)
    }

    /// Reinitializes the freelist. Requires exclusive access, same as
    /// [`crate::HandlePool::reset`] — this is not a concurrent
    /// operation.
    pub fn reset(&mut self) {
        let last = self.capacity - 1;
        for i in 1..self.capacity {
            let next = if i == last {
                self.layout.generation_mask
            } else {
                (i + 1) | self.layout.generation_mask
            };
            unsafe { self.write_word(self.word_offset(i), next) };
        }
        let initial_head = if self.capacity > 1 { 1 } else { 0 };
        *self.head.get_mut() = initial_head;
        *self.size.get_mut() = 0;
    }

    /// Usable capacity, always one less than the backing slot count:
    /// index `0` is permanently reserved as the empty-freelist marker.
    pub fn capacity(&self) -> u32 {
        self.capacity - 1
    }

    pub fn len(&self) -> u32 {
        self.size.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn word_offset(&self, index: u32) -> usize {
        self.record.word_offset(index)
    }

    // SAFETY: `offset` must be `< self.memory_len - 3` and the slot at
    // that offset must not be concurrently written by another thread
    // that hasn't first lost a race for ownership of it via the head
    // CAS (see module docs).
    #[inline]
    unsafe fn read_word(&self, offset: usize) -> u32 {
        debug_assert!(offset + 4 <= self.memory_len);
        unsafe { self.memory.add(offset).cast::<u32>().read_unaligned() }
    }

    // SAFETY: see `read_word`.
    #[inline]
    unsafe fn write_word(&self, offset: usize, value: u32) {
        debug_assert!(offset + 4 <= self.memory_len);
        unsafe { self.memory.add(offset).cast::<u32>().write_unaligned(value) };
    }

    /// Acquires a free slot. Returns `(INVALID_INDEX, 0)` if the pool
    /// is empty. Safe to call concurrently from any number of threads.
    pub fn acquire(&self, userflags: u32) -> (u32, u32) {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let current_index = head & self.layout.capacity_mask;
            if current_index == 0 {
                return (INVALID_INDEX, 0);
            }

            let off = self.word_offset(current_index);
            // SAFETY: `current_index` was just read from a freelist
            // link published by some prior release's Release store;
            // the Acquire load above establishes happens-before for
            // this read.
            let word = unsafe { self.read_word(off) };
            let next_index = word & self.layout.capacity_mask;
            let new_head = head.wrapping_add(self.layout.capacity_mask + 1) & !self.layout.capacity_mask
                | next_index;

            if self
                .head
                .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let new_generation = self.layout.next_generation(word);
                let new_handle = self.layout.pack_userflags(userflags)
                    | new_generation
                    | self.layout.in_use_bit
                    | current_index;
                // SAFETY: this thread just won exclusive ownership of
                // `current_index` via the CAS above.
                unsafe { self.write_word(off, new_handle) };
                self.size.fetch_add(1, Ordering::Relaxed);
                return (current_index, new_handle);
            }
        }
    }

    /// Releases `handle` back to the pool. Returns the released index,
    /// or `INVALID_INDEX` if `handle` is not currently valid. Safe to
    /// call concurrently, as long as no two threads race to release
    /// the same handle (the caller, not this pool, owns that
    /// invariant — a handle has exactly one owner at a time).
    pub fn release(&self, handle: u32) -> u32 {
        let idx = handle & self.layout.capacity_mask;
        if idx == 0 || idx >= self.capacity {
            return INVALID_INDEX;
        }
        let off = self.word_offset(idx);
        // SAFETY: the caller is the sole owner of `idx` until this
        // release completes.
        let word = unsafe { self.read_word(off) };
        if word != handle {
            return INVALID_INDEX;
        }
        let cleared_base = word & !self.layout.in_use_bit & !self.layout.capacity_mask;

        loop {
            let head = self.head.load(Ordering::Acquire);
            let head_index = head & self.layout.capacity_mask;
            // SAFETY: still the sole owner of `idx`.
            unsafe { self.write_word(off, cleared_base | head_index) };

            let new_head =
                head.wrapping_add(self.layout.capacity_mask + 1) & !self.layout.capacity_mask | idx;
            if self
                .head
                .compare_exchange_weak(head, new_head, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.size.fetch_sub(1, Ordering::Relaxed);
                return idx;
            }
        }
    }

    pub fn valid(&self, handle: u32) -> bool {
        let idx = handle & self.layout.capacity_mask;
        if idx == 0 || idx >= self.capacity {
            return false;
        }
        // SAFETY: a plain racy read; same caveat as the C original,
        // the result may be stale if another thread is concurrently
        // acquiring/releasing the same index.
        let word = unsafe { self.read_word(self.word_offset(idx)) };
        (handle & self.layout.in_use_bit) != 0 && word == handle
    }

    pub fn userflags_get(&self, handle: u32) -> u32 {
        self.layout.userflags_of(handle)
    }

    /// Raw word stored at `index`. Racy under concurrent
    /// acquire/release of the same index, same as [`Self::valid`].
    pub fn handle_at_index(&self, index: u32) -> u32 {
        if index == 0 || index >= self.capacity {
            return 0;
        }
        unsafe { self.read_word(self.word_offset(index)) }
    }

    pub fn payload_at(&self, index: u32) -> *const u8 {
        debug_assert!(index < self.capacity);
        unsafe { self.memory.add(self.record.payload_offset_of(index)) }
    }

    pub fn payload_at_mut(&self, index: u32) -> *mut u8 {
        debug_assert!(index < self.capacity);
        unsafe { self.memory.add(self.record.payload_offset_of(index)) }
    }
}
