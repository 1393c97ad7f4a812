//! Component E — dense-sparse mapping extension.
//!
//! Wraps a FIFO [`HandlePool`] with two auxiliary index arrays so a
//! caller that keeps its own payload array tightly packed (no holes)
//! can maintain that packing under `release` by following the
//! swap-and-pop instructions this type returns: move whatever's at
//! `move_from` in your own array down to `move_to` after the release
//! that produced them.

use crate::flags::InitFlags;
use crate::error::StatusFlags;
use crate::pool::HandlePool;
use crate::INVALID_INDEX;

/// Result of [`DenseHandlePool::release`]. `move_from`/`move_to` are
/// both `INVALID_INDEX` when `was_tail` is true (the removed element
/// was already the last one in dense order and no compaction move is
/// needed) or when `index` is `INVALID_INDEX` (the release itself was
/// invalid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenseRelease {
    pub index: u32,
    pub move_from: u32,
    pub move_to: u32,
    /// `true` iff the released element was already the back of the
    /// dense array, i.e. no external compaction move is required.
    /// Matches spec §4.E step 5: "Return true iff they are equal (i.e.
    /// the released slot was already the tail...)".
    pub was_tail: bool,
}

#[derive(Debug)]
pub struct DenseHandlePool<'a> {
    pool: HandlePool<'a>,
    dense_of: &'a mut [u32],
    sparse_of: &'a mut [u32],
}

impl<'a> DenseHandlePool<'a> {
    pub fn memory_size_needed(capacity: u32, handle_record_size: u32, payload_size: u32) -> u32 {
        HandlePool::memory_size_needed(capacity, handle_record_size, payload_size)
    }

    /// Bytes needed for each of the two auxiliary index arrays this
    /// type requires in addition to the underlying handle pool's own
    /// memory.
    pub fn index_memory_size_needed(capacity: u32) -> u32 {
        capacity * 4
    }

    pub fn init(
        memory: &'a mut [u8],
        dense_of: &'a mut [u32],
        sparse_of: &'a mut [u32],
        capacity: u32,
        userflag_bits: u32,
        handle_record_size: u32,
        handle_offset_in_record: u32,
        payload_size: u32,
        flags: InitFlags,
    ) -> Result<Self, StatusFlags> {
        if flags.contains(InitFlags::LIFO) {
            return Err(StatusFlags::INVALID_INPUT_FLAGS);
        }
        debug_assert!(dense_of.len() as u32 >= capacity);
        debug_assert!(sparse_of.len() as u32 >= capacity);

        let pool = HandlePool::init(
            memory,
            capacity,
            userflag_bits,
            handle_record_size,
            handle_offset_in_record,
            payload_size,
            flags | InitFlags::FIFO,
        )?;

        let mut dense = DenseHandlePool { pool, dense_of, sparse_of };
        dense.reset();
        Ok(dense)
    }

    pub fn reset(&mut self) {
        self.pool.reset();
        for slot in self.dense_of.iter_mut() {
            *slot = INVALID_INDEX;
        }
        for slot in self.sparse_of.iter_mut() {
            *slot = INVALID_INDEX;
        }
    }

    pub fn capacity(&self) -> u32 {
        self.pool.capacity()
    }

    pub fn len(&self) -> u32 {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Acquires a slot, returning `(sparse_index, handle, dense_index)`.
    /// `dense_index` is always the current back of the dense array
    /// (equal to the pool's length before this acquire).
    pub fn acquire(&mut self, userflags: u32) -> (u32, u32, u32) {
        let dense_index = self.pool.len();
        let (sparse_index, handle) = self.pool.acquire(userflags);
        if sparse_index == INVALID_INDEX {
            return (INVALID_INDEX, 0, INVALID_INDEX);
        }
        self.dense_of[sparse_index as usize] = dense_index;
        self.sparse_of[dense_index as usize] = sparse_index;
        (sparse_index, handle, dense_index)
    }

    /// Releases `handle`, reporting the swap-and-pop compaction move
    /// the caller must perform on its own dense payload array to keep
    /// it gap-free.
    pub fn release(&mut self, handle: u32) -> DenseRelease {
        let sparse_index = self.pool.index_of(handle);
        let released = self.pool.release(handle);
        if released == INVALID_INDEX {
            return DenseRelease {
                index: INVALID_INDEX,
                move_from: INVALID_INDEX,
                move_to: INVALID_INDEX,
                was_tail: false,
            };
        }

        let num_handles_after = self.pool.len();
        let removed_dense_index = self.dense_of[sparse_index as usize];
        let was_tail = removed_dense_index == num_handles_after;

        let (move_from, move_to) = if was_tail {
            (INVALID_INDEX, INVALID_INDEX)
        } else {
            let back_sparse_index = self.sparse_of[num_handles_after as usize];
            self.dense_of[back_sparse_index as usize] = removed_dense_index;
            self.sparse_of[removed_dense_index as usize] = back_sparse_index;
            (num_handles_after, removed_dense_index)
        };

        self.dense_of[sparse_index as usize] = INVALID_INDEX;
        DenseRelease { index: released, move_from, move_to, was_tail }
    }

    pub fn valid(&self, handle: u32) -> bool {
        self.pool.valid(handle)
    }

    pub fn userflags_get(&self, handle: u32) -> u32 {
        self.pool.userflags_get(handle)
    }

    pub fn userflags_set(&mut self, handle: u32, userflags: u32) -> u32 {
        self.pool.userflags_set(handle, userflags)
    }

    pub fn handle_at_index(&self, index: u32) -> u32 {
        self.pool.handle_at_index(index)
    }

    pub fn payload_at(&self, index: u32) -> *const u8 {
        self.pool.payload_at(index)
    }

    pub fn payload_at_mut(&mut self, index: u32) -> *mut u8 {
        self.pool.payload_at_mut(index)
    }

    /// Current dense-array position of `handle`, or `INVALID_INDEX` if
    /// `handle` is not valid.
    pub fn dense_index(&self, handle: u32) -> u32 {
        if !self.pool.valid(handle) {
            return INVALID_INDEX;
        }
        self.dense_of[self.pool.index_of(handle) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::HANDLE_WORD_SIZE;

    fn pools(capacity: u32) -> (Vec<u8>, Vec<u32>, Vec<u32>) {
        let mem = vec![0u8; DenseHandlePool::memory_size_needed(capacity, HANDLE_WORD_SIZE, 0) as usize];
        let dense_of = vec![INVALID_INDEX; capacity as usize];
        let sparse_of = vec![INVALID_INDEX; capacity as usize];
        (mem, dense_of, sparse_of)
    }

    #[test]
    fn acquire_appends_to_dense_back() {
        let (mut mem, mut dense_of, mut sparse_of) = pools(4);
        let mut ds = DenseHandlePool::init(
            &mut mem,
            &mut dense_of,
            &mut sparse_of,
            4,
            0,
            HANDLE_WORD_SIZE,
            0,
            0,
            InitFlags::FIFO,
        )
        .unwrap();

        let (_, h0, d0) = ds.acquire(0);
        let (_, h1, d1) = ds.acquire(0);
        let (_, _h2, d2) = ds.acquire(0);
        assert_eq!((d0, d1, d2), (0, 1, 2));
        assert_eq!(ds.dense_index(h0), 0);
        assert_eq!(ds.dense_index(h1), 1);
        let _ = d2;
    }

    #[test]
    fn release_middle_reports_swap_with_former_back() {
        let (mut mem, mut dense_of, mut sparse_of) = pools(4);
        let mut ds = DenseHandlePool::init(
            &mut mem,
            &mut dense_of,
            &mut sparse_of,
            4,
            0,
            HANDLE_WORD_SIZE,
            0,
            0,
            InitFlags::FIFO,
        )
        .unwrap();

        let (_, h0, _) = ds.acquire(0);
        let (_, h1, _) = ds.acquire(0);
        let (_, h2, _) = ds.acquire(0);

        // release the middle element (dense index 1); the former back
        // (h2, dense index 2) must be reported as the move source.
        let result = ds.release(h1);
        assert_eq!(result.move_from, 2);
        assert_eq!(result.move_to, 1);
        assert!(!result.was_tail);
        assert_eq!(ds.dense_index(h2), 1);
        assert_eq!(ds.dense_index(h0), 0);
    }

    #[test]
    fn release_back_needs_no_move() {
        let (mut mem, mut dense_of, mut sparse_of) = pools(4);
        let mut ds = DenseHandlePool::init(
            &mut mem,
            &mut dense_of,
            &mut sparse_of,
            4,
            0,
            HANDLE_WORD_SIZE,
            0,
            0,
            InitFlags::FIFO,
        )
        .unwrap();

        let (_, h0, _) = ds.acquire(0);
        let (_, h1, _) = ds.acquire(0);
        let result = ds.release(h1);
        assert_eq!(result.move_from, INVALID_INDEX);
        assert_eq!(result.move_to, INVALID_INDEX);
        assert!(result.was_tail);
        let _ = h0;
    }

    #[test]
    fn lifo_flag_is_rejected() {
        let (mut mem, mut dense_of, mut sparse_of) = pools(4);
        let err = DenseHandlePool::init(
            &mut mem,
            &mut dense_of,
            &mut sparse_of,
            4,
            0,
            HANDLE_WORD_SIZE,
            0,
            0,
            InitFlags::LIFO,
        )
        .unwrap_err();
        assert_eq!(err, StatusFlags::INVALID_INPUT_FLAGS);
    }
}
