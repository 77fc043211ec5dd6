//! Scratch space for staged "reserve/commit" resource writes.
//!
//! Recording threads that assemble per-frame data (constants, transient
//! vertex runs) reserve a slice here, fill it, and commit it into a mapped
//! resource write. The arena is reset once per frame; a generation counter
//! stamped into every reservation catches use of a slice that outlived its
//! frame, instead of letting a stale offset scribble over live data.

use std::sync::Mutex;

use crate::error::{RenderError, RenderResult};

/// Round `value` up to the nearest multiple of `alignment`.
///
/// `alignment` must be > 0.
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment > 0);
    let add = alignment - 1;
    match value.checked_add(add) {
        Some(v) => v / alignment * alignment,
        None => u64::MAX / alignment * alignment,
    }
}

/// A reservation inside the arena, valid for the frame it was made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchSlice {
    pub offset: u64,
    pub len: u64,
    generation: u64,
}

#[derive(Debug)]
struct ArenaInner {
    storage: Vec<u8>,
    cursor: u64,
    generation: u64,
}

/// Generation-counted linear scratch arena.
///
/// Its lock is independent of the frame-window lock: reservations have
/// per-allocation lifetime, not per-frame, so holding the arena lock never
/// interacts with submission blocking.
#[derive(Debug)]
pub struct ScratchArena {
    inner: Mutex<ArenaInner>,
}

impl ScratchArena {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Mutex::new(ArenaInner {
                storage: vec![0; capacity as usize],
                cursor: 0,
                generation: 0,
            }),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.inner.lock().unwrap().storage.len() as u64
    }

    /// Reserve `len` bytes at `alignment` and fill them through `fill`.
    ///
    /// Fails with [`RenderError::TryAgain`] when the arena is exhausted for
    /// this frame; the caller can flush and retry next frame.
    pub fn reserve(
        &self,
        len: u64,
        alignment: u64,
        fill: impl FnOnce(&mut [u8]),
    ) -> RenderResult<ScratchSlice> {
        let mut inner = self.inner.lock().unwrap();
        let offset = align_up(inner.cursor, alignment.max(1));
        let end = offset
            .checked_add(len)
            .ok_or_else(|| RenderError::InvalidArgument(format!("scratch size {len} overflows")))?;
        if end > inner.storage.len() as u64 {
            return Err(RenderError::TryAgain(format!(
                "scratch arena exhausted: requested {len} bytes at {offset}, capacity {}",
                inner.storage.len()
            )));
        }
        inner.cursor = end;
        let generation = inner.generation;
        fill(&mut inner.storage[offset as usize..end as usize]);
        Ok(ScratchSlice {
            offset,
            len,
            generation,
        })
    }

    /// Read back a committed reservation.
    ///
    /// Fails with [`RenderError::OperationNotPermitted`] when the slice was
    /// reserved in an earlier generation — the bytes are gone.
    pub fn with_slice<R>(
        &self,
        slice: ScratchSlice,
        read: impl FnOnce(&[u8]) -> R,
    ) -> RenderResult<R> {
        let inner = self.inner.lock().unwrap();
        if slice.generation != inner.generation {
            return Err(RenderError::OperationNotPermitted(format!(
                "scratch slice from generation {} used in generation {}",
                slice.generation, inner.generation
            )));
        }
        let start = slice.offset as usize;
        let end = (slice.offset + slice.len) as usize;
        Ok(read(&inner.storage[start..end]))
    }

    /// Invalidate all outstanding reservations and recycle the space.
    /// Called once per frame by the device.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.cursor = 0;
        inner.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_respects_alignment_and_capacity() {
        let arena = ScratchArena::new(64);
        let a = arena.reserve(1, 1, |b| b[0] = 0xAA).unwrap();
        assert_eq!(a.offset, 0);

        let b = arena.reserve(8, 16, |b| b.fill(0xBB)).unwrap();
        assert_eq!(b.offset, 16);

        assert!(matches!(
            arena.reserve(64, 1, |_| {}),
            Err(RenderError::TryAgain(_))
        ));
    }

    #[test]
    fn stale_generation_is_rejected() {
        let arena = ScratchArena::new(64);
        let slice = arena.reserve(4, 4, |b| b.copy_from_slice(&[1, 2, 3, 4])).unwrap();
        arena.with_slice(slice, |b| assert_eq!(b, [1, 2, 3, 4])).unwrap();

        arena.reset();
        assert!(matches!(
            arena.with_slice(slice, |_| ()),
            Err(RenderError::OperationNotPermitted(_))
        ));

        // The recycled space is handed out again from the base.
        let again = arena.reserve(4, 1, |b| b.fill(9)).unwrap();
        assert_eq!(again.offset, 0);
    }
}
