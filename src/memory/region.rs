//! Shared region: the producer-owned linear memory the host reads from
//!
//! Growing a region replaces its backing storage wholesale. Every replacement
//! bumps the region's [`Generation`], which is how readers detect that views
//! built earlier no longer point at live storage.

use crate::error::{HostError, Result};

/// Linear memory page size (matches wasm32)
pub const PAGE_SIZE: usize = 64 * 1024;

/// Addresses below this are never handed out, so a valid pointer is never 0
pub const RESERVED_LOW: usize = 1024;

/// Identity token for a region's current backing storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// Read side of a shared region
pub trait SharedRegion {
    /// Identity of the current backing storage
    fn generation(&self) -> Generation;

    /// Entire current backing storage
    fn bytes(&self) -> &[u8];

    fn len(&self) -> usize {
        self.bytes().len()
    }

    fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

/// Growable in-process linear memory with a bump allocator
#[derive(Debug)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    generation: Generation,
    max_pages: usize,
    heap_top: usize,
}

impl LinearMemory {
    /// Create a memory with `initial_pages` pages that may grow up to `max_pages`
    pub fn new(initial_pages: usize, max_pages: usize) -> Self {
        Self {
            bytes: vec![0; initial_pages * PAGE_SIZE],
            generation: Generation::default(),
            max_pages: max_pages.max(initial_pages),
            heap_top: RESERVED_LOW,
        }
    }

    pub fn pages(&self) -> usize {
        self.bytes.len() / PAGE_SIZE
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Grow by `delta` pages, returning the previous page count.
    ///
    /// Contents are copied into fresh storage; the old storage is released.
    pub fn grow(&mut self, delta: usize) -> Result<usize> {
        let old_pages = self.pages();
        let new_pages = old_pages + delta;
        if new_pages > self.max_pages {
            return Err(HostError::OutOfMemory {
                len: delta * PAGE_SIZE,
            });
        }
        if delta == 0 {
            return Ok(old_pages);
        }

        let mut storage = Vec::with_capacity(new_pages * PAGE_SIZE);
        storage.extend_from_slice(&self.bytes);
        storage.resize(new_pages * PAGE_SIZE, 0);
        self.bytes = storage;
        self.generation = self.generation.next();

        log::debug!(
            "linear memory grew {} -> {} pages (generation {})",
            old_pages,
            new_pages,
            self.generation.0
        );
        Ok(old_pages)
    }

    /// Bump-allocate `size` bytes aligned to `align`, growing as needed
    pub fn alloc(&mut self, size: usize, align: usize) -> Result<u32> {
        let align = align.max(1);
        let start = self.heap_top.div_ceil(align) * align;
        let end = start
            .checked_add(size)
            .ok_or(HostError::OutOfMemory { len: size })?;

        if end > self.bytes.len() {
            let needed = end - self.bytes.len();
            self.grow(needed.div_ceil(PAGE_SIZE))?;
        }

        self.heap_top = end;
        u32::try_from(start).map_err(|_| HostError::OutOfMemory { len: size })
    }

    /// Release an allocation. Only the most recent allocation is reclaimed.
    pub fn free(&mut self, ptr: u32, size: usize) {
        let ptr = ptr as usize;
        if ptr + size == self.heap_top {
            self.heap_top = ptr;
        }
    }

    pub fn heap_top(&self) -> usize {
        self.heap_top
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Copy `data` into memory at `addr`
    pub fn write(&mut self, addr: usize, data: &[u8]) -> Result<()> {
        let end = addr
            .checked_add(data.len())
            .filter(|&end| end <= self.bytes.len())
            .ok_or(HostError::OutOfMemory { len: data.len() })?;
        self.bytes[addr..end].copy_from_slice(data);
        Ok(())
    }
}

impl SharedRegion for LinearMemory {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A plain byte slice is a region that never grows
impl SharedRegion for [u8] {
    fn generation(&self) -> Generation {
        Generation::default()
    }

    fn bytes(&self) -> &[u8] {
        self
    }
}
