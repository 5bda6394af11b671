//! Direct-memory arena backing the frame buffers.
//!
//! The pool makes exactly one direct-memory reservation and one mapping at
//! construction and hands out sub-allocations with a bump pointer. Single
//! allocations are never freed: the arena is either reset as a whole or
//! released together with the pool.

use std::ops::Range;
use std::sync::Arc;

use crate::graphics::error::{InitStage, SceneError, SceneResult};
use crate::graphics::videoout::{DirectMemoryOffset, MappedMemory, VideoOut};

/// Round `size` up to a multiple of the power-of-two `alignment`.
///
/// `None` on overflow or when `alignment` is not a power of two.
#[must_use]
pub fn round_up(size: usize, alignment: usize) -> Option<usize> {
    if !alignment.is_power_of_two() {
        return None;
    }
    Some(size.checked_add(alignment - 1)? & !(alignment - 1))
}

/// A sub-allocation handed out by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Allocation {
    offset: usize,
    len: usize,
}

impl Allocation {
    /// Byte offset from the start of the mapped region.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Requested length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Bookkeeping for the mapped region.
///
/// `offset` is always a multiple of `granularity` and never exceeds `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    base_address: u64,
    size: usize,
    offset: usize,
    granularity: usize,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base_address: u64, size: usize, granularity: usize) -> Self {
        Self {
            base_address,
            size,
            offset: 0,
            granularity,
        }
    }

    #[must_use]
    pub const fn base_address(&self) -> u64 {
        self.base_address
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn granularity(&self) -> usize {
        self.granularity
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.size - self.offset
    }

    fn bump(&mut self, size: usize) -> SceneResult<Allocation> {
        let rounded = round_up(size, self.granularity).filter(|r| *r <= self.remaining());
        let Some(rounded) = rounded else {
            return Err(SceneError::OutOfVideoMemory {
                requested: size,
                remaining: self.remaining(),
            });
        };
        let allocation = Allocation {
            offset: self.offset,
            len: size,
        };
        self.offset += rounded;
        Ok(allocation)
    }
}

/// Owner of the direct-memory reservation and its mapping.
pub struct DirectMemoryPool {
    device: Arc<dyn VideoOut>,
    reservation: DirectMemoryOffset,
    mapping: Option<Box<dyn MappedMemory>>,
    region: MemoryRegion,
    alignment: usize,
}

impl std::fmt::Debug for DirectMemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectMemoryPool")
            .field("reservation", &self.reservation)
            .field("region", &self.region)
            .field("alignment", &self.alignment)
            .finish()
    }
}

impl DirectMemoryPool {
    /// Reserve and map `size` bytes rounded up to `alignment`.
    ///
    /// Sub-allocations are rounded up to `granularity`. Both `alignment`
    /// and `granularity` must be powers of two.
    ///
    /// # Errors
    /// `InvalidConfig` for bad parameters, `DeviceUnavailable` if the
    /// reservation or the mapping fails. A failed mapping releases the
    /// reservation before returning.
    pub fn new(
        device: Arc<dyn VideoOut>,
        size: usize,
        alignment: usize,
        granularity: usize,
    ) -> SceneResult<Self> {
        if !alignment.is_power_of_two() || !granularity.is_power_of_two() {
            return Err(SceneError::InvalidConfig(format!(
                "alignment {:#x} and granularity {:#x} must be powers of two",
                alignment, granularity
            )));
        }
        if size == 0 {
            return Err(SceneError::InvalidConfig(
                "video memory size must be nonzero".to_string(),
            ));
        }
        let total = round_up(size, alignment).ok_or_else(|| {
            SceneError::InvalidConfig(format!("video memory size {:#x} overflows", size))
        })?;

        let reservation = device
            .reserve_direct_memory(total, alignment)
            .map_err(|e| SceneError::unavailable(InitStage::ReserveDirectMemory, e))?;

        let mapping = match device.map_direct_memory(reservation, total, alignment) {
            Ok(mapping) => mapping,
            Err(e) => {
                device.release_direct_memory(reservation, total);
                return Err(SceneError::unavailable(InitStage::MapDirectMemory, e));
            }
        };

        let region = MemoryRegion::new(mapping.base_address(), total, granularity);
        log::debug!(
            "direct memory pool: {:#x} bytes at {:#x} (reservation {:#x})",
            total,
            region.base_address(),
            reservation.0
        );

        Ok(Self {
            device,
            reservation,
            mapping: Some(mapping),
            region,
            alignment,
        })
    }

    /// Bump-allocate `size` bytes.
    ///
    /// # Errors
    /// `OutOfVideoMemory` when the rounded size does not fit in what is left.
    pub fn allocate(&mut self, size: usize) -> SceneResult<Allocation> {
        let allocation = self.region.bump(size)?;
        log::trace!(
            "direct memory pool: {:#x} bytes at offset {:#x}",
            size,
            allocation.offset()
        );
        Ok(allocation)
    }

    /// Rewind the bump pointer. Earlier allocations become reusable.
    pub fn reset(&mut self) {
        self.region.offset = 0;
    }

    /// Unmap and release the whole region.
    pub fn release(mut self) {
        self.release_region();
    }

    fn release_region(&mut self) {
        if self.mapping.take().is_some() {
            self.device
                .release_direct_memory(self.reservation, self.region.size());
            log::debug!(
                "direct memory pool: released reservation {:#x}",
                self.reservation.0
            );
        }
    }

    #[must_use]
    pub const fn region(&self) -> &MemoryRegion {
        &self.region
    }

    #[must_use]
    pub const fn reservation(&self) -> DirectMemoryOffset {
        self.reservation
    }

    #[must_use]
    pub const fn alignment(&self) -> usize {
        self.alignment
    }

    /// Address the display controller uses for `allocation`.
    #[must_use]
    pub fn address_of(&self, allocation: Allocation) -> u64 {
        self.region.base_address() + allocation.offset() as u64
    }

    /// Bytes of an allocation made by this pool.
    ///
    /// # Panics
    /// If `allocation` did not come from this pool.
    #[must_use]
    pub fn bytes(&self, allocation: Allocation) -> &[u8] {
        match &self.mapping {
            Some(mapping) => &mapping.as_slice()[allocation.range()],
            None => &[],
        }
    }

    /// Mutable bytes of an allocation made by this pool.
    ///
    /// # Panics
    /// If `allocation` did not come from this pool.
    #[must_use]
    pub fn bytes_mut(&mut self, allocation: Allocation) -> &mut [u8] {
        match &mut self.mapping {
            Some(mapping) => &mut mapping.as_mut_slice()[allocation.range()],
            None => &mut [],
        }
    }
}

impl Drop for DirectMemoryPool {
    fn drop(&mut self) {
        self.release_region();
    }
}
