//! Scan-out frame buffers carved from the direct-memory pool.

use std::sync::Arc;

use crate::graphics::color::BYTES_PER_PIXEL;
use crate::graphics::error::{InitStage, SceneError, SceneResult};
use crate::graphics::pool::{Allocation, DirectMemoryPool};
use crate::graphics::surface::Surface;
use crate::graphics::videoout::{BufferAttribute, VideoHandle, VideoOut, VideoOutError};

/// Hardware slot the first buffer is registered at.
const FIRST_SLOT: usize = 0;

/// One hardware-visible buffer: its slot index and its bytes in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBuffer {
    index: usize,
    allocation: Allocation,
    width: u32,
    height: u32,
}

impl FrameBuffer {
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn allocation(&self) -> Allocation {
        self.allocation
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in pixels.
    #[must_use]
    pub const fn stride(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.allocation.len()
    }
}

/// N equally sized buffers registered with the display controller as one batch.
pub struct FrameBufferSet {
    device: Arc<dyn VideoOut>,
    handle: VideoHandle,
    buffers: Vec<FrameBuffer>,
    attribute: BufferAttribute,
    active: usize,
    registered: bool,
}

impl std::fmt::Debug for FrameBufferSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBufferSet")
            .field("handle", &self.handle)
            .field("buffers", &self.buffers)
            .field("active", &self.active)
            .field("registered", &self.registered)
            .finish()
    }
}

impl FrameBufferSet {
    /// Carve `count` buffers of `width * height` pixels out of `pool` and
    /// register them with the controller in a single call.
    ///
    /// # Errors
    /// `InvalidConfig` for empty dimensions or count, `OutOfVideoMemory` if
    /// the pool cannot hold every buffer, `DeviceUnavailable` if the
    /// controller rejects the registration. Nothing is registered on error;
    /// the pool memory already handed out stays with the caller's pool.
    pub fn allocate(
        device: Arc<dyn VideoOut>,
        handle: VideoHandle,
        pool: &mut DirectMemoryPool,
        width: u32,
        height: u32,
        count: usize,
    ) -> SceneResult<Self> {
        if width == 0 || height == 0 || count == 0 {
            return Err(SceneError::InvalidConfig(format!(
                "cannot allocate {} buffers of {}x{}",
                count, width, height
            )));
        }
        let size = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| {
                SceneError::InvalidConfig(format!("{}x{} buffer overflows", width, height))
            })?;

        let mut buffers = Vec::with_capacity(count);
        for index in 0..count {
            let allocation = pool.allocate(size)?;
            buffers.push(FrameBuffer {
                index,
                allocation,
                width,
                height,
            });
        }

        let addresses: Vec<u64> = buffers
            .iter()
            .map(|b| pool.address_of(b.allocation))
            .collect();
        let attribute = BufferAttribute::srgb(width, height);

        let status = device.register_buffers(handle, FIRST_SLOT, &addresses, &attribute);
        if status != 0 {
            log::error!("buffer registration failed with status {}", status);
            return Err(SceneError::unavailable(
                InitStage::RegisterBuffers,
                VideoOutError::Rejected(status),
            ));
        }
        log::debug!(
            "registered {} frame buffers of {}x{} ({:#x} bytes each)",
            count,
            width,
            height,
            size
        );

        Ok(Self {
            device,
            handle,
            buffers,
            attribute,
            active: 0,
            registered: true,
        })
    }

    /// Index of the buffer open for drawing.
    #[must_use]
    pub const fn active(&self) -> usize {
        self.active
    }

    /// # Errors
    /// `InvalidBufferIndex` if `index` is not a buffer of this set.
    pub fn set_active(&mut self, index: usize) -> SceneResult<()> {
        if index >= self.buffers.len() {
            return Err(SceneError::InvalidBufferIndex {
                index,
                count: self.buffers.len(),
            });
        }
        self.active = index;
        Ok(())
    }

    /// Advance the active index to the next buffer, wrapping around.
    pub fn swap(&mut self) {
        self.active = (self.active + 1) % self.buffers.len();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&FrameBuffer> {
        self.buffers.get(index)
    }

    #[must_use]
    pub fn active_buffer(&self) -> &FrameBuffer {
        &self.buffers[self.active]
    }

    #[must_use]
    pub fn buffers(&self) -> &[FrameBuffer] {
        &self.buffers
    }

    #[must_use]
    pub const fn attribute(&self) -> &BufferAttribute {
        &self.attribute
    }

    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Drawable view of buffer `index`.
    ///
    /// # Errors
    /// `InvalidBufferIndex` if `index` is not a buffer of this set.
    pub fn surface<'p>(
        &self,
        pool: &'p mut DirectMemoryPool,
        index: usize,
    ) -> SceneResult<Surface<'p>> {
        let buffer = self.get(index).ok_or(SceneError::InvalidBufferIndex {
            index,
            count: self.buffers.len(),
        })?;
        Surface::new(pool.bytes_mut(buffer.allocation), buffer.width, buffer.height)
    }

    /// Remove the registration from the controller.
    pub fn unregister(&mut self) {
        if self.registered {
            self.device.unregister_buffers(self.handle, FIRST_SLOT);
            self.registered = false;
        }
    }
}

impl Drop for FrameBufferSet {
    fn drop(&mut self) {
        self.unregister();
    }
}
