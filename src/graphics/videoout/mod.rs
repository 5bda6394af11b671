//!
//! Display controller interface.
//!
//! The engine never talks to a system library directly. Everything it needs
//! from the platform (video-out handles, direct memory, buffer
//! registration, flip submission and the flip-completion event queue) goes
//! through the [`VideoOut`] trait. [`soft::SoftVideoOut`] is an in-process
//! controller with a vblank clock.
//!

pub mod soft;

pub use soft::{SoftVideoOut, SubmittedFlip};

/// Handle to an opened video-out port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoHandle(pub i32);

/// Identifier of a kernel event queue used for flip notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlipQueueId(pub u32);

/// Offset of a direct-memory reservation in the physical pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectMemoryOffset(pub u64);

/// Video-out bus to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoBus {
    #[default]
    Main,
    Aux,
}

/// Presentation timing for a submitted flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipMode {
    /// Present at the next vertical sync.
    #[default]
    Vsync,
}

/// Pixel format tag for A8R8G8B8 sRGB buffers.
pub const PIXEL_FORMAT_A8R8G8B8_SRGB: u32 = 0x8000_0000;

/// Memory tiling of a registered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TilingMode {
    Tile,
    #[default]
    Linear,
}

/// Layout description passed along with a buffer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAttribute {
    pub pixel_format: u32,
    pub tiling: TilingMode,
    pub aspect_ratio: u32,
    pub width: u32,
    pub height: u32,
    /// Row pitch in pixels.
    pub pitch_in_pixels: u32,
}

impl BufferAttribute {
    /// Linear sRGB buffer whose pitch equals its width.
    #[must_use]
    pub const fn srgb(width: u32, height: u32) -> Self {
        Self {
            pixel_format: PIXEL_FORMAT_A8R8G8B8_SRGB,
            tiling: TilingMode::Linear,
            aspect_ratio: 0,
            width,
            height,
            pitch_in_pixels: width,
        }
    }
}

/// Snapshot of the controller's flip bookkeeping for one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlipStatus {
    /// Number of flips completed since the handle was opened.
    pub count: u64,
    /// Argument of the most recently completed flip.
    pub flip_arg: i64,
    /// Buffer currently being scanned out, if any flip has completed.
    pub current_buffer: Option<usize>,
    /// Flips submitted but not yet displayed.
    pub pending: usize,
}

/// Notification delivered through a flip queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipEvent {
    pub handle: VideoHandle,
    /// Argument of the flip that completed, or `None` for an unrelated wakeup.
    pub flip_arg: Option<i64>,
}

/// Where a controller operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultStage {
    Open,
    CreateQueue,
    AddFlipEvent,
    ReserveMemory,
    MapMemory,
    RegisterBuffers,
    SubmitFlip,
    FlipStatus,
    WaitEvent,
}

/// Errors reported by a display controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoOutError {
    #[error("video-out port is already open")]
    Busy,

    #[error("invalid video handle {0:?}")]
    InvalidHandle(VideoHandle),

    #[error("invalid flip queue {0:?}")]
    InvalidQueue(FlipQueueId),

    #[error("alignment {0:#x} is not a power of two")]
    InvalidAlignment(usize),

    #[error("direct memory exhausted: requested {requested:#x}, available {available:#x}")]
    OutOfDirectMemory { requested: usize, available: usize },

    #[error("no reservation at {0:?}")]
    UnknownReservation(DirectMemoryOffset),

    #[error("mapping of {size:#x} bytes failed")]
    MapFailed { size: usize },

    #[error("buffer index {0} is not registered")]
    InvalidBuffer(usize),

    #[error("request rejected with status {0}")]
    Rejected(i32),

    #[error("flip queue disconnected")]
    Disconnected,

    #[error("controller failure during {0:?}")]
    Fault(FaultStage),
}

/// Result type for controller operations.
pub type VideoOutResult<T> = Result<T, VideoOutError>;

/// A mapped direct-memory region. Dropping it unmaps the region.
pub trait MappedMemory: Send {
    /// Address the display controller sees for the first byte.
    fn base_address(&self) -> u64;

    fn as_slice(&self) -> &[u8];

    fn as_mut_slice(&mut self) -> &mut [u8];

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Display controller operations used by the frame-buffer engine.
///
/// Implementations are shared between the memory pool, the buffer set and
/// the flip controller, so every method takes `&self`.
pub trait VideoOut: Send + Sync {
    /// Open a video-out port.
    fn open(&self, bus: VideoBus) -> VideoOutResult<VideoHandle>;

    /// Close a port. Pending flips are discarded.
    fn close(&self, handle: VideoHandle);

    /// Create an event queue for flip notifications.
    fn create_flip_queue(&self, name: &str) -> VideoOutResult<FlipQueueId>;

    fn delete_flip_queue(&self, queue: FlipQueueId);

    /// Route flip-completion events for `handle` into `queue`.
    fn add_flip_event(&self, queue: FlipQueueId, handle: VideoHandle) -> VideoOutResult<()>;

    /// Reserve `size` bytes of direct memory aligned to `alignment`.
    fn reserve_direct_memory(
        &self,
        size: usize,
        alignment: usize,
    ) -> VideoOutResult<DirectMemoryOffset>;

    /// Map a reservation into the caller's address space.
    fn map_direct_memory(
        &self,
        offset: DirectMemoryOffset,
        size: usize,
        alignment: usize,
    ) -> VideoOutResult<Box<dyn MappedMemory>>;

    fn release_direct_memory(&self, offset: DirectMemoryOffset, size: usize);

    /// Register `addresses.len()` scan-out buffers starting at slot
    /// `start_index`. Returns the controller status code, `0` on success.
    /// A nonzero status leaves nothing registered.
    fn register_buffers(
        &self,
        handle: VideoHandle,
        start_index: usize,
        addresses: &[u64],
        attribute: &BufferAttribute,
    ) -> i32;

    fn unregister_buffers(&self, handle: VideoHandle, start_index: usize);

    /// Set the flip rate: 0 flips every vblank, 1 every second, 2 every third.
    fn set_flip_rate(&self, handle: VideoHandle, rate: u32) -> VideoOutResult<()>;

    /// Queue `buffer_index` for presentation. Never blocks.
    fn submit_flip(
        &self,
        handle: VideoHandle,
        buffer_index: usize,
        mode: FlipMode,
        flip_arg: i64,
    ) -> VideoOutResult<()>;

    fn flip_status(&self, handle: VideoHandle) -> VideoOutResult<FlipStatus>;

    /// Block until the next event arrives on `queue`.
    fn wait_flip_event(&self, queue: FlipQueueId) -> VideoOutResult<FlipEvent>;
}
