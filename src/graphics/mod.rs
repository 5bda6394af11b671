//! Frame-buffer engine.
//!
//! A [`Scene`] owns a direct-memory pool, the frame buffers carved from it
//! and the flip controller that presents them. Drawing goes through
//! [`raster`] into the active buffer; [`Renderer`] layers draw-color state
//! and batched calls on top.

pub mod color;
pub mod error;
pub mod flip;
pub mod framebuffer;
pub mod pool;
pub mod raster;
pub mod render;
pub mod scene;
pub mod surface;
pub mod texture;
pub mod videoout;

pub use color::Color;
pub use error::{InitStage, SceneError, SceneResult};
pub use flip::FlipController;
pub use framebuffer::{FrameBuffer, FrameBufferSet};
pub use pool::{Allocation, DirectMemoryPool, MemoryRegion};
pub use render::{DisplayMode, PixelFormat, Renderer, RendererInfo};
pub use scene::{create_scene, Scene};
pub use surface::{Point, Rect, Surface};
pub use texture::{create_texture, destroy_texture, Texture};
pub use videoout::{SoftVideoOut, VideoOut, VideoOutError};
