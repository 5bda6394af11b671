//! The scene: one pool, one frame-buffer set and one flip controller.
//!
//! Drawing goes straight into the active buffer. `present` submits that
//! buffer, waits until the controller reports it on screen and only then
//! moves drawing to the next buffer, so a buffer is never written while a
//! flip referencing it is outstanding. If the wait fails the flip stays
//! recorded, and drawing or presenting first waits it out again.

use std::sync::Arc;

use crate::config::SceneConfig;
use crate::graphics::color::{Color, BYTES_PER_PIXEL};
use crate::graphics::error::{InitStage, SceneError, SceneResult};
use crate::graphics::flip::FlipController;
use crate::graphics::framebuffer::FrameBufferSet;
use crate::graphics::pool::DirectMemoryPool;
use crate::graphics::raster;
use crate::graphics::surface::{Point, Rect, Surface};
use crate::graphics::videoout::{FlipStatus, VideoHandle, VideoOut, VideoOutError};

/// Build a scene with the default pool parameters.
///
/// # Errors
/// See [`Scene::new`].
pub fn create_scene(
    device: Arc<dyn VideoOut>,
    width: u32,
    height: u32,
    color_depth: u32,
    total_memory: usize,
    buffer_count: usize,
) -> SceneResult<Scene> {
    let config = SceneConfig {
        width,
        height,
        depth: color_depth,
        memory_size: total_memory,
        buffer_count,
        ..SceneConfig::default()
    };
    Scene::new(device, &config)
}

pub struct Scene {
    // Field order is drop order: buffers are unregistered before the pool
    // is unmapped, and the handle is closed last.
    buffers: FrameBufferSet,
    pool: DirectMemoryPool,
    flip: FlipController,
    width: u32,
    height: u32,
    background: Color,
    last_flip_id: i64,
    outstanding_flip: Option<i64>,
    drawing: bool,
    frames_presented: u64,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("buffers", &self.buffers)
            .field("pool", &self.pool)
            .field("flip", &self.flip)
            .field("last_flip_id", &self.last_flip_id)
            .field("outstanding_flip", &self.outstanding_flip)
            .field("drawing", &self.drawing)
            .finish()
    }
}

impl Scene {
    /// Open the display, reserve video memory, register the frame buffers
    /// and fill every buffer with the background color.
    ///
    /// # Errors
    /// `InvalidConfig` for an unsupported depth or empty size,
    /// `DeviceUnavailable` when any device step fails and `OutOfVideoMemory`
    /// when the buffers do not fit. Everything acquired before the failure
    /// is released in reverse order.
    pub fn new(device: Arc<dyn VideoOut>, config: &SceneConfig) -> SceneResult<Self> {
        if config.depth as usize != BYTES_PER_PIXEL {
            return Err(SceneError::InvalidConfig(format!(
                "unsupported color depth {}",
                config.depth
            )));
        }
        if config.width == 0 || config.height == 0 || config.buffer_count == 0 {
            return Err(SceneError::InvalidConfig(format!(
                "cannot build {} buffers of {}x{}",
                config.buffer_count, config.width, config.height
            )));
        }

        let flip = FlipController::open(Arc::clone(&device))?;
        let handle = flip.handle().ok_or(SceneError::unavailable(
            InitStage::OpenVideoOut,
            VideoOutError::InvalidHandle(VideoHandle(0)),
        ))?;
        let mut pool = DirectMemoryPool::new(
            Arc::clone(&device),
            config.memory_size,
            config.reservation_alignment,
            config.allocation_granularity,
        )?;
        let buffers = FrameBufferSet::allocate(
            device,
            handle,
            &mut pool,
            config.width,
            config.height,
            config.buffer_count,
        )?;
        flip.set_flip_rate(config.flip_rate).map_err(|e| match e {
            SceneError::DeviceLost(source) => {
                SceneError::unavailable(InitStage::SetFlipRate, source)
            }
            other => other,
        })?;

        let mut scene = Self {
            buffers,
            pool,
            flip,
            width: config.width,
            height: config.height,
            background: config.background,
            last_flip_id: 0,
            outstanding_flip: None,
            drawing: false,
            frames_presented: 0,
        };
        for index in 0..scene.buffers.len() {
            let mut surface = scene.buffers.surface(&mut scene.pool, index)?;
            raster::fill(&mut surface, scene.background);
        }

        log::info!(
            "scene ready: {}x{}, {} buffers, handle {}",
            scene.width,
            scene.height,
            scene.buffers.len(),
            handle.0
        );
        Ok(scene)
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Index of the buffer open for drawing.
    #[must_use]
    pub const fn active_index(&self) -> usize {
        self.buffers.active()
    }

    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub const fn buffers(&self) -> &FrameBufferSet {
        &self.buffers
    }

    #[must_use]
    pub const fn pool(&self) -> &DirectMemoryPool {
        &self.pool
    }

    #[must_use]
    pub const fn handle(&self) -> Option<VideoHandle> {
        self.flip.handle()
    }

    /// Identifier of the most recently submitted flip, 0 before the first.
    #[must_use]
    pub const fn last_flip_id(&self) -> i64 {
        self.last_flip_id
    }

    /// Submitted flip whose completion has not been observed yet.
    #[must_use]
    pub const fn outstanding_flip(&self) -> Option<i64> {
        self.outstanding_flip
    }

    #[must_use]
    pub const fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Controller status seen by the last wait.
    #[must_use]
    pub const fn flip_status(&self) -> FlipStatus {
        self.flip.last_status()
    }

    #[must_use]
    pub const fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// Whether something was drawn since the last present.
    #[must_use]
    pub const fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Mark the frame dirty. Returns `false` if it already was.
    pub fn start_drawing(&mut self) -> bool {
        if self.drawing {
            return false;
        }
        self.drawing = true;
        true
    }

    /// Show the active buffer and move drawing to the next one.
    ///
    /// Returns `Ok(false)` without touching the device when nothing was
    /// drawn since the last present. A flip left outstanding by an earlier
    /// failed wait is waited out first and counts as this present.
    ///
    /// # Errors
    /// `DeviceLost` if the submit or the wait fails. The active buffer is
    /// left unchanged in that case, and after a failed wait it stays locked
    /// until the flip is seen to complete.
    pub fn present(&mut self) -> SceneResult<bool> {
        if self.finish_flip()? {
            return Ok(true);
        }
        if !self.drawing {
            return Ok(false);
        }
        self.last_flip_id += 1;
        let flip_id = self.last_flip_id;
        let index = self.buffers.active();

        self.flip.submit(index, flip_id)?;
        self.outstanding_flip = Some(flip_id);
        self.finish_flip()?;
        Ok(true)
    }

    /// Wait for the outstanding flip, if any, then swap buffers.
    fn finish_flip(&mut self) -> SceneResult<bool> {
        let Some(flip_id) = self.outstanding_flip else {
            return Ok(false);
        };
        if let Err(e) = self.flip.wait(flip_id) {
            log::warn!("flip {} still outstanding: {}", flip_id, e);
            return Err(e);
        }
        self.outstanding_flip = None;

        let index = self.buffers.active();
        self.buffers.swap();
        self.drawing = false;
        self.frames_presented += 1;
        log::trace!(
            "presented buffer {} as flip {}, drawing into {}",
            index,
            flip_id,
            self.buffers.active()
        );
        Ok(true)
    }

    /// Run `f` on the active buffer after marking the frame dirty.
    ///
    /// # Errors
    /// `DeviceLost` if an outstanding flip still cannot be waited out,
    /// `InvalidBufferIndex` if the active buffer cannot be viewed.
    pub fn with_active_surface<R>(
        &mut self,
        f: impl FnOnce(&mut Surface<'_>) -> R,
    ) -> SceneResult<R> {
        self.finish_flip()?;
        self.start_drawing();
        let index = self.buffers.active();
        let mut surface = self.buffers.surface(&mut self.pool, index)?;
        Ok(f(&mut surface))
    }

    /// Fill the active buffer.
    ///
    /// # Errors
    /// See [`Scene::with_active_surface`].
    pub fn clear(&mut self, color: Color) -> SceneResult<()> {
        self.with_active_surface(|s| raster::fill(s, color))
    }

    /// Fill the active buffer with the background color.
    ///
    /// # Errors
    /// See [`Scene::with_active_surface`].
    pub fn clear_to_background(&mut self) -> SceneResult<()> {
        let color = self.background;
        self.clear(color)
    }

    /// # Errors
    /// See [`Scene::with_active_surface`].
    pub fn draw_pixel(&mut self, x: i32, y: i32, color: Color) -> SceneResult<()> {
        self.with_active_surface(|s| {
            raster::draw_pixel(s, x, y, color);
        })
    }

    /// # Errors
    /// See [`Scene::with_active_surface`].
    pub fn draw_line(
        &mut self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        color: Color,
    ) -> SceneResult<()> {
        self.with_active_surface(|s| raster::draw_line(s, x1, y1, x2, y2, color))
    }

    /// # Errors
    /// See [`Scene::with_active_surface`].
    pub fn draw_rectangle(
        &mut self,
        x: i32,
        y: i32,
        w: u32,
        h: u32,
        color: Color,
    ) -> SceneResult<()> {
        self.with_active_surface(|s| raster::draw_rectangle(s, x, y, w, h, color))
    }

    /// Same as [`Scene::clear`].
    ///
    /// # Errors
    /// See [`Scene::with_active_surface`].
    pub fn fill(&mut self, color: Color) -> SceneResult<()> {
        self.clear(color)
    }

    /// # Errors
    /// See [`Scene::with_active_surface`].
    pub fn draw_points(&mut self, points: &[Point], color: Color) -> SceneResult<()> {
        self.with_active_surface(|s| raster::draw_points(s, points, color))
    }

    /// # Errors
    /// See [`Scene::with_active_surface`].
    pub fn draw_lines(&mut self, points: &[Point], color: Color) -> SceneResult<()> {
        self.with_active_surface(|s| raster::draw_lines(s, points, color))
    }

    /// # Errors
    /// See [`Scene::with_active_surface`].
    pub fn fill_rects(&mut self, rects: &[Rect], color: Color) -> SceneResult<()> {
        self.with_active_surface(|s| raster::fill_rects(s, rects, color))
    }

    /// Pixel `(x, y)` of buffer `index`, `None` outside the image.
    ///
    /// # Errors
    /// `InvalidBufferIndex` if `index` is not a buffer of this scene.
    pub fn buffer_pixel(&self, index: usize, x: i32, y: i32) -> SceneResult<Option<u32>> {
        let buffer = self
            .buffers
            .get(index)
            .ok_or(SceneError::InvalidBufferIndex {
                index,
                count: self.buffers.len(),
            })?;
        if !self.bounds().contains(x, y) {
            return Ok(None);
        }
        let start = (y as usize * buffer.stride() as usize + x as usize) * BYTES_PER_PIXEL;
        let bytes = self.pool.bytes(buffer.allocation());
        Ok(bytes
            .get(start..start + BYTES_PER_PIXEL)
            .map(|p| u32::from_le_bytes([p[0], p[1], p[2], p[3]])))
    }

    /// Pixel `(x, y)` of the active buffer.
    #[must_use]
    pub fn read_pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.buffer_pixel(self.buffers.active(), x, y).ok().flatten()
    }

    /// Pixels of `rect` in the active buffer, row by row.
    ///
    /// # Errors
    /// `InvalidRect` if `rect` is empty or not inside the scene.
    pub fn read_pixels(&self, rect: Rect) -> SceneResult<Vec<u32>> {
        if rect.is_empty() || rect.intersect(&self.bounds()) != Some(rect) {
            return Err(SceneError::InvalidRect);
        }
        let mut out = Vec::with_capacity(rect.w as usize * rect.h as usize);
        for y in rect.y..rect.y + rect.h as i32 {
            for x in rect.x..rect.x + rect.w as i32 {
                out.push(self.read_pixel(x, y).ok_or(SceneError::InvalidRect)?);
            }
        }
        Ok(out)
    }
}
