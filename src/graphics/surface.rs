//! Bounds-known pixel views.
//!
//! A `Surface` borrows the bytes of a frame buffer or texture and knows its
//! width, height and pitch. Pixel addresses are computed as
//! `y * pitch + x` like on the hardware, but every access is checked against
//! the borrowed bytes.

use crate::graphics::color::BYTES_PER_PIXEL;
use crate::graphics::error::{SceneError, SceneResult};

/// Integer point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, `[x, x + w) x [y, y + h)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        x >= i64::from(self.x)
            && y >= i64::from(self.y)
            && x < i64::from(self.x) + i64::from(self.w)
            && y < i64::from(self.y) + i64::from(self.h)
    }

    /// Overlap of two rectangles, `None` when they do not intersect.
    #[must_use]
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = i64::from(self.x).max(i64::from(other.x));
        let y0 = i64::from(self.y).max(i64::from(other.y));
        let x1 =
            (i64::from(self.x) + i64::from(self.w)).min(i64::from(other.x) + i64::from(other.w));
        let y1 =
            (i64::from(self.y) + i64::from(self.h)).min(i64::from(other.y) + i64::from(other.h));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// Mutable view over packed 32-bit pixels.
#[derive(Debug)]
pub struct Surface<'a> {
    bytes: &'a mut [u8],
    width: u32,
    height: u32,
    pitch: u32,
}

impl<'a> Surface<'a> {
    /// View `bytes` as a `width` x `height` image with pitch equal to width.
    ///
    /// # Errors
    /// `InvalidConfig` if `bytes` is too small for the image.
    pub fn new(bytes: &'a mut [u8], width: u32, height: u32) -> SceneResult<Self> {
        let needed = width as usize * height as usize * BYTES_PER_PIXEL;
        if bytes.len() < needed {
            return Err(SceneError::InvalidConfig(format!(
                "{} bytes cannot hold a {}x{} surface",
                bytes.len(),
                width,
                height
            )));
        }
        Ok(Self {
            bytes,
            width,
            height,
            pitch: width,
        })
    }

    /// View over memory already known to hold `width * height` pixels.
    pub(crate) fn from_parts(bytes: &'a mut [u8], width: u32, height: u32) -> Self {
        debug_assert!(bytes.len() >= width as usize * height as usize * BYTES_PER_PIXEL);
        Self {
            bytes,
            width,
            height,
            pitch: width,
        }
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
    pub const fn pitch(&self) -> u32 {
        self.pitch
    }

    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Number of addressable pixels in the borrowed memory.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.bytes.len() / BYTES_PER_PIXEL
    }

    /// Linear pixel index of `(x, y)`, without checking `x` against the width.
    #[must_use]
    pub fn linear_index(&self, x: i32, y: i32) -> Option<usize> {
        let index = i64::from(y) * i64::from(self.pitch) + i64::from(x);
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.pixel_count())
    }

    /// Store `value` at linear pixel `index`. Returns `false` when the index
    /// lies outside the borrowed memory.
    pub fn store(&mut self, index: usize, value: u32) -> bool {
        let start = index * BYTES_PER_PIXEL;
        match self.bytes.get_mut(start..start + BYTES_PER_PIXEL) {
            Some(slot) => {
                slot.copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }

    /// Load the pixel at linear `index`.
    #[must_use]
    pub fn load(&self, index: usize) -> Option<u32> {
        let start = index * BYTES_PER_PIXEL;
        let slot = self.bytes.get(start..start + BYTES_PER_PIXEL)?;
        Some(u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]))
    }

    /// Pixel at `(x, y)`, `None` outside the image.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> Option<u32> {
        if !self.bounds().contains(x, y) {
            return None;
        }
        self.load(self.linear_index(x, y)?)
    }

    /// Bytes of row `y`.
    #[must_use]
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.height {
            return None;
        }
        let row_bytes = self.pitch as usize * BYTES_PER_PIXEL;
        let start = y as usize * row_bytes;
        self.bytes
            .get_mut(start..start + self.width as usize * BYTES_PER_PIXEL)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }
}
