//! Heap textures used as blit sources.
//!
//! Textures never come from the direct-memory pool and carry no flip state.

use crate::graphics::color::BYTES_PER_PIXEL;
use crate::graphics::error::{SceneError, SceneResult};
use crate::graphics::surface::{Rect, Surface};

/// Packed 32-bit pixel image owned by its creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Allocate a zeroed `width` x `height` texture.
///
/// # Errors
/// `TextureAllocation` for an empty size or when the heap refuses the
/// allocation.
pub fn create_texture(width: u32, height: u32) -> SceneResult<Texture> {
    let failed = SceneError::TextureAllocation { width, height };
    if width == 0 || height == 0 {
        return Err(failed);
    }
    let size = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| failed.clone())?;

    let mut pixels = Vec::new();
    if pixels.try_reserve_exact(size).is_err() {
        log::warn!("texture allocation of {} bytes refused", size);
        return Err(failed);
    }
    pixels.resize(size, 0);
    log::trace!("created {}x{} texture", width, height);
    Ok(Texture {
        width,
        height,
        pixels,
    })
}

/// Release a texture. Taking it by value ends every borrow of its pixels.
pub fn destroy_texture(texture: Texture) {
    log::trace!("destroyed {}x{} texture", texture.width, texture.height);
    drop(texture);
}

impl Texture {
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes.
    #[must_use]
    pub const fn pitch(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Drawable view of the whole texture.
    pub fn surface(&mut self) -> Surface<'_> {
        Surface::from_parts(&mut self.pixels, self.width, self.height)
    }

    /// Pixel at `(x, y)`, `None` outside the texture.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        if !self.bounds().contains(x, y) {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let slot = self.pixels.get(start..start + BYTES_PER_PIXEL)?;
        Some(u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]))
    }

    /// Copy `pixels` (rows of `pitch` bytes) into `rect`, or into the whole
    /// texture when `rect` is `None`.
    ///
    /// # Errors
    /// `InvalidRect` if the rectangle is empty or leaves the texture, or if
    /// `pixels` is too short for it.
    pub fn update(&mut self, rect: Option<Rect>, pixels: &[u8], pitch: usize) -> SceneResult<()> {
        let rect = self.checked_rect(rect)?;
        let row_len = rect.w as usize * BYTES_PER_PIXEL;
        let rows = rect.h as usize;
        if pitch < row_len || pixels.len() < (rows - 1) * pitch + row_len {
            return Err(SceneError::InvalidRect);
        }

        let own_pitch = self.pitch();
        let origin = self.offset_of(rect);
        if pitch == row_len && own_pitch == row_len {
            let len = rows * row_len;
            self.pixels[origin..origin + len].copy_from_slice(&pixels[..len]);
            return Ok(());
        }
        for row in 0..rows {
            let dst = origin + row * own_pitch;
            let src = row * pitch;
            self.pixels[dst..dst + row_len].copy_from_slice(&pixels[src..src + row_len]);
        }
        Ok(())
    }

    /// Writable bytes starting at the origin of `rect` together with the
    /// texture pitch in bytes.
    ///
    /// # Errors
    /// `InvalidRect` if the rectangle is empty or leaves the texture.
    pub fn lock(&mut self, rect: Option<Rect>) -> SceneResult<(&mut [u8], usize)> {
        let rect = self.checked_rect(rect)?;
        let origin = self.offset_of(rect);
        let pitch = self.pitch();
        Ok((&mut self.pixels[origin..], pitch))
    }

    fn checked_rect(&self, rect: Option<Rect>) -> SceneResult<Rect> {
        let rect = rect.unwrap_or_else(|| self.bounds());
        match rect.intersect(&self.bounds()) {
            Some(clipped) if clipped == rect => Ok(rect),
            _ => Err(SceneError::InvalidRect),
        }
    }

    fn offset_of(&self, rect: Rect) -> usize {
        (rect.y as usize * self.width as usize + rect.x as usize) * BYTES_PER_PIXEL
    }
}
