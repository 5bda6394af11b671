//! Colors and the packed frame-buffer pixel encoding.
//!
//! Every pixel in a frame buffer or texture is one little-endian `u32`:
//! `0x80000000 | R << 16 | G << 8 | B`. The top bit is the opaque/sRGB
//! marker the display controller expects for the A8R8G8B8 buffer format.

/// Opaque marker carried by every packed pixel.
pub const OPAQUE_BIT: u32 = 0x8000_0000;

/// Bytes occupied by one packed pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const BLUE: Color = Color::new(0, 0, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Encode to the packed 32-bit pixel value.
    #[must_use]
    pub const fn packed(self) -> u32 {
        OPAQUE_BIT | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Decode a packed pixel. The opaque bit and any alpha byte are ignored.
    #[must_use]
    pub const fn from_packed(value: u32) -> Self {
        Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        }
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}
