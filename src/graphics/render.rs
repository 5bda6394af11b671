//! Renderer facade over a [`Scene`].
//!
//! Holds the current draw color and turns batched draw calls into raster
//! operations on the active buffer. Every call marks the frame dirty before
//! drawing.

use crate::config::DEFAULT_REFRESH_RATE;
use crate::graphics::color::Color;
use crate::graphics::error::{SceneError, SceneResult};
use crate::graphics::raster;
use crate::graphics::scene::Scene;
use crate::graphics::surface::{Point, Rect};
use crate::graphics::texture::{self, Texture};

pub const RENDERER_NAME: &str = "ORBIS";

/// Largest texture edge the renderer accepts.
pub const MAX_TEXTURE_SIZE: u32 = 4096;

/// Pixel layouts the renderer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Argb8888,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RendererFlags {
    pub accelerated: bool,
    pub present_vsync: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererInfo {
    pub name: &'static str,
    pub flags: RendererFlags,
    pub texture_formats: &'static [PixelFormat],
    pub max_texture_width: u32,
    pub max_texture_height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
    pub format: PixelFormat,
}

/// Mirroring requested by `copy_ex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flip {
    #[default]
    None,
    Horizontal,
    Vertical,
}

const TEXTURE_FORMATS: &[PixelFormat] = &[PixelFormat::Argb8888];

#[derive(Debug)]
pub struct Renderer {
    scene: Scene,
    draw_color: Color,
}

impl Renderer {
    #[must_use]
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            draw_color: Color::WHITE,
        }
    }

    #[must_use]
    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[must_use]
    pub fn into_scene(self) -> Scene {
        self.scene
    }

    #[must_use]
    pub fn info(&self) -> RendererInfo {
        RendererInfo {
            name: RENDERER_NAME,
            flags: RendererFlags {
                accelerated: true,
                present_vsync: true,
            },
            texture_formats: TEXTURE_FORMATS,
            max_texture_width: MAX_TEXTURE_SIZE,
            max_texture_height: MAX_TEXTURE_SIZE,
        }
    }

    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        DisplayMode {
            width: self.scene.width(),
            height: self.scene.height(),
            refresh_rate: DEFAULT_REFRESH_RATE,
            format: PixelFormat::Argb8888,
        }
    }

    #[must_use]
    pub const fn draw_color(&self) -> Color {
        self.draw_color
    }

    pub fn set_draw_color(&mut self, color: Color) {
        self.draw_color = color;
    }

    /// Make the draw color the background and clear the active buffer to it.
    ///
    /// # Errors
    /// Propagates scene errors.
    pub fn clear(&mut self) -> SceneResult<()> {
        self.scene.set_background(self.draw_color);
        self.scene.clear_to_background()
    }

    /// # Errors
    /// Propagates scene errors.
    pub fn draw_point(&mut self, x: i32, y: i32) -> SceneResult<()> {
        self.scene.draw_pixel(x, y, self.draw_color)
    }

    /// # Errors
    /// Propagates scene errors.
    pub fn draw_points(&mut self, points: &[Point]) -> SceneResult<()> {
        self.scene.draw_points(points, self.draw_color)
    }

    /// # Errors
    /// Propagates scene errors.
    pub fn draw_line(&mut self, from: Point, to: Point) -> SceneResult<()> {
        self.scene.draw_line(from.x, from.y, to.x, to.y, self.draw_color)
    }

    /// Connected segments through `points`.
    ///
    /// # Errors
    /// Propagates scene errors.
    pub fn draw_lines(&mut self, points: &[Point]) -> SceneResult<()> {
        self.scene.draw_lines(points, self.draw_color)
    }

    /// Fill `rect`, or the whole target for `None`.
    ///
    /// # Errors
    /// Propagates scene errors.
    pub fn fill_rect(&mut self, rect: Option<Rect>) -> SceneResult<()> {
        let rect = rect.unwrap_or_else(|| self.scene.bounds());
        self.fill_rects(&[rect])
    }

    /// # Errors
    /// Propagates scene errors.
    pub fn fill_rects(&mut self, rects: &[Rect]) -> SceneResult<()> {
        self.scene.fill_rects(rects, self.draw_color)
    }

    /// Copy `src` of `texture` (all of it for `None`) to `dst` (the origin
    /// for `None`) without scaling. The copy is clipped to the target.
    ///
    /// # Errors
    /// `InvalidRect` if `src` leaves the texture, `ScalingUnsupported` if
    /// `dst` differs in size from `src`.
    pub fn copy(
        &mut self,
        texture: &Texture,
        src: Option<Rect>,
        dst: Option<Rect>,
    ) -> SceneResult<()> {
        let src = src.unwrap_or_else(|| texture.bounds());
        if src.is_empty() || src.intersect(&texture.bounds()) != Some(src) {
            return Err(SceneError::InvalidRect);
        }
        let dst = dst.unwrap_or(Rect::new(0, 0, src.w, src.h));
        if (dst.w, dst.h) != (src.w, src.h) {
            return Err(SceneError::ScalingUnsupported);
        }

        let written = self.scene.with_active_surface(|surface| {
            raster::blit(
                surface,
                texture.bytes(),
                texture.width(),
                texture.height(),
                texture.width(),
                src,
                Point::new(dst.x, dst.y),
            )
        })?;
        if written.is_none() {
            log::trace!("copy to {:?} fell outside the target", dst);
        }
        Ok(())
    }

    /// Rotated or mirrored copy.
    ///
    /// # Errors
    /// Always `Unsupported`.
    pub fn copy_ex(
        &mut self,
        _texture: &Texture,
        _src: Option<Rect>,
        _dst: Option<Rect>,
        _angle: f64,
        _center: Option<Point>,
        _flip: Flip,
    ) -> SceneResult<()> {
        Err(SceneError::Unsupported("rotated or mirrored copy"))
    }

    /// Pixels of `rect` (the whole target for `None`) in the active buffer.
    ///
    /// # Errors
    /// `InvalidRect` if `rect` is not inside the target.
    pub fn read_pixels(&self, rect: Option<Rect>) -> SceneResult<Vec<u32>> {
        self.scene
            .read_pixels(rect.unwrap_or_else(|| self.scene.bounds()))
    }

    /// # Errors
    /// `DeviceLost` if the flip fails.
    pub fn present(&mut self) -> SceneResult<bool> {
        self.scene.present()
    }

    /// # Errors
    /// `TextureAllocation` for empty or oversized textures.
    pub fn create_texture(&self, width: u32, height: u32) -> SceneResult<Texture> {
        if width > MAX_TEXTURE_SIZE || height > MAX_TEXTURE_SIZE {
            return Err(SceneError::TextureAllocation { width, height });
        }
        texture::create_texture(width, height)
    }

    pub fn destroy_texture(&self, tex: Texture) {
        texture::destroy_texture(tex);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::graphics::videoout::SoftVideoOut;
    use std::sync::Arc;
    use std::time::Duration;

    fn renderer(width: u32, height: u32) -> (Arc<SoftVideoOut>, Renderer) {
        let dev = Arc::new(SoftVideoOut::with_vsync(Duration::from_millis(1)).unwrap());
        let config = SceneConfig {
            width,
            height,
            memory_size: 0x10000,
            reservation_alignment: 0x1000,
            allocation_granularity: 64,
            ..SceneConfig::default()
        };
        let scene = Scene::new(dev.clone(), &config).unwrap();
        (dev, Renderer::new(scene))
    }

    #[test]
    fn test_info_and_display_mode() {
        let (_dev, r) = renderer(4, 4);
        let info = r.info();
        assert_eq!(info.name, "ORBIS");
        assert!(info.flags.accelerated);
        assert!(info.flags.present_vsync);
        assert_eq!(info.texture_formats, &[PixelFormat::Argb8888]);
        assert_eq!(r.display_mode().refresh_rate, 60);
        assert_eq!((r.display_mode().width, r.display_mode().height), (4, 4));
    }

    #[test]
    fn test_clear_sets_background_and_marks_dirty() {
        let (_dev, mut r) = renderer(2, 2);
        assert!(!r.scene().is_drawing());
        r.set_draw_color(Color::BLUE);
        r.clear().unwrap();
        assert!(r.scene().is_drawing());
        assert_eq!(r.scene().background(), Color::BLUE);
        assert_eq!(r.read_pixels(None).unwrap(), vec![Color::BLUE.packed(); 4]);
    }

    #[test]
    fn test_draw_calls_use_draw_color() {
        let (_dev, mut r) = renderer(4, 2);
        r.set_draw_color(Color::BLACK);
        r.clear().unwrap();
        r.set_draw_color(Color::RED);
        r.draw_points(&[Point::new(3, 1)]).unwrap();
        r.set_draw_color(Color::GREEN);
        r.fill_rects(&[Rect::new(0, 0, 2, 1)]).unwrap();
        r.set_draw_color(Color::BLUE);
        r.draw_lines(&[Point::new(0, 1), Point::new(1, 1), Point::new(3, 1)])
            .unwrap();
        let (k, red, g, b) = (
            Color::BLACK.packed(),
            Color::RED.packed(),
            Color::GREEN.packed(),
            Color::BLUE.packed(),
        );
        assert_eq!(r.read_pixels(None).unwrap(), vec![g, g, k, k, b, b, b, red]);
    }

    #[test]
    fn test_copy_blits_clipped() {
        let (_dev, mut r) = renderer(3, 3);
        r.set_draw_color(Color::BLACK);
        r.clear().unwrap();
        let mut tex = r.create_texture(2, 2).unwrap();
        {
            let mut s = tex.surface();
            raster::fill(&mut s, Color::RED);
        }
        r.copy(&tex, None, Some(Rect::new(2, 2, 2, 2))).unwrap();
        assert_eq!(
            r.read_pixels(Some(Rect::new(2, 2, 1, 1))).unwrap(),
            vec![Color::RED.packed()]
        );
        assert_eq!(
            r.read_pixels(Some(Rect::new(1, 1, 1, 1))).unwrap(),
            vec![Color::BLACK.packed()]
        );
        r.destroy_texture(tex);
    }

    #[test]
    fn test_copy_rejects_scaling_and_rotation() {
        let (_dev, mut r) = renderer(4, 4);
        let tex = r.create_texture(2, 2).unwrap();
        assert_eq!(
            r.copy(&tex, None, Some(Rect::new(0, 0, 4, 4))),
            Err(SceneError::ScalingUnsupported)
        );
        assert_eq!(
            r.copy(&tex, Some(Rect::new(1, 1, 2, 2)), None),
            Err(SceneError::InvalidRect)
        );
        assert!(matches!(
            r.copy_ex(&tex, None, None, 90.0, None, Flip::Horizontal),
            Err(SceneError::Unsupported(_))
        ));
    }

    #[test]
    fn test_create_texture_limits() {
        let (_dev, r) = renderer(2, 2);
        assert!(r.create_texture(MAX_TEXTURE_SIZE + 1, 1).is_err());
        assert!(r.create_texture(0, 1).is_err());
    }

    #[test]
    fn test_present_flips_once_per_frame() {
        let (dev, mut r) = renderer(2, 2);
        assert!(!r.present().unwrap());
        r.draw_point(0, 0).unwrap();
        assert!(r.present().unwrap());
        assert!(!r.present().unwrap());
        assert_eq!(dev.submitted_flips().len(), 1);
        assert_eq!(r.scene().active_index(), 1);
    }
}
