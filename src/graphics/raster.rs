//! Software raster primitives.
//!
//! Stateless functions writing packed pixels straight into a [`Surface`].
//! There is no clipping: a pixel is addressed as `y * width + x`, so an `x`
//! past the right edge lands on the following row. Addresses outside the
//! surface memory are dropped.

use crate::graphics::color::{Color, BYTES_PER_PIXEL};
use crate::graphics::surface::{Point, Rect, Surface};

/// Write one pixel. Returns `false` if the address fell outside the surface
/// memory and nothing was written.
pub fn draw_pixel(surface: &mut Surface<'_>, x: i32, y: i32, color: Color) -> bool {
    match surface.linear_index(x, y) {
        Some(index) => surface.store(index, color.packed()),
        None => {
            log::trace!("pixel ({}, {}) outside surface memory", x, y);
            false
        }
    }
}

/// Read back the pixel at `(x, y)`.
#[must_use]
pub fn read_pixel(surface: &Surface<'_>, x: i32, y: i32) -> Option<u32> {
    surface.get(x, y)
}

/// Draw a line by stepping x over `[x1, x2)` and interpolating y.
///
/// Only left-to-right spans are drawn; `x2 <= x1` (including vertical
/// lines) draws nothing.
pub fn draw_line(surface: &mut Surface<'_>, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
    let dx = i64::from(x2) - i64::from(x1);
    let dy = i64::from(y2) - i64::from(y1);
    let mut y = i64::from(y1);

    for x in x1..x2 {
        if dx != 0 {
            y = i64::from(y1) + dy * (i64::from(x) - i64::from(x1)) / dx;
        }
        draw_pixel(surface, x, y as i32, color);
    }
}

/// Fill `[x, x + w) x [y, y + h)` one pixel at a time.
pub fn draw_rectangle(surface: &mut Surface<'_>, x: i32, y: i32, w: u32, h: u32, color: Color) {
    let x_end = i64::from(x) + i64::from(w);
    let y_end = i64::from(y) + i64::from(h);
    for row in i64::from(y)..y_end {
        for col in i64::from(x)..x_end {
            draw_pixel(surface, col as i32, row as i32, color);
        }
    }
}

/// Fill the whole surface.
pub fn fill(surface: &mut Surface<'_>, color: Color) {
    let (w, h) = (surface.width(), surface.height());
    draw_rectangle(surface, 0, 0, w, h, color);
}

/// Draw every point.
pub fn draw_points(surface: &mut Surface<'_>, points: &[Point], color: Color) {
    for p in points {
        draw_pixel(surface, p.x, p.y, color);
    }
}

/// Draw a polyline: segment `i` joins `points[i]` and `points[i + 1]`.
pub fn draw_lines(surface: &mut Surface<'_>, points: &[Point], color: Color) {
    for pair in points.windows(2) {
        draw_line(surface, pair[0].x, pair[0].y, pair[1].x, pair[1].y, color);
    }
}

pub fn fill_rects(surface: &mut Surface<'_>, rects: &[Rect], color: Color) {
    for r in rects {
        draw_rectangle(surface, r.x, r.y, r.w, r.h, color);
    }
}

/// Copy `src_rect` of a packed-pixel source onto `surface` at `dst`, 1:1.
///
/// `src` holds rows of `src_pitch` pixels. Both rectangles are clipped
/// against their images. Returns the rectangle actually written.
pub fn blit(
    surface: &mut Surface<'_>,
    src: &[u8],
    src_width: u32,
    src_height: u32,
    src_pitch: u32,
    src_rect: Rect,
    dst: Point,
) -> Option<Rect> {
    let requested = src_rect;
    let src_rect = requested.intersect(&Rect::new(0, 0, src_width, src_height))?;

    // Clipping the source moves the destination origin by the same amount.
    let shifted = Rect::new(
        dst.x.saturating_add(src_rect.x - requested.x),
        dst.y.saturating_add(src_rect.y - requested.y),
        src_rect.w,
        src_rect.h,
    );
    let dst_rect = shifted.intersect(&surface.bounds())?;

    let off_x = (dst_rect.x - shifted.x) as u32;
    let off_y = (dst_rect.y - shifted.y) as u32;
    let row_len = dst_rect.w as usize * BYTES_PER_PIXEL;

    for row in 0..dst_rect.h {
        let sy = (src_rect.y as u32 + off_y + row) as usize;
        let sx = (src_rect.x as u32 + off_x) as usize;
        let start = (sy * src_pitch as usize + sx) * BYTES_PER_PIXEL;
        let Some(src_row) = src.get(start..start + row_len) else {
            break;
        };
        let dst_x = dst_rect.x as usize * BYTES_PER_PIXEL;
        let Some(dst_row) = surface.row_mut(dst_rect.y as u32 + row) else {
            break;
        };
        dst_row[dst_x..dst_x + row_len].copy_from_slice(src_row);
    }
    Some(dst_rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pixels(w: u32, h: u32) -> Vec<u8> {
        vec![0; (w * h) as usize * BYTES_PER_PIXEL]
    }

    #[test]
    fn test_draw_pixel_writes_packed_color() {
        let mut mem = pixels(3, 3);
        let mut s = Surface::new(&mut mem, 3, 3).unwrap();
        assert!(draw_pixel(&mut s, 1, 2, Color::RED));
        assert_eq!(read_pixel(&s, 1, 2), Some(0x80FF_0000));
        assert_eq!(read_pixel(&s, 2, 1), Some(0));
    }

    #[test]
    fn test_draw_pixel_past_right_edge_wraps_to_next_row() {
        let mut mem = pixels(3, 3);
        let mut s = Surface::new(&mut mem, 3, 3).unwrap();
        assert!(draw_pixel(&mut s, 3, 0, Color::BLUE));
        assert_eq!(read_pixel(&s, 0, 1), Some(Color::BLUE.packed()));
    }

    #[test]
    fn test_draw_pixel_outside_memory_is_dropped() {
        let mut mem = pixels(2, 2);
        let mut s = Surface::new(&mut mem, 2, 2).unwrap();
        assert!(!draw_pixel(&mut s, 0, 2, Color::RED));
        assert!(!draw_pixel(&mut s, -1, 0, Color::RED));
        assert!(s.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_horizontal_line_is_half_open() {
        let mut mem = pixels(5, 1);
        let mut s = Surface::new(&mut mem, 5, 1).unwrap();
        draw_line(&mut s, 1, 0, 4, 0, Color::GREEN);
        let row: Vec<_> = (0..5).map(|x| read_pixel(&s, x, 0).unwrap()).collect();
        let g = Color::GREEN.packed();
        assert_eq!(row, vec![0, g, g, g, 0]);
    }

    #[test]
    fn test_diagonal_line_interpolates_y() {
        let mut mem = pixels(5, 5);
        let mut s = Surface::new(&mut mem, 5, 5).unwrap();
        draw_line(&mut s, 0, 0, 4, 4, Color::WHITE);
        for i in 0..4 {
            assert_eq!(read_pixel(&s, i, i), Some(Color::WHITE.packed()));
        }
        assert_eq!(read_pixel(&s, 4, 4), Some(0));
    }

    #[test]
    fn test_shallow_line_truncates_toward_start() {
        let mut mem = pixels(4, 2);
        let mut s = Surface::new(&mut mem, 4, 2).unwrap();
        // dy/dx = 1/4: y stays at 0 until x reaches x1 + 4.
        draw_line(&mut s, 0, 0, 4, 1, Color::RED);
        for x in 0..4 {
            assert_eq!(read_pixel(&s, x, 0), Some(Color::RED.packed()));
        }
    }

    #[test]
    fn test_vertical_and_reversed_lines_draw_nothing() {
        let mut mem = pixels(4, 4);
        let mut s = Surface::new(&mut mem, 4, 4).unwrap();
        draw_line(&mut s, 1, 0, 1, 3, Color::RED);
        draw_line(&mut s, 3, 0, 0, 0, Color::RED);
        assert!(s.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_polyline_joins_consecutive_points() {
        let mut mem = pixels(6, 1);
        let mut s = Surface::new(&mut mem, 6, 1).unwrap();
        draw_lines(
            &mut s,
            &[Point::new(0, 0), Point::new(2, 0), Point::new(5, 0)],
            Color::BLUE,
        );
        let b = Color::BLUE.packed();
        let row: Vec<_> = (0..6).map(|x| read_pixel(&s, x, 0).unwrap()).collect();
        assert_eq!(row, vec![b, b, b, b, b, 0]);
    }

    #[test]
    fn test_draw_points_and_fill_rects() {
        let mut mem = pixels(4, 4);
        let mut s = Surface::new(&mut mem, 4, 4).unwrap();
        draw_points(&mut s, &[Point::new(0, 0), Point::new(3, 3)], Color::RED);
        fill_rects(
            &mut s,
            &[Rect::new(1, 1, 1, 1), Rect::new(2, 0, 1, 2)],
            Color::GREEN,
        );
        assert_eq!(read_pixel(&s, 0, 0), Some(Color::RED.packed()));
        assert_eq!(read_pixel(&s, 3, 3), Some(Color::RED.packed()));
        assert_eq!(read_pixel(&s, 1, 1), Some(Color::GREEN.packed()));
        assert_eq!(read_pixel(&s, 2, 1), Some(Color::GREEN.packed()));
        assert_eq!(read_pixel(&s, 3, 0), Some(0));
    }

    #[test]
    fn test_blit_copies_and_clips() {
        let src_w = 3;
        let src: Vec<u8> = (0..9u32)
            .flat_map(|i| (0x8000_0000 | i).to_le_bytes())
            .collect();
        let mut mem = pixels(4, 4);
        let mut s = Surface::new(&mut mem, 4, 4).unwrap();

        let written = blit(
            &mut s,
            &src,
            src_w,
            3,
            src_w,
            Rect::new(1, 1, 2, 2),
            Point::new(3, 3),
        );
        assert_eq!(written, Some(Rect::new(3, 3, 1, 1)));
        assert_eq!(read_pixel(&s, 3, 3), Some(0x8000_0004));

        let written = blit(
            &mut s,
            &src,
            src_w,
            3,
            src_w,
            Rect::new(0, 0, 3, 3),
            Point::new(0, 0),
        );
        assert_eq!(written, Some(Rect::new(0, 0, 3, 3)));
        assert_eq!(read_pixel(&s, 2, 1), Some(0x8000_0005));
        assert_eq!(read_pixel(&s, 3, 0), Some(0));
    }

    #[test]
    fn test_blit_clips_negative_destination() {
        let src: Vec<u8> = (0..4u32)
            .flat_map(|i| (0x8000_0000 | i).to_le_bytes())
            .collect();
        let mut mem = pixels(2, 2);
        let mut s = Surface::new(&mut mem, 2, 2).unwrap();
        let written = blit(&mut s, &src, 2, 2, 2, Rect::new(0, 0, 2, 2), Point::new(-1, -1));
        assert_eq!(written, Some(Rect::new(0, 0, 1, 1)));
        assert_eq!(read_pixel(&s, 0, 0), Some(0x8000_0003));
    }

    proptest! {
        #[test]
        fn prop_fill_sets_every_pixel(w in 1u32..24, h in 1u32..24, r: u8, g: u8, b: u8) {
            let mut mem = pixels(w, h);
            let mut s = Surface::new(&mut mem, w, h).unwrap();
            let c = Color::new(r, g, b);
            fill(&mut s, c);
            for y in 0..h as i32 {
                for x in 0..w as i32 {
                    prop_assert_eq!(read_pixel(&s, x, y), Some(c.packed()));
                }
            }
        }

        #[test]
        fn prop_draw_pixel_reads_back_opaque(
            (w, h, x, y) in (1u32..24, 1u32..24)
                .prop_flat_map(|(w, h)| (Just(w), Just(h), 0..w, 0..h)),
            r: u8,
            g: u8,
            b: u8,
        ) {
            let mut mem = pixels(w, h);
            let mut s = Surface::new(&mut mem, w, h).unwrap();
            prop_assert!(draw_pixel(&mut s, x as i32, y as i32, Color::new(r, g, b)));
            let expected = 0x8000_0000 | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
            prop_assert_eq!(read_pixel(&s, x as i32, y as i32), Some(expected));
            let written = mem
                .chunks_exact(BYTES_PER_PIXEL)
                .filter(|p| p.iter().any(|&byte| byte != 0))
                .count();
            prop_assert_eq!(written, 1);
        }

        #[test]
        fn prop_rectangle_touches_exactly_its_pixels(
            x in 0i32..10, y in 0i32..10, w in 0u32..6, h in 0u32..6,
        ) {
            let (sw, sh) = (16u32, 16u32);
            let mut mem = pixels(sw, sh);
            let mut s = Surface::new(&mut mem, sw, sh).unwrap();
            draw_rectangle(&mut s, x, y, w, h, Color::RED);
            let rect = Rect::new(x, y, w, h);
            for py in 0..sh as i32 {
                for px in 0..sw as i32 {
                    let expected = if rect.contains(px, py) { Color::RED.packed() } else { 0 };
                    prop_assert_eq!(read_pixel(&s, px, py), Some(expected));
                }
            }
        }
    }
}
