//! Renderer frame loop with textures on the software display controller.

use std::sync::Arc;
use std::time::Duration;

use orbis2d::graphics::{Point, Rect, SoftVideoOut};
use orbis2d::{Color, Renderer, Scene, SceneConfig};

fn renderer(width: u32, height: u32) -> (Arc<SoftVideoOut>, Renderer) {
    let dev = Arc::new(SoftVideoOut::with_vsync(Duration::from_millis(1)).unwrap());
    let config = SceneConfig {
        width,
        height,
        memory_size: 0x10000,
        reservation_alignment: 0x1000,
        ..SceneConfig::default()
    };
    let scene = Scene::new(dev.clone(), &config).unwrap();
    (dev, Renderer::new(scene))
}

#[test]
fn frame_loop_renders_into_alternating_buffers() {
    let (dev, mut r) = renderer(8, 8);
    let colors = [Color::RED, Color::GREEN, Color::BLUE];
    for color in colors {
        r.set_draw_color(color);
        r.clear().unwrap();
        r.set_draw_color(Color::BLACK);
        r.draw_line(Point::new(0, 0), Point::new(8, 0)).unwrap();
        assert!(r.present().unwrap());
    }
    assert_eq!(dev.submitted_flips().len(), 3);

    let scene = r.scene();
    // Buffer 0 holds the third frame, buffer 1 the second.
    assert_eq!(scene.buffer_pixel(0, 3, 3).unwrap(), Some(Color::BLUE.packed()));
    assert_eq!(scene.buffer_pixel(1, 3, 3).unwrap(), Some(Color::GREEN.packed()));
    assert_eq!(scene.buffer_pixel(0, 7, 0).unwrap(), Some(Color::BLACK.packed()));
}

#[test]
fn updated_texture_is_copied_one_to_one() {
    let (_dev, mut r) = renderer(4, 4);
    r.set_draw_color(Color::BLACK);
    r.clear().unwrap();

    let mut tex = r.create_texture(2, 2).unwrap();
    let pixels: Vec<u8> = [0x8000_0001u32, 0x8000_0002, 0x8000_0003, 0x8000_0004]
        .iter()
        .flat_map(|p| p.to_le_bytes())
        .collect();
    tex.update(None, &pixels, 8).unwrap();

    r.copy(&tex, None, Some(Rect::new(1, 1, 2, 2))).unwrap();
    let k = Color::BLACK.packed();
    assert_eq!(
        r.read_pixels(Some(Rect::new(0, 1, 4, 2))).unwrap(),
        vec![k, 0x8000_0001, 0x8000_0002, k, k, 0x8000_0003, 0x8000_0004, k]
    );

    // A partial source lands at the destination origin.
    r.copy(&tex, Some(Rect::new(1, 1, 1, 1)), Some(Rect::new(0, 0, 1, 1)))
        .unwrap();
    assert_eq!(r.read_pixels(Some(Rect::new(0, 0, 1, 1))).unwrap(), vec![0x8000_0004]);
    r.destroy_texture(tex);
}

#[test]
fn fill_rect_without_rect_covers_target() {
    let (_dev, mut r) = renderer(3, 2);
    r.set_draw_color(Color::new(1, 2, 3));
    r.fill_rect(None).unwrap();
    assert!(r.scene().is_drawing());
    assert_eq!(
        r.read_pixels(None).unwrap(),
        vec![Color::new(1, 2, 3).packed(); 6]
    );
}
