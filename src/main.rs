use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use orbis2d::graphics::{Point, Rect, SoftVideoOut};
use orbis2d::logging::init_logging;
use orbis2d::{Cli, Color, Renderer, Scene};

const BOX_SIZE: u32 = 64;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level()?);

    let config = cli.scene_config()?;
    log::info!(
        "Configuration: {}x{}, {} buffers, {:#x} bytes of video memory",
        config.width,
        config.height,
        config.buffer_count,
        config.memory_size
    );

    let refresh = cli.refresh.max(1);
    let device = Arc::new(
        SoftVideoOut::with_vsync(Duration::from_secs(1) / refresh)
            .context("Failed to start the vsync clock")?,
    );
    let scene = Scene::new(device.clone(), &config).context("Failed to create scene")?;
    let mut renderer = Renderer::new(scene);
    log::info!("Renderer: {:?}", renderer.info());

    let start = Instant::now();
    for frame in 0..cli.frames {
        draw_frame(&mut renderer, frame, config.background)?;
        renderer.present().context("Present failed")?;
    }
    let elapsed = start.elapsed();

    let scene = renderer.scene();
    let status = scene.flip_status();
    log::info!(
        "Presented {} frames in {:.2?} ({:.1} fps), last flip {}, {} flips retired",
        scene.frames_presented(),
        elapsed,
        f64::from(cli.frames) / elapsed.as_secs_f64().max(f64::EPSILON),
        scene.last_flip_id(),
        status.count
    );
    log::debug!("Device saw {} vblanks", device.vblank_count());
    Ok(())
}

/// A box bouncing along the diagonal with a line trailing it.
fn draw_frame(renderer: &mut Renderer, frame: u32, background: Color) -> Result<()> {
    let mode = renderer.display_mode();
    let span_x = mode.width.saturating_sub(BOX_SIZE).max(1);
    let span_y = mode.height.saturating_sub(BOX_SIZE).max(1);
    let x = bounce(frame * 4, span_x);
    let y = bounce(frame * 3, span_y);

    renderer.set_draw_color(background);
    renderer.clear()?;

    let shade = (frame % 256) as u8;
    renderer.set_draw_color(Color::new(shade, 0x40, 0xFF - shade));
    renderer.fill_rect(Some(Rect::new(x as i32, y as i32, BOX_SIZE, BOX_SIZE)))?;

    renderer.set_draw_color(Color::BLACK);
    renderer.draw_lines(&[
        Point::new(0, 0),
        Point::new(x as i32, y as i32),
        Point::new(mode.width as i32, y as i32),
    ])?;
    Ok(())
}

fn bounce(step: u32, span: u32) -> u32 {
    let period = span * 2;
    let pos = step % period;
    if pos < span {
        pos
    } else {
        period - pos
    }
}
