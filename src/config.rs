use std::path::Path;

use anyhow::{Context, Result};

use crate::graphics::color::{Color, BYTES_PER_PIXEL};

/// Default display mode.
pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_REFRESH_RATE: u32 = 60;

/// Direct memory reserved for frame buffers by default.
pub const DEFAULT_MEMORY_SIZE: usize = 0xC00_0000;
/// Alignment of the direct-memory reservation.
pub const DEFAULT_RESERVATION_ALIGNMENT: usize = 0x20_0000;
/// Rounding applied to each frame buffer carved from the reservation.
pub const DEFAULT_ALLOCATION_GRANULARITY: usize = 0x100;
pub const DEFAULT_BUFFER_COUNT: usize = 2;

/// Settings used to build a scene, from defaults, a config file or the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneConfig {
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel. Only 4 is supported.
    pub depth: u32,
    pub memory_size: usize,
    pub buffer_count: usize,
    pub reservation_alignment: usize,
    pub allocation_granularity: usize,
    /// 0 presents every vblank, 1 every second, 2 every third.
    pub flip_rate: u32,
    pub background: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            depth: BYTES_PER_PIXEL as u32,
            memory_size: DEFAULT_MEMORY_SIZE,
            buffer_count: DEFAULT_BUFFER_COUNT,
            reservation_alignment: DEFAULT_RESERVATION_ALIGNMENT,
            allocation_granularity: DEFAULT_ALLOCATION_GRANULARITY,
            flip_rate: 0,
            background: Color::WHITE,
        }
    }
}

impl SceneConfig {
    /// Bytes one frame buffer occupies before granularity rounding.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Check the settings against each other.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            anyhow::bail!("Resolution values must be positive");
        }
        if self.depth as usize != BYTES_PER_PIXEL {
            anyhow::bail!("Unsupported color depth {} (only 4 is supported)", self.depth);
        }
        if self.buffer_count == 0 {
            anyhow::bail!("At least one frame buffer is required");
        }
        if !self.reservation_alignment.is_power_of_two() {
            anyhow::bail!(
                "Reservation alignment {:#x} is not a power of two",
                self.reservation_alignment
            );
        }
        if !self.allocation_granularity.is_power_of_two() {
            anyhow::bail!(
                "Allocation granularity {:#x} is not a power of two",
                self.allocation_granularity
            );
        }
        if self.flip_rate > 2 {
            anyhow::bail!("Flip rate {} out of range (0 to 2)", self.flip_rate);
        }

        let granularity = self.allocation_granularity;
        let per_buffer = self
            .frame_size()
            .checked_add(granularity - 1)
            .map(|s| s & !(granularity - 1))
            .context("Frame buffer size overflows")?;
        let needed = per_buffer
            .checked_mul(self.buffer_count)
            .context("Frame buffer set size overflows")?;
        if needed > self.memory_size {
            anyhow::bail!(
                "{} buffers of {}x{} need {:#x} bytes but only {:#x} are configured",
                self.buffer_count,
                self.width,
                self.height,
                needed,
                self.memory_size
            );
        }
        Ok(())
    }

    /// Apply one `key = value` setting.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "resolution" => {
                let res = parse_resolution(value)?;
                self.width = res.width;
                self.height = res.height;
            }
            "depth" => self.depth = value.parse().context("Invalid depth value")?,
            "memory_size" => self.memory_size = parse_size(value)?,
            "buffers" | "buffer_count" => {
                self.buffer_count = value.parse().context("Invalid buffer count")?
            }
            "alignment" => self.reservation_alignment = parse_size(value)?,
            "granularity" => self.allocation_granularity = parse_size(value)?,
            "flip_rate" => self.flip_rate = value.parse().context("Invalid flip rate")?,
            "background" => self.background = parse_color(value)?,
            _ => log::warn!("Ignoring unknown config key '{}'", key),
        }
        Ok(())
    }
}

/// Parse `key = value` lines on top of the defaults. `#` starts a comment.
pub fn load_config_str(text: &str) -> Result<SceneConfig> {
    let mut config = SceneConfig::default();
    for (number, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .with_context(|| format!("Line {}: expected key = value", number + 1))?;
        config
            .apply(key.trim(), value.trim())
            .with_context(|| format!("Line {}", number + 1))?;
    }
    Ok(config)
}

/// Load a config file.
pub fn load_config(path: &Path) -> Result<SceneConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    load_config_str(&text)
}

/// Parse a resolution string in the format "WIDTHxHEIGHT"
pub fn parse_resolution(s: &str) -> Result<Resolution> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        anyhow::bail!("Resolution must be in WIDTHxHEIGHT format");
    }

    let width: u32 = parts[0].trim().parse().context("Invalid width value")?;
    let height: u32 = parts[1].trim().parse().context("Invalid height value")?;

    if width == 0 || height == 0 {
        anyhow::bail!("Resolution values must be positive");
    }

    Ok(Resolution { width, height })
}

/// Parse a byte size, decimal or `0x` hexadecimal.
pub fn parse_size(s: &str) -> Result<usize> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).context("Invalid hexadecimal size"),
        None => s.parse().context("Invalid size value"),
    }
}

/// Parse an `RRGGBB` color, with or without a leading `#`.
pub fn parse_color(s: &str) -> Result<Color> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 {
        anyhow::bail!("Color must be in RRGGBB format");
    }
    let value = u32::from_str_radix(hex, 16).context("Invalid color value")?;
    Ok(Color::new((value >> 16) as u8, (value >> 8) as u8, value as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_resolution_valid() {
        let res = parse_resolution("640x480").unwrap();
        assert_eq!(res.width, 640);
        assert_eq!(res.height, 480);
    }

    #[test]
    fn test_parse_resolution_invalid_format() {
        assert!(parse_resolution("640-480").is_err());
        assert!(parse_resolution("640x480x120").is_err());
    }

    #[test]
    fn test_parse_resolution_invalid_values() {
        assert!(parse_resolution("0x480").is_err());
        assert!(parse_resolution("640x0").is_err());
        assert!(parse_resolution("abcxdef").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0xC000000").unwrap(), 0xC00_0000);
        assert_eq!(parse_size("0X10").unwrap(), 16);
        assert!(parse_size("0xZZ").is_err());
        assert!(parse_size("-1").is_err());
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("FF0000").unwrap(), Color::RED);
        assert_eq!(parse_color("#00ff00").unwrap(), Color::GREEN);
        assert!(parse_color("FFF").is_err());
        assert!(parse_color("GG0000").is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = SceneConfig::default();
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.background, Color::WHITE);
        assert_eq!(config.memory_size, 0xC00_0000);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let bad = [
            SceneConfig { depth: 3, ..SceneConfig::default() },
            SceneConfig { buffer_count: 0, ..SceneConfig::default() },
            SceneConfig { reservation_alignment: 0x30_0000, ..SceneConfig::default() },
            SceneConfig { allocation_granularity: 0, ..SceneConfig::default() },
            SceneConfig { flip_rate: 3, ..SceneConfig::default() },
            SceneConfig { memory_size: 0x100_0000, buffer_count: 8, ..SceneConfig::default() },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }

    #[test]
    fn test_load_config_str() {
        let text = "\
# display
resolution = 320x200
buffers = 3   # triple buffering
memory_size = 0x100000
background = 000000
mystery = 1
";
        let config = load_config_str(text).unwrap();
        assert_eq!((config.width, config.height), (320, 200));
        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.memory_size, 0x10_0000);
        assert_eq!(config.background, Color::BLACK);
        assert_eq!(config.depth, 4);
    }

    #[test]
    fn test_load_config_str_reports_line() {
        let err = load_config_str("resolution = 1x1\nbuffers = many\n").unwrap_err();
        assert!(format!("{:#}", err).contains("Line 2"));
        assert!(load_config_str("no separator here").is_err());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resolution = 64x48").unwrap();
        writeln!(file, "flip_rate = 1").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!((config.width, config.height), (64, 48));
        assert_eq!(config.flip_rate, 1);

        assert!(load_config(Path::new("/nonexistent/orbis2d.cfg")).is_err());
    }
}
