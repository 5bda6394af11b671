use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{load_config, parse_color, parse_resolution, parse_size, SceneConfig};
use crate::logging::LogLevel;

/// orbis2d demo: renders animated frames on the software display controller
#[derive(Parser, Debug, Default)]
#[command(name = "orbis2d-demo")]
#[command(version)]
#[command(about = "Double-buffered frame-buffer demo", long_about = None)]
pub struct Cli {
    /// Screen resolution (e.g., 1280x720)
    #[arg(short, long, value_name = "WIDTHxHEIGHT")]
    pub res: Option<String>,

    /// Number of frame buffers
    #[arg(short, long, value_name = "COUNT")]
    pub buffers: Option<usize>,

    /// Direct memory to reserve (decimal or 0x hex)
    #[arg(short, long, value_name = "BYTES")]
    pub memsize: Option<String>,

    /// Background color (RRGGBB)
    #[arg(long, value_name = "COLOR")]
    pub background: Option<String>,

    /// Frames to render before exiting
    #[arg(short, long, default_value_t = 120)]
    pub frames: u32,

    /// Simulated vertical refresh rate in Hz
    #[arg(long, value_name = "HZ", default_value_t = 60)]
    pub refresh: u32,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (nothing, user, error, warning, info, debug, all or 0-6)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Scene settings from the config file (if any) with CLI overrides.
    pub fn scene_config(&self) -> Result<SceneConfig> {
        let base = match &self.config {
            Some(path) => load_config(path)?,
            None => SceneConfig::default(),
        };
        self.merge_into_config(base)
    }

    /// Merge CLI arguments into the config
    pub fn merge_into_config(&self, mut config: SceneConfig) -> Result<SceneConfig> {
        if let Some(ref res) = self.res {
            let res = parse_resolution(res).context("Invalid resolution format")?;
            config.width = res.width;
            config.height = res.height;
        }

        if let Some(buffers) = self.buffers {
            config.buffer_count = buffers;
        }

        if let Some(ref size) = self.memsize {
            config.memory_size = parse_size(size).context("Invalid memory size")?;
        }

        if let Some(ref color) = self.background {
            config.background = parse_color(color).context("Invalid background color")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn log_level(&self) -> Result<LogLevel> {
        match &self.log_level {
            None => Ok(LogLevel::Info),
            Some(name) => LogLevel::from_name(name).with_context(|| {
                format!(
                    "Invalid log level: {}. Valid options: nothing, user, error, warning, info, debug, all",
                    name
                )
            }),
        }
    }
}
