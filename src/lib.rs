// orbis2d: double-buffered frame-buffer manager and software raster library

pub mod cli;
pub mod config;
pub mod graphics;
pub mod logging;

pub use cli::Cli;
pub use config::SceneConfig;
pub use graphics::{
    create_scene, create_texture, destroy_texture, Color, Renderer, Scene, SceneError,
    SceneResult, Texture,
};
pub use logging::LogLevel;
