//! Errors surfaced by the scene and its components.

use crate::graphics::videoout::VideoOutError;

/// Construction step that failed while bringing up a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    OpenVideoOut,
    CreateFlipQueue,
    AddFlipEvent,
    ReserveDirectMemory,
    MapDirectMemory,
    RegisterBuffers,
    SetFlipRate,
}

impl InitStage {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenVideoOut => "open video-out handle",
            Self::CreateFlipQueue => "create flip queue",
            Self::AddFlipEvent => "register flip event",
            Self::ReserveDirectMemory => "reserve direct memory",
            Self::MapDirectMemory => "map direct memory",
            Self::RegisterBuffers => "register frame buffers",
            Self::SetFlipRate => "set flip rate",
        }
    }
}

impl std::fmt::Display for InitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("video device unavailable: failed to {stage}")]
    DeviceUnavailable {
        stage: InitStage,
        #[source]
        source: VideoOutError,
    },

    #[error("out of video memory: requested {requested:#x} bytes, {remaining:#x} remaining")]
    OutOfVideoMemory { requested: usize, remaining: usize },

    #[error("video device lost")]
    DeviceLost(#[source] VideoOutError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid buffer index {index} (buffer count {count})")]
    InvalidBufferIndex { index: usize, count: usize },

    #[error("could not allocate a {width}x{height} texture")]
    TextureAllocation { width: u32, height: u32 },

    #[error("rectangle lies outside the target")]
    InvalidRect,

    #[error("texture scaling is not supported")]
    ScalingUnsupported,

    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl SceneError {
    /// Wrap a controller error raised while constructing a scene.
    #[must_use]
    pub fn unavailable(stage: InitStage, source: VideoOutError) -> Self {
        Self::DeviceUnavailable { stage, source }
    }

    /// Whether this error came from scene construction.
    #[must_use]
    pub fn is_construction_failure(&self) -> bool {
        matches!(self, Self::DeviceUnavailable { .. })
    }
}

pub type SceneResult<T> = Result<T, SceneError>;
