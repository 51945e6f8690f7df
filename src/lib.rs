#![forbid(unsafe_code)]

pub mod bundle;
pub mod emitter;
pub mod error;
pub mod frame;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod preview;
pub mod sampler;
pub mod source;

pub use bundle::{ScriptBundle, generate_bundle};
pub use emitter::{
    ParticleParams, emit_clear_commands, emit_commands, fmt_num, one_command, particle_params,
};
pub use error::{DustforgeError, DustforgeResult};
pub use frame::{DEFAULT_DURATION_TICKS, Frame, MS_PER_TICK};
pub use model::{AnimationDriver, ExportSettings, RenderParameters, SyntaxVersion};
pub use pipeline::{Pipeline, PipelineStats};
pub use plan::{AnimationPlan, effective_delay};
pub use preview::{PlaybackClock, PreviewCamera, render_preview};
pub use sampler::{PointCloud, sample, target_height};
pub use source::{MediaKind, decode_frames};
