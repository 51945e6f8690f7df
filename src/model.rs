use crate::error::{DustforgeError, DustforgeResult};

/// Target command syntax. Selected once at configuration time; every emitter
/// dispatches on this tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SyntaxVersion {
    /// `particle dust r g b scale ...` positional syntax (Java 1.13-1.20.4).
    Legacy,
    /// `particle dust{color:[...],scale:..}` component syntax (Java 1.20.5+).
    Modern,
    /// Block placement via `setblock` (Bedrock).
    Bedrock,
}

impl SyntaxVersion {
    /// Datapack `pack_format` value for this syntax generation.
    pub fn pack_format(self) -> u32 {
        match self {
            SyntaxVersion::Modern => 48,
            SyntaxVersion::Legacy | SyntaxVersion::Bedrock => 15,
        }
    }
}

/// How the generated animation advances frames in-game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AnimationDriver {
    /// Each frame handler reschedules the loop after its own delay.
    Scheduler,
    /// An external repeating command block calls a dispatch script every tick.
    Polling,
}

/// Sampling and projection parameters, read fresh on every recompute.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderParameters {
    pub target_width: u32,
    pub spacing: f32,
    /// Euler angles in degrees, applied in XYZ order.
    pub rotation_deg: [f32; 3],
    pub offset: [f32; 3],
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self {
            target_width: 32,
            spacing: 0.2,
            rotation_deg: [0.0, 0.0, 0.0],
            offset: [0.0, 0.0, 0.0],
        }
    }
}

impl RenderParameters {
    pub fn validate(&self) -> DustforgeResult<()> {
        if self.target_width == 0 {
            return Err(DustforgeError::validation("target width must be > 0"));
        }
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(DustforgeError::validation("spacing must be > 0"));
        }
        Ok(())
    }
}

/// Global settings for command and bundle generation.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ExportSettings {
    pub version: SyntaxVersion,
    /// Function namespace inside the pack, lowercase `[a-z0-9_]`.
    pub namespace: String,
    /// Playback speed; frame delays are divided by this (0.25..=4.0 typical).
    pub speed_multiplier: f64,
    pub driver: AnimationDriver,
    /// Bedrock only: prefix each frame with removal of the previous frame's blocks.
    pub clear_previous: bool,
    /// Emit persistence-tuned particle parameters and refresh schedules.
    pub enhance: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            version: SyntaxVersion::Modern,
            namespace: "art".to_string(),
            speed_multiplier: 1.0,
            driver: AnimationDriver::Scheduler,
            clear_previous: false,
            enhance: false,
        }
    }
}

impl ExportSettings {
    pub fn validate(&self) -> DustforgeResult<()> {
        if self.namespace.is_empty()
            || !self
                .namespace
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(DustforgeError::validation(
                "namespace must be non-empty lowercase [a-z0-9_]",
            ));
        }
        if !(self.speed_multiplier.is_finite() && self.speed_multiplier > 0.0) {
            return Err(DustforgeError::validation("speed multiplier must be > 0"));
        }
        Ok(())
    }

    /// Pack directory name derived from the namespace.
    pub fn pack_name(&self) -> String {
        format!("pixel_{}", self.namespace)
    }
}
