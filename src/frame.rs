use image::RgbaImage;

/// One game tick is 50 ms; all frame timing is expressed in ticks.
pub const MS_PER_TICK: f64 = 50.0;

/// Duration assigned to static images and to frames whose encoded delay is
/// missing or below [`MS_PER_TICK`].
pub const DEFAULT_DURATION_TICKS: u32 = 2;

pub const MIN_DURATION_TICKS: u32 = 1;

/// A single decoded frame: full-composite RGBA pixels plus how long the
/// frame is displayed, in ticks.
#[derive(Clone, Debug)]
pub struct Frame {
    pub pixels: RgbaImage,
    pub duration_ticks: u32,
}

impl Frame {
    pub fn new(pixels: RgbaImage, duration_ticks: u32) -> Self {
        Self {
            pixels,
            duration_ticks: duration_ticks.max(MIN_DURATION_TICKS),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Converts an encoded frame delay in milliseconds to ticks.
///
/// Delays that are absent or shorter than one tick are treated as the
/// encoder leaving timing unspecified and get the default duration, matching
/// how browsers handle zero-delay animations.
pub fn delay_ms_to_ticks(delay_ms: f64) -> u32 {
    if !delay_ms.is_finite() || delay_ms < MS_PER_TICK {
        return DEFAULT_DURATION_TICKS;
    }
    ((delay_ms / MS_PER_TICK).round() as u32).max(MIN_DURATION_TICKS)
}
