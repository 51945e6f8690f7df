use crate::frame::Frame;

/// Refresh schedules are only worth generating when a frame outlives the
/// particle fade window, roughly two ticks.
pub const REFRESH_MIN_DELAY: u32 = 2;

/// Per-frame effective delays after the speed multiplier, in ticks. Both
/// animation drivers read their timing from here so the two script flavors
/// can never disagree about pacing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationPlan {
    pub delays: Vec<u32>,
}

/// Delay of one frame after speed adjustment, floored to a single tick.
pub fn effective_delay(original_ticks: u32, speed_multiplier: f64) -> u32 {
    let adjusted = (f64::from(original_ticks) / speed_multiplier).round();
    if adjusted < 1.0 { 1 } else { adjusted as u32 }
}

impl AnimationPlan {
    pub fn build(frames: &[Frame], speed_multiplier: f64) -> Self {
        Self {
            delays: frames
                .iter()
                .map(|f| effective_delay(f.duration_ticks, speed_multiplier))
                .collect(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.delays.len()
    }

    pub fn total_ticks(&self) -> u32 {
        self.delays.iter().sum()
    }

    /// Whether frame `i` gets auxiliary refresh schedules when enhancement
    /// is on: only frames that linger past the fade window qualify.
    pub fn wants_refresh(&self, i: usize) -> bool {
        self.delays[i] > REFRESH_MIN_DELAY
    }

    /// Interval between refresh re-emissions inside frame `i`'s window.
    pub fn refresh_interval(&self, i: usize) -> u32 {
        (self.delays[i] / 3).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn frames_with_durations(durations: &[u32]) -> Vec<Frame> {
        durations
            .iter()
            .map(|&d| Frame::new(RgbaImage::new(1, 1), d))
            .collect()
    }

    #[test]
    fn effective_delay_floors_at_one_tick() {
        assert_eq!(effective_delay(2, 4.0), 1);
        assert_eq!(effective_delay(2, 0.25), 8);
        assert_eq!(effective_delay(1, 1.0), 1);
        assert_eq!(effective_delay(3, 2.0), 2);
        assert_eq!(effective_delay(10, 100.0), 1);
    }

    #[test]
    fn plan_tracks_frame_delays() {
        let frames = frames_with_durations(&[1, 2, 10]);
        let plan = AnimationPlan::build(&frames, 1.0);
        assert_eq!(plan.delays, vec![1, 2, 10]);
        assert_eq!(plan.total_ticks(), 13);
        assert!(!plan.wants_refresh(0));
        assert!(!plan.wants_refresh(1));
        assert!(plan.wants_refresh(2));
        assert_eq!(plan.refresh_interval(2), 3);
    }

    #[test]
    fn speed_multiplier_rescales_whole_plan() {
        let frames = frames_with_durations(&[2, 4, 8]);
        let plan = AnimationPlan::build(&frames, 2.0);
        assert_eq!(plan.delays, vec![1, 2, 4]);
        let slow = AnimationPlan::build(&frames, 0.5);
        assert_eq!(slow.delays, vec![4, 8, 16]);
    }

    #[test]
    fn refresh_interval_never_hits_zero() {
        let frames = frames_with_durations(&[3]);
        let plan = AnimationPlan::build(&frames, 1.0);
        assert_eq!(plan.refresh_interval(0), 1);
    }
}
