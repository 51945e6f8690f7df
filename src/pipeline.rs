use crate::{
    bundle::{ScriptBundle, generate_bundle},
    error::{DustforgeError, DustforgeResult},
    frame::Frame,
    model::{ExportSettings, RenderParameters},
    sampler::{PointCloud, sample, target_height},
};

/// Summary of the loaded sequence at the current parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineStats {
    pub frame_count: usize,
    pub is_animation: bool,
    pub current_frame: usize,
    pub grid_width: u32,
    pub grid_height: u32,
    pub point_count: usize,
}

/// Explicit pipeline state: the decoded frames, the current playback index,
/// and the cached sampled geometry for that index. Every stage is pure given
/// this context plus parameters; there are no ambient singletons.
#[derive(Debug)]
pub struct Pipeline {
    frames: Vec<Frame>,
    params: RenderParameters,
    current_index: usize,
    cloud: Option<PointCloud>,
}

impl Pipeline {
    pub fn new(frames: Vec<Frame>, params: RenderParameters) -> DustforgeResult<Self> {
        if frames.is_empty() {
            return Err(DustforgeError::validation("frame sequence must be non-empty"));
        }
        params.validate()?;
        Ok(Self {
            frames,
            params,
            current_index: 0,
            cloud: None,
        })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn params(&self) -> &RenderParameters {
        &self.params
    }

    pub fn is_animation(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_frame(&self) -> &Frame {
        &self.frames[self.current_index]
    }

    /// Replaces the sampling parameters, invalidating cached geometry so the
    /// next read recomputes before anything else observes it.
    pub fn set_params(&mut self, params: RenderParameters) -> DustforgeResult<()> {
        params.validate()?;
        self.params = params;
        self.cloud = None;
        Ok(())
    }

    pub fn set_index(&mut self, index: usize) {
        let index = index % self.frames.len();
        if index != self.current_index {
            self.current_index = index;
            self.cloud = None;
        }
    }

    /// Advances to the next frame, wrapping at the end of the sequence.
    pub fn advance(&mut self) {
        self.set_index((self.current_index + 1) % self.frames.len());
    }

    /// Sampled geometry for the current frame, recomputed lazily after any
    /// parameter or index change.
    pub fn cloud(&mut self) -> &PointCloud {
        let frame = &self.frames[self.current_index];
        let params = &self.params;
        let index = self.current_index;
        self.cloud.get_or_insert_with(|| {
            tracing::debug!(frame = index, "resampling current frame");
            sample(frame, params)
        })
    }

    pub fn stats(&mut self) -> PipelineStats {
        let frame = &self.frames[self.current_index];
        let grid_width = self.params.target_width;
        let grid_height = target_height(frame, grid_width);
        let current = self.current_index;
        let frame_count = self.frames.len();
        let is_animation = self.is_animation();
        PipelineStats {
            frame_count,
            is_animation,
            current_frame: current,
            grid_width,
            grid_height,
            point_count: self.cloud().len(),
        }
    }

    /// Generates the script bundle for the whole sequence. Bulk per-frame
    /// sampling happens on fresh data inside the generator, so the preview's
    /// current index and cached cloud are untouched throughout.
    pub fn export_bundle(&self, settings: &ExportSettings) -> DustforgeResult<ScriptBundle> {
        generate_bundle(&self.frames, &self.params, settings)
    }
}
