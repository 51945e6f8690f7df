use glam::{EulerRot, Quat, Vec3};
use image::imageops::{self, FilterType};

use crate::{frame::Frame, model::RenderParameters};

/// Pixels with alpha below this never produce a point.
pub const ALPHA_THRESHOLD: u8 = 20;

/// Parallel position/color arrays for one sampled frame. Recomputed from
/// scratch on every parameter change; carries no identity between runs.
#[derive(Clone, Debug, Default)]
pub struct PointCloud {
    pub positions: Vec<Vec3>,
    /// Normalized RGB, each channel in 0..=1.
    pub colors: Vec<Vec3>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Grid height implied by the target width and the source aspect ratio.
pub fn target_height(frame: &Frame, target_width: u32) -> u32 {
    let ratio = frame.height() as f64 / frame.width() as f64;
    ((target_width as f64 * ratio).round() as u32).max(1)
}

/// Downsamples a frame and projects every visible pixel into world space.
///
/// The scan is row-major over the resampled grid, so output order is a pure
/// function of the pixel buffer and parameters. Local coordinates center the
/// grid horizontally and anchor it at the top edge vertically, then the XYZ
/// Euler rotation and the offset are applied.
pub fn sample(frame: &Frame, params: &RenderParameters) -> PointCloud {
    let tw = params.target_width;
    let th = target_height(frame, tw);
    let scaled = imageops::resize(&frame.pixels, tw, th, FilterType::Triangle);

    let rot = Quat::from_euler(
        EulerRot::XYZ,
        params.rotation_deg[0].to_radians(),
        params.rotation_deg[1].to_radians(),
        params.rotation_deg[2].to_radians(),
    );
    let offset = Vec3::from_array(params.offset);

    let mut cloud = PointCloud::default();
    for y in 0..th {
        for x in 0..tw {
            let px = scaled.get_pixel(x, y).0;
            if px[3] < ALPHA_THRESHOLD {
                continue;
            }

            let local = Vec3::new(
                (x as f32 - tw as f32 / 2.0) * params.spacing,
                (th as f32 - y as f32) * params.spacing,
                0.0,
            );
            cloud.positions.push(rot * local + offset);
            cloud.colors.push(Vec3::new(
                f32::from(px[0]) / 255.0,
                f32::from(px[1]) / 255.0,
                f32::from(px[2]) / 255.0,
            ));
        }
    }
    cloud
}
