use std::time::{Duration, Instant};

use glam::Vec3;
use image::{Rgba, RgbaImage};

use crate::{frame::MS_PER_TICK, sampler::PointCloud};

const BACKGROUND: Rgba<u8> = Rgba([10, 10, 10, 255]);
const NEAR_PLANE: f32 = 0.1;

/// Fixed perspective camera for the point-cloud preview.
#[derive(Clone, Copy, Debug)]
pub struct PreviewCamera {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov_y_deg: f32,
}

impl Default for PreviewCamera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(5.0, 5.0, 10.0),
            target: Vec3::ZERO,
            fov_y_deg: 50.0,
        }
    }
}

/// Rasterizes a sampled point cloud into an RGBA image.
///
/// Points are drawn as screen-space squares sized by `spacing * 0.9` over
/// depth, painted far-to-near so closer points win overlaps.
pub fn render_preview(
    cloud: &PointCloud,
    spacing: f32,
    camera: &PreviewCamera,
    width: u32,
    height: u32,
) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(width, height, BACKGROUND);
    if cloud.is_empty() || width == 0 || height == 0 {
        return img;
    }

    let forward = (camera.target - camera.eye).normalize_or_zero();
    let right = forward.cross(Vec3::Y).normalize_or_zero();
    let up = right.cross(forward);
    let half_h = (camera.fov_y_deg.to_radians() / 2.0).tan();
    let aspect = width as f32 / height as f32;

    // Project once, then paint back-to-front.
    let mut projected: Vec<(f32, f32, f32, f32, Rgba<u8>)> = Vec::with_capacity(cloud.len());
    for (pos, color) in cloud.positions.iter().zip(&cloud.colors) {
        let v = *pos - camera.eye;
        let depth = v.dot(forward);
        if depth <= NEAR_PLANE {
            continue;
        }
        let sx = (v.dot(right) / depth) / (half_h * aspect);
        let sy = (v.dot(up) / depth) / half_h;
        let px = (sx * 0.5 + 0.5) * width as f32;
        let py = (0.5 - sy * 0.5) * height as f32;
        let half_size = (spacing * 0.45 / (depth * half_h)) * (height as f32 / 2.0);
        let rgba = Rgba([
            (color.x * 255.0).round() as u8,
            (color.y * 255.0).round() as u8,
            (color.z * 255.0).round() as u8,
            255,
        ]);
        projected.push((depth, px, py, half_size.max(0.5), rgba));
    }
    projected.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (_, px, py, half, rgba) in projected {
        let x0 = (px - half).floor().max(0.0) as u32;
        let x1 = ((px + half).ceil() as i64).clamp(0, i64::from(width)) as u32;
        let y0 = (py - half).floor().max(0.0) as u32;
        let y1 = ((py + half).ceil() as i64).clamp(0, i64::from(height)) as u32;
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, rgba);
            }
        }
    }
    img
}

/// Wall-clock frame advancement for animation preview: fires once each time
/// the configured interval elapses, measured from the previous advance.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackClock {
    interval: Duration,
    last: Option<Instant>,
}

impl PlaybackClock {
    pub fn new(interval_ticks: u32) -> Self {
        Self {
            interval: Duration::from_millis((f64::from(interval_ticks.max(1)) * MS_PER_TICK) as u64),
            last: None,
        }
    }

    /// The first call primes the clock and never advances.
    pub fn should_advance(&mut self, now: Instant) -> bool {
        match self.last {
            None => {
                self.last = Some(now);
                false
            }
            Some(prev) if now.duration_since(prev) > self.interval => {
                self.last = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame::Frame, model::RenderParameters, sampler::sample};
    use image::RgbaImage;

    fn centered_cloud() -> PointCloud {
        let frame = Frame::new(
            RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255])),
            2,
        );
        let params = RenderParameters {
            target_width: 4,
            spacing: 1.0,
            offset: [0.0, -2.0, 0.0],
            ..Default::default()
        };
        sample(&frame, &params)
    }

    #[test]
    fn preview_paints_points_over_background() {
        let img = render_preview(
            &centered_cloud(),
            1.0,
            &PreviewCamera::default(),
            64,
            64,
        );
        let painted = img.pixels().filter(|p| p.0 != BACKGROUND.0).count();
        assert!(painted > 0);
        assert!(img.pixels().any(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn empty_cloud_renders_background_only() {
        let img = render_preview(
            &PointCloud::default(),
            1.0,
            &PreviewCamera::default(),
            8,
            8,
        );
        assert!(img.pixels().all(|p| p.0 == BACKGROUND.0));
    }

    #[test]
    fn points_behind_the_camera_are_culled() {
        let mut cloud = PointCloud::default();
        cloud.positions.push(Vec3::new(5.0, 5.0, 100.0));
        cloud.colors.push(Vec3::ONE);
        let img = render_preview(&cloud, 1.0, &PreviewCamera::default(), 16, 16);
        assert!(img.pixels().all(|p| p.0 == BACKGROUND.0));
    }

    #[test]
    fn clock_fires_after_interval_only() {
        let mut clock = PlaybackClock::new(2); // 100 ms
        let start = Instant::now();
        assert!(!clock.should_advance(start));
        assert!(!clock.should_advance(start + Duration::from_millis(50)));
        assert!(clock.should_advance(start + Duration::from_millis(150)));
        // Interval measured from the advance just taken.
        assert!(!clock.should_advance(start + Duration::from_millis(200)));
        assert!(clock.should_advance(start + Duration::from_millis(300)));
    }
}
