use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    emitter::{emit_clear_commands, emit_commands, fmt_num},
    error::{DustforgeError, DustforgeResult},
    frame::{DEFAULT_DURATION_TICKS, Frame, MS_PER_TICK},
    model::{AnimationDriver, ExportSettings, RenderParameters, SyntaxVersion},
    plan::AnimationPlan,
    sampler::{PointCloud, sample},
};

/// A generated script bundle: relative paths (inside the pack directory)
/// mapped to file contents. Ordered so bundle listings are stable.
#[derive(Clone, Debug, Default)]
pub struct ScriptBundle {
    pub pack_name: String,
    pub files: BTreeMap<String, String>,
}

impl ScriptBundle {
    fn put(&mut self, path: impl Into<String>, lines: Vec<String>) {
        self.files.insert(path.into(), lines.join("\n"));
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Writes the bundle as a directory tree under `root`, returning the
    /// pack directory path.
    pub fn write_to(&self, root: &Path) -> DustforgeResult<PathBuf> {
        let pack_dir = root.join(&self.pack_name);
        for (rel, contents) in &self.files {
            let path = pack_dir.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create dir '{}'", parent.display()))?;
            }
            std::fs::write(&path, contents)
                .with_context(|| format!("write '{}'", path.display()))?;
        }
        Ok(pack_dir)
    }
}

fn func_path(ns: &str, name: &str) -> String {
    format!("data/{ns}/function/{name}.mcfunction")
}

fn tellraw(text: &str, color: &str) -> String {
    format!(
        "tellraw @a {}",
        serde_json::json!({ "text": text, "color": color })
    )
}

/// Generates the full script bundle for a frame sequence.
///
/// Single-frame input produces one `draw` function; multi-frame input
/// produces a playable, stoppable, restartable animation in the configured
/// driver flavor. Both drivers take their timing from one [`AnimationPlan`].
#[tracing::instrument(skip(frames, params, settings), fields(frames = frames.len()))]
pub fn generate_bundle(
    frames: &[Frame],
    params: &RenderParameters,
    settings: &ExportSettings,
) -> DustforgeResult<ScriptBundle> {
    if frames.is_empty() {
        return Err(DustforgeError::validation(
            "no frames loaded; decode an image before exporting",
        ));
    }
    params.validate()?;
    settings.validate()?;

    let mut bundle = ScriptBundle {
        pack_name: settings.pack_name(),
        files: BTreeMap::new(),
    };

    let mcmeta = serde_json::json!({
        "pack": {
            "pack_format": settings.version.pack_format(),
            "description": "3D Particle Art"
        }
    });
    bundle.put("pack.mcmeta", vec![mcmeta.to_string()]);

    if frames.len() == 1 {
        generate_static(&mut bundle, &frames[0], params, settings);
    } else {
        let plan = AnimationPlan::build(frames, settings.speed_multiplier);
        let clouds: Vec<PointCloud> = frames.iter().map(|f| sample(f, params)).collect();
        generate_frame_files(&mut bundle, &clouds, &plan, settings);
        match settings.driver {
            AnimationDriver::Scheduler => generate_scheduler(&mut bundle, &clouds, &plan, settings),
            AnimationDriver::Polling => generate_polling(&mut bundle, &plan, settings),
        }
    }

    Ok(bundle)
}

fn generate_static(
    bundle: &mut ScriptBundle,
    frame: &Frame,
    params: &RenderParameters,
    settings: &ExportSettings,
) {
    let ns = &settings.namespace;
    let cloud = sample(frame, params);
    let lines = emit_commands(
        &cloud,
        settings.version,
        DEFAULT_DURATION_TICKS,
        settings.enhance,
    );
    bundle.put(func_path(ns, "draw"), lines);
    bundle.put(
        "README.txt",
        vec![
            "Static particle art".to_string(),
            String::new(),
            format!(
                "1. Copy the '{}' folder into your world's datapacks directory.",
                settings.pack_name()
            ),
            "2. Run /reload.".to_string(),
            format!("3. Draw with /function {ns}:draw"),
        ],
    );
}

/// Per-frame display scripts shared by both drivers. The Bedrock clearing
/// variant prefixes each frame with undo commands for the previous frame's
/// blocks, except the first frame.
fn generate_frame_files(
    bundle: &mut ScriptBundle,
    clouds: &[PointCloud],
    plan: &AnimationPlan,
    settings: &ExportSettings,
) {
    let ns = &settings.namespace;
    for (i, cloud) in clouds.iter().enumerate() {
        let mut lines = Vec::new();
        if settings.version == SyntaxVersion::Bedrock && settings.clear_previous && i > 0 {
            lines.extend(emit_clear_commands(&clouds[i - 1]));
        }
        lines.extend(emit_commands(
            cloud,
            settings.version,
            plan.delays[i],
            settings.enhance,
        ));
        bundle.put(func_path(ns, &format!("frames/frame_{i}")), lines);
    }
}

fn generate_scheduler(
    bundle: &mut ScriptBundle,
    clouds: &[PointCloud],
    plan: &AnimationPlan,
    settings: &ExportSettings,
) {
    let ns = &settings.namespace;
    let n = plan.frame_count();

    // Refresh scripts re-emit a long-lived frame's particles at fractional
    // intervals so they do not fade out before the frame ends.
    for (i, cloud) in clouds.iter().enumerate() {
        if !(settings.enhance && plan.wants_refresh(i)) {
            continue;
        }
        let interval = plan.refresh_interval(i);
        bundle.put(
            func_path(ns, &format!("refresh/start_refresh_{i}")),
            vec![
                format!("schedule function {ns}:refresh/refresh_{i}_1 {interval}t"),
                format!("schedule function {ns}:refresh/refresh_{i}_2 {}t", interval * 2),
            ],
        );
        let particles = emit_commands(cloud, settings.version, plan.delays[i], settings.enhance);
        bundle.put(func_path(ns, &format!("refresh/refresh_{i}_1")), particles.clone());
        bundle.put(func_path(ns, &format!("refresh/refresh_{i}_2")), particles);
    }

    for i in 0..n {
        let next = (i + 1) % n;
        let mut lines = vec![format!("function {ns}:frames/frame_{i}")];
        if settings.enhance && plan.wants_refresh(i) {
            lines.push(format!("function {ns}:refresh/start_refresh_{i}"));
        }
        lines.push(format!("scoreboard players set #frame {ns}_anim {next}"));
        lines.push(format!("schedule function {ns}:loop {}t", plan.delays[i]));
        bundle.put(func_path(ns, &format!("handlers/handler_{i}")), lines);
    }

    let loop_lines = (0..n)
        .map(|i| {
            format!("execute if score #frame {ns}_anim matches {i} run function {ns}:handlers/handler_{i}")
        })
        .collect();
    bundle.put(func_path(ns, "loop"), loop_lines);

    bundle.put(
        func_path(ns, "play"),
        vec![
            format!("scoreboard objectives add {ns}_anim dummy"),
            format!("scoreboard players set #frame {ns}_anim 0"),
            format!("function {ns}:loop"),
        ],
    );
    bundle.put(
        func_path(ns, "play_cmd"),
        vec![
            format!("scoreboard objectives add {ns}_anim dummy"),
            format!("scoreboard players set #frame {ns}_anim 0"),
            format!("scoreboard players set #playing {ns}_anim 1"),
        ],
    );

    // Stop must cancel every outstanding schedule: the loop plus each
    // refresh schedule that generation created, triggered or not. Anything
    // left behind double-fires after a restart.
    let mut stop = vec![
        format!("schedule clear {ns}:loop"),
        format!("scoreboard players set #playing {ns}_anim 0"),
    ];
    for i in 0..n {
        if settings.enhance && plan.wants_refresh(i) {
            stop.push(format!("schedule clear {ns}:refresh/refresh_{i}_1"));
            stop.push(format!("schedule clear {ns}:refresh/refresh_{i}_2"));
        }
    }
    bundle.put(func_path(ns, "stop"), stop);

    bundle.put(
        func_path(ns, "restart"),
        vec![format!("function {ns}:stop"), format!("function {ns}:play")],
    );

    bundle.put(
        "README.txt",
        animation_readme(
            plan,
            settings,
            &[
                format!("1. Copy the '{}' folder into your world's datapacks directory.", settings.pack_name()),
                "2. Run /reload.".to_string(),
                format!("3. Play:    /function {ns}:play"),
                format!("   Stop:    /function {ns}:stop"),
                format!("   Restart: /function {ns}:restart"),
            ],
        ),
    );
}

fn generate_polling(bundle: &mut ScriptBundle, plan: &AnimationPlan, settings: &ExportSettings) {
    let ns = &settings.namespace;
    let n = plan.frame_count();
    let speed = fmt_num(settings.speed_multiplier);

    bundle.put(
        func_path(ns, "setup"),
        vec![
            format!("scoreboard objectives add {ns}_anim dummy"),
            format!("scoreboard players set #frame {ns}_anim 0"),
            format!("scoreboard players set #playing {ns}_anim 0"),
            format!("scoreboard players set #timer {ns}_anim 0"),
            tellraw("Animation system initialized", "green"),
            tellraw(
                &format!("Native frame delays in use, speed multiplier {speed}x"),
                "yellow",
            ),
        ],
    );

    bundle.put(
        func_path(ns, "tick"),
        vec![format!(
            "execute if score #playing {ns}_anim matches 1 run function {ns}:tick_play"
        )],
    );

    // Dispatch: show the current frame, count elapsed ticks, and advance
    // (wrapping) once the frame's delay is reached. Advancing goes through
    // an explicit flag so the elapsed reset and the frame increment see the
    // same pre-advance state.
    let mut tick_play = Vec::new();
    for i in 0..n {
        tick_play.push(format!(
            "execute if score #frame {ns}_anim matches {i} run function {ns}:frames/frame_{i}"
        ));
    }
    tick_play.push(format!("scoreboard players add #timer {ns}_anim 1"));
    tick_play.push(format!("scoreboard players set #advance {ns}_anim 0"));
    for (i, delay) in plan.delays.iter().enumerate() {
        tick_play.push(format!(
            "execute if score #frame {ns}_anim matches {i} if score #timer {ns}_anim matches {delay}.. run scoreboard players set #advance {ns}_anim 1"
        ));
    }
    tick_play.push(format!(
        "execute if score #advance {ns}_anim matches 1 run scoreboard players set #timer {ns}_anim 0"
    ));
    tick_play.push(format!(
        "execute if score #advance {ns}_anim matches 1 run scoreboard players add #frame {ns}_anim 1"
    ));
    tick_play.push(format!(
        "execute if score #frame {ns}_anim matches {n}.. run scoreboard players set #frame {ns}_anim 0"
    ));
    bundle.put(func_path(ns, "tick_play"), tick_play);

    bundle.put(
        func_path(ns, "play"),
        vec![
            format!("scoreboard players set #playing {ns}_anim 1"),
            format!("scoreboard players set #frame {ns}_anim 0"),
            format!("scoreboard players set #timer {ns}_anim 0"),
            tellraw("Animation playing", "green"),
        ],
    );
    bundle.put(
        func_path(ns, "stop"),
        vec![
            format!("scoreboard players set #playing {ns}_anim 0"),
            tellraw("Animation paused", "yellow"),
        ],
    );
    bundle.put(
        func_path(ns, "restart"),
        vec![
            format!("scoreboard players set #frame {ns}_anim 0"),
            format!("scoreboard players set #timer {ns}_anim 0"),
            format!("scoreboard players set #playing {ns}_anim 1"),
            tellraw("Animation restarted", "green"),
        ],
    );

    bundle.put(
        "README.txt",
        animation_readme(
            plan,
            settings,
            &[
                format!("1. Copy the '{}' folder into your world's datapacks directory.", settings.pack_name()),
                "2. Run /reload, then initialize once:".to_string(),
                format!("       /function {ns}:setup"),
                "3. Place a repeating command block, always active, with:".to_string(),
                format!("       function {ns}:tick"),
                format!("4. Play:    /function {ns}:play"),
                format!("   Stop:    /function {ns}:stop"),
                format!("   Restart: /function {ns}:restart"),
            ],
        ),
    );
}

fn animation_readme(plan: &AnimationPlan, settings: &ExportSettings, steps: &[String]) -> Vec<String> {
    let total = plan.total_ticks();
    let mut lines = vec!["Animated particle art".to_string(), String::new()];
    lines.extend(steps.iter().cloned());
    lines.push(String::new());
    lines.push(format!("Frames: {}", plan.frame_count()));
    lines.push(format!("Speed multiplier: {}x", fmt_num(settings.speed_multiplier)));
    lines.push(format!(
        "Loop length: {total} ticks ({:.1} s)",
        f64::from(total) * MS_PER_TICK / 1000.0
    ));
    lines.push(format!(
        "Per-frame delays: {}",
        plan.delays
            .iter()
            .enumerate()
            .map(|(i, d)| format!("frame{i}={d}t"))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn frame(duration: u32) -> Frame {
        Frame::new(
            RgbaImage::from_pixel(2, 2, Rgba([120, 40, 200, 255])),
            duration,
        )
    }

    fn base_settings() -> ExportSettings {
        ExportSettings {
            version: SyntaxVersion::Legacy,
            ..Default::default()
        }
    }

    fn base_params() -> RenderParameters {
        RenderParameters {
            target_width: 2,
            ..Default::default()
        }
    }

    #[test]
    fn empty_input_is_rejected_before_any_output() {
        let err = generate_bundle(&[], &base_params(), &base_settings()).unwrap_err();
        assert!(matches!(err, DustforgeError::Validation(_)));
    }

    #[test]
    fn static_bundle_has_mcmeta_and_draw() {
        let bundle = generate_bundle(&[frame(2)], &base_params(), &base_settings()).unwrap();
        assert_eq!(bundle.pack_name, "pixel_art");
        let meta = bundle.get("pack.mcmeta").unwrap();
        assert!(meta.contains("\"pack_format\":15"));
        let draw = bundle.get("data/art/function/draw.mcfunction").unwrap();
        assert_eq!(draw.lines().count(), 4);
        assert!(bundle.get("README.txt").unwrap().contains("/function art:draw"));
    }

    #[test]
    fn modern_pack_format_is_48() {
        let settings = ExportSettings {
            version: SyntaxVersion::Modern,
            ..Default::default()
        };
        let bundle = generate_bundle(&[frame(2)], &base_params(), &settings).unwrap();
        assert!(bundle.get("pack.mcmeta").unwrap().contains("\"pack_format\":48"));
    }

    #[test]
    fn scheduler_bundle_shape_matches_frame_count() {
        let frames = vec![frame(1), frame(2), frame(10)];
        let bundle = generate_bundle(&frames, &base_params(), &base_settings()).unwrap();

        for i in 0..3 {
            assert!(bundle
                .get(&format!("data/art/function/frames/frame_{i}.mcfunction"))
                .is_some());
            assert!(bundle
                .get(&format!("data/art/function/handlers/handler_{i}.mcfunction"))
                .is_some());
        }
        let loop_file = bundle.get("data/art/function/loop.mcfunction").unwrap();
        assert_eq!(loop_file.lines().count(), 3);
        assert!(loop_file.contains("matches 2 run function art:handlers/handler_2"));

        // Enhancement off: no refresh scripts at all.
        assert!(!bundle.files.keys().any(|k| k.contains("refresh")));
    }

    #[test]
    fn refresh_scripts_only_for_long_frames_when_enhanced() {
        let frames = vec![frame(1), frame(2), frame(10)];
        let settings = ExportSettings {
            enhance: true,
            ..base_settings()
        };
        let bundle = generate_bundle(&frames, &base_params(), &settings).unwrap();

        assert!(bundle.get("data/art/function/refresh/start_refresh_2.mcfunction").is_some());
        assert!(bundle.get("data/art/function/refresh/refresh_2_1.mcfunction").is_some());
        assert!(bundle.get("data/art/function/refresh/refresh_2_2.mcfunction").is_some());
        assert!(bundle.get("data/art/function/refresh/start_refresh_0.mcfunction").is_none());
        assert!(bundle.get("data/art/function/refresh/start_refresh_1.mcfunction").is_none());

        let start = bundle.get("data/art/function/refresh/start_refresh_2.mcfunction").unwrap();
        assert!(start.contains("schedule function art:refresh/refresh_2_1 3t"));
        assert!(start.contains("schedule function art:refresh/refresh_2_2 6t"));

        let handler = bundle.get("data/art/function/handlers/handler_2.mcfunction").unwrap();
        assert!(handler.contains("function art:refresh/start_refresh_2"));
        let handler0 = bundle.get("data/art/function/handlers/handler_0.mcfunction").unwrap();
        assert!(!handler0.contains("refresh"));
    }

    #[test]
    fn stop_cancels_loop_and_every_refresh_schedule() {
        let frames = vec![frame(1), frame(2), frame(10)];
        let settings = ExportSettings {
            enhance: true,
            ..base_settings()
        };
        let bundle = generate_bundle(&frames, &base_params(), &settings).unwrap();
        let stop = bundle.get("data/art/function/stop.mcfunction").unwrap();
        assert!(stop.contains("schedule clear art:loop"));
        assert!(stop.contains("schedule clear art:refresh/refresh_2_1"));
        assert!(stop.contains("schedule clear art:refresh/refresh_2_2"));
        assert!(!stop.contains("refresh_0"));
        assert!(!stop.contains("refresh_1_"));
    }

    #[test]
    fn handler_reschedules_loop_with_effective_delay() {
        let frames = vec![frame(2), frame(2)];
        let settings = ExportSettings {
            speed_multiplier: 0.25,
            ..base_settings()
        };
        let bundle = generate_bundle(&frames, &base_params(), &settings).unwrap();
        let handler = bundle.get("data/art/function/handlers/handler_0.mcfunction").unwrap();
        assert!(handler.contains("schedule function art:loop 8t"));
        assert!(handler.contains("scoreboard players set #frame art_anim 1"));
        let last = bundle.get("data/art/function/handlers/handler_1.mcfunction").unwrap();
        assert!(last.contains("scoreboard players set #frame art_anim 0"));
    }

    #[test]
    fn polling_bundle_dispatches_and_wraps() {
        let frames = vec![frame(1), frame(2), frame(10)];
        let settings = ExportSettings {
            driver: AnimationDriver::Polling,
            ..base_settings()
        };
        let bundle = generate_bundle(&frames, &base_params(), &settings).unwrap();

        let tick = bundle.get("data/art/function/tick.mcfunction").unwrap();
        assert!(tick.contains("if score #playing art_anim matches 1 run function art:tick_play"));

        let tick_play = bundle.get("data/art/function/tick_play.mcfunction").unwrap();
        assert!(tick_play.contains("matches 0 run function art:frames/frame_0"));
        assert!(tick_play.contains("scoreboard players add #timer art_anim 1"));
        assert!(tick_play.contains(
            "execute if score #frame art_anim matches 2 if score #timer art_anim matches 10.."
        ));
        assert!(tick_play.contains(
            "execute if score #frame art_anim matches 3.. run scoreboard players set #frame art_anim 0"
        ));

        // The elapsed reset reads the advance flag before the frame counter
        // moves, never the other way round.
        let reset_at = tick_play
            .find("run scoreboard players set #timer art_anim 0")
            .unwrap();
        let advance_at = tick_play
            .find("run scoreboard players add #frame art_anim 1")
            .unwrap();
        assert!(reset_at < advance_at);

        assert!(bundle.get("data/art/function/setup.mcfunction").unwrap().contains("tellraw @a"));
        assert!(bundle.get("README.txt").unwrap().contains("repeating command block"));
    }

    #[test]
    fn bedrock_clearing_prefixes_all_but_first_frame() {
        let frames = vec![frame(2), frame(2)];
        let settings = ExportSettings {
            version: SyntaxVersion::Bedrock,
            clear_previous: true,
            ..Default::default()
        };
        let bundle = generate_bundle(&frames, &base_params(), &settings).unwrap();
        let f0 = bundle.get("data/art/function/frames/frame_0.mcfunction").unwrap();
        assert!(!f0.contains(" air"));
        let f1 = bundle.get("data/art/function/frames/frame_1.mcfunction").unwrap();
        let first_line = f1.lines().next().unwrap();
        assert!(first_line.starts_with("setblock"));
        assert!(first_line.ends_with("air"));
        assert!(f1.contains("concrete"));
    }

    #[test]
    fn write_to_creates_directory_tree() {
        let dir = std::env::temp_dir().join(format!("dustforge_bundle_{}", std::process::id()));
        let bundle = generate_bundle(&[frame(2)], &base_params(), &base_settings()).unwrap();
        let pack_dir = bundle.write_to(&dir).unwrap();
        assert!(pack_dir.join("pack.mcmeta").is_file());
        assert!(pack_dir.join("data/art/function/draw.mcfunction").is_file());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
