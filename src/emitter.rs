use crate::{
    error::{DustforgeError, DustforgeResult},
    model::SyntaxVersion,
    sampler::PointCloud,
};

/// Red channel substituted when a color rounds to pure black. The dust
/// renderer treats `0,0,0` as "no color" and drops the particle, so black
/// pixels must be nudged to stay visible. Compatibility behavior, not
/// cosmetic.
pub const BLACK_FLOOR: &str = "0.001";

/// Commands above this count cannot be packed into a single summon chain.
pub const ONE_COMMAND_LIMIT: usize = 400;

/// Particle persistence parameters for one emission command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleParams {
    pub count: u32,
    pub speed: f64,
    pub spread: f64,
    pub scale: f64,
}

const BASELINE: ParticleParams = ParticleParams {
    count: 1,
    speed: 0.0,
    spread: 0.0,
    scale: 1.0,
};

/// Enhanced tiers, highest duration threshold first. Longer-lived frames get
/// fewer, larger, tighter particles; short-lived frames get denser ones.
const ENHANCED_TIERS: [(u32, ParticleParams); 3] = [
    (
        10,
        ParticleParams {
            count: 2,
            speed: 0.0,
            spread: 0.01,
            scale: 1.5,
        },
    ),
    (
        5,
        ParticleParams {
            count: 3,
            speed: 0.0,
            spread: 0.02,
            scale: 1.2,
        },
    ),
    (
        0,
        ParticleParams {
            count: 5,
            speed: 0.0,
            spread: 0.03,
            scale: 1.0,
        },
    ),
];

/// Picks the persistence tier for a frame displayed `duration_ticks` long.
pub fn particle_params(duration_ticks: u32, enhance: bool) -> ParticleParams {
    if !enhance {
        return BASELINE;
    }
    ENHANCED_TIERS
        .iter()
        .find(|(min, _)| duration_ticks >= *min)
        .map(|(_, p)| *p)
        .unwrap_or(BASELINE)
}

/// Fixed-precision numeric rendering: three decimals, trailing zeros
/// trimmed, trailing dot trimmed. `1.200` -> `1.2`, `1.000` -> `1`,
/// `0.001` -> `0.001`. Golden-output stable; do not change.
pub fn fmt_num(v: f64) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Renders one frame's point cloud as world-mutation commands, one line per
/// point. `duration_ticks` feeds the enhanced persistence tiers.
pub fn emit_commands(
    cloud: &PointCloud,
    version: SyntaxVersion,
    duration_ticks: u32,
    enhance: bool,
) -> Vec<String> {
    let params = particle_params(duration_ticks, enhance);
    let count = params.count;
    let speed = fmt_num(params.speed);
    let spread = fmt_num(params.spread);
    let scale = fmt_num(params.scale);
    let force = if enhance { " force" } else { "" };

    let mut lines = Vec::with_capacity(cloud.len());
    for (pos, color) in cloud.positions.iter().zip(&cloud.colors) {
        let x = fmt_num(f64::from(pos.x));
        let y = fmt_num(f64::from(pos.y));
        let z = fmt_num(f64::from(pos.z));
        let r = fmt_num(f64::from(color.x));
        let g = fmt_num(f64::from(color.y));
        let b = fmt_num(f64::from(color.z));
        let r = if r == "0" && g == "0" && b == "0" {
            BLACK_FLOOR.to_string()
        } else {
            r
        };

        let line = match version {
            SyntaxVersion::Legacy => format!(
                "particle dust {r} {g} {b} {scale} ~{x} ~{y} ~{z} {spread} {spread} {spread} {speed} {count}{force}"
            ),
            SyntaxVersion::Modern => format!(
                "particle dust{{color:[{r},{g},{b}],scale:{scale}}} ~{x} ~{y} ~{z} {spread} {spread} {spread} {speed} {count}{force}"
            ),
            SyntaxVersion::Bedrock => {
                format!("setblock ~{x} ~{y} ~{z} concrete [\"color\":\"white\"]")
            }
        };
        lines.push(line);
    }
    lines
}

/// Placement-undo commands for a previously drawn frame (Bedrock clearing).
pub fn emit_clear_commands(cloud: &PointCloud) -> Vec<String> {
    cloud
        .positions
        .iter()
        .map(|pos| {
            let x = fmt_num(f64::from(pos.x));
            let y = fmt_num(f64::from(pos.y));
            let z = fmt_num(f64::from(pos.z));
            format!("setblock ~{x} ~{y} ~{z} air")
        })
        .collect()
}

/// Packs a static image's command list into a single `summon` command
/// driving a command-block-minecart chain, with self-cleanup appended.
pub fn one_command(lines: &[String]) -> DustforgeResult<String> {
    if lines.len() > ONE_COMMAND_LIMIT {
        return Err(DustforgeError::export(format!(
            "{} commands exceed the single-command limit of {ONE_COMMAND_LIMIT}; \
             reduce the target width or export a script bundle instead",
            lines.len()
        )));
    }

    let mut passengers: Vec<String> = lines
        .iter()
        .map(|cmd| {
            let escaped = cmd.replace('"', "\\\"");
            format!("{{id:\"command_block_minecart\",Command:\"{escaped}\"}}")
        })
        .collect();
    passengers.push(
        "{id:\"command_block_minecart\",Command:\"setblock ~ ~1 ~ command_block{auto:1,Command:\\\"fill ~ ~ ~ ~ ~-2 ~ air\\\"}\"}"
            .to_string(),
    );
    passengers.push(
        "{id:\"command_block_minecart\",Command:\"kill @e[type=command_block_minecart,distance=..1]\"}"
            .to_string(),
    );

    Ok(format!(
        "summon falling_block ~ ~1 ~ {{BlockState:{{Name:\"activator_rail\"}},Passengers:[{}]}}",
        passengers.join(",")
    ))
}
