use std::{
    io::Write as _,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dustforge::{
    AnimationDriver, ExportSettings, MediaKind, Pipeline, PlaybackClock, PreviewCamera,
    RenderParameters, SyntaxVersion, decode_frames, emit_commands, one_command, render_preview,
};

#[derive(Parser, Debug)]
#[command(name = "dustforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show frame count, grid size and point count for an input image.
    Info(InfoArgs),
    /// Emit the raw command list for a static image.
    Commands(CommandsArgs),
    /// Pack a static image into a single copy-paste command.
    OneCommand(OneCommandArgs),
    /// Generate a datapack-style script bundle (animated or static).
    Export(ExportArgs),
    /// Render point-cloud preview frames as PNGs.
    Preview(PreviewArgs),
}

#[derive(Args, Debug)]
struct SampleArgs {
    /// Target grid width in points.
    #[arg(long, default_value_t = 32)]
    width: u32,

    /// Distance between neighboring points.
    #[arg(long, default_value_t = 0.2)]
    spacing: f32,

    /// Rotation around X in degrees.
    #[arg(long, default_value_t = 0.0)]
    rot_x: f32,
    /// Rotation around Y in degrees.
    #[arg(long, default_value_t = 0.0)]
    rot_y: f32,
    /// Rotation around Z in degrees.
    #[arg(long, default_value_t = 0.0)]
    rot_z: f32,

    /// Position offset along X.
    #[arg(long, default_value_t = 0.0)]
    off_x: f32,
    /// Position offset along Y.
    #[arg(long, default_value_t = 0.0)]
    off_y: f32,
    /// Position offset along Z.
    #[arg(long, default_value_t = 0.0)]
    off_z: f32,
}

impl SampleArgs {
    fn to_params(&self) -> RenderParameters {
        RenderParameters {
            target_width: self.width,
            spacing: self.spacing,
            rotation_deg: [self.rot_x, self.rot_y, self.rot_z],
            offset: [self.off_x, self.off_y, self.off_z],
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VersionChoice {
    /// Java 1.13-1.20.4 positional dust syntax.
    Legacy,
    /// Java 1.20.5+ component dust syntax.
    Modern,
    /// Bedrock setblock variant.
    Bedrock,
}

impl From<VersionChoice> for SyntaxVersion {
    fn from(v: VersionChoice) -> Self {
        match v {
            VersionChoice::Legacy => SyntaxVersion::Legacy,
            VersionChoice::Modern => SyntaxVersion::Modern,
            VersionChoice::Bedrock => SyntaxVersion::Bedrock,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DriverChoice {
    /// Self-rescheduling datapack functions.
    Scheduler,
    /// Repeating-command-block polling dispatch.
    Polling,
}

impl From<DriverChoice> for AnimationDriver {
    fn from(d: DriverChoice) -> Self {
        match d {
            DriverChoice::Scheduler => AnimationDriver::Scheduler,
            DriverChoice::Polling => AnimationDriver::Polling,
        }
    }
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Input image (static, GIF or APNG).
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    sample: SampleArgs,
}

#[derive(Args, Debug)]
struct CommandsArgs {
    /// Input image; must be static (use `export` for animations).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output text file; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = VersionChoice::Modern)]
    version: VersionChoice,

    /// Emit persistence-tuned particle parameters.
    #[arg(long)]
    enhance: bool,

    #[command(flatten)]
    sample: SampleArgs,
}

#[derive(Args, Debug)]
struct OneCommandArgs {
    /// Input image; must be static.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long, value_enum, default_value_t = VersionChoice::Modern)]
    version: VersionChoice,

    #[arg(long)]
    enhance: bool,

    #[command(flatten)]
    sample: SampleArgs,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Input image (static, GIF or APNG).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory to place the pack folder in.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = VersionChoice::Modern)]
    version: VersionChoice,

    /// Function namespace inside the pack.
    #[arg(long, default_value = "art")]
    namespace: String,

    /// Playback speed multiplier (0.25-4.0 typical).
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    #[arg(long, value_enum, default_value_t = DriverChoice::Scheduler)]
    driver: DriverChoice,

    /// Bedrock only: clear the previous frame's blocks before each frame.
    #[arg(long)]
    clear: bool,

    #[arg(long)]
    enhance: bool,

    #[command(flatten)]
    sample: SampleArgs,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Input image (static, GIF or APNG).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory for the preview PNGs.
    #[arg(long)]
    out: PathBuf,

    /// Preview image width in pixels.
    #[arg(long, default_value_t = 640)]
    image_width: u32,

    /// Preview image height in pixels.
    #[arg(long, default_value_t = 480)]
    image_height: u32,

    /// Preview frame interval in ticks.
    #[arg(long, default_value_t = 2)]
    tick_delay: u32,

    #[command(flatten)]
    sample: SampleArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Info(args) => cmd_info(args),
        Command::Commands(args) => cmd_commands(args),
        Command::OneCommand(args) => cmd_one_command(args),
        Command::Export(args) => cmd_export(args),
        Command::Preview(args) => cmd_preview(args),
    }
}

fn load_pipeline(in_path: &Path, sample: &SampleArgs) -> anyhow::Result<Pipeline> {
    let bytes =
        std::fs::read(in_path).with_context(|| format!("read input '{}'", in_path.display()))?;
    let kind = MediaKind::sniff(&bytes);
    let frames = decode_frames(&bytes, kind)?;
    Ok(Pipeline::new(frames, sample.to_params())?)
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let mut pipeline = load_pipeline(&args.in_path, &args.sample)?;
    let stats = pipeline.stats();
    println!(
        "{}",
        if stats.is_animation {
            format!("animation ({} frames)", stats.frame_count)
        } else {
            "static image".to_string()
        }
    );
    println!("grid: {}x{}", stats.grid_width, stats.grid_height);
    println!("points: {}", stats.point_count);
    for (i, frame) in pipeline.frames().iter().enumerate() {
        println!("frame {i}: {}t", frame.duration_ticks);
    }
    Ok(())
}

fn static_commands(
    in_path: &Path,
    sample: &SampleArgs,
    version: VersionChoice,
    enhance: bool,
) -> anyhow::Result<Vec<String>> {
    let mut pipeline = load_pipeline(in_path, sample)?;
    if pipeline.is_animation() {
        anyhow::bail!(
            "animated input produces too much output for a flat command list; \
             use `dustforge export` to generate a script bundle"
        );
    }
    let duration = pipeline.current_frame().duration_ticks;
    let cloud = pipeline.cloud();
    Ok(emit_commands(cloud, version.into(), duration, enhance))
}

fn cmd_commands(args: CommandsArgs) -> anyhow::Result<()> {
    let lines = static_commands(&args.in_path, &args.sample, args.version, args.enhance)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, lines.join("\n"))
                .with_context(|| format!("write '{}'", path.display()))?;
            eprintln!("wrote {} commands to {}", lines.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            for line in &lines {
                writeln!(stdout, "{line}")?;
            }
        }
    }
    Ok(())
}

fn cmd_one_command(args: OneCommandArgs) -> anyhow::Result<()> {
    let lines = static_commands(&args.in_path, &args.sample, args.version, args.enhance)?;
    let cmd = one_command(&lines)?;
    println!("{cmd}");
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let pipeline = load_pipeline(&args.in_path, &args.sample)?;
    let settings = ExportSettings {
        version: args.version.into(),
        namespace: args.namespace.clone(),
        speed_multiplier: args.speed,
        driver: args.driver.into(),
        clear_previous: args.clear,
        enhance: args.enhance,
    };
    let bundle = pipeline.export_bundle(&settings)?;
    let pack_dir = bundle.write_to(&args.out)?;
    eprintln!(
        "wrote {} files to {}",
        bundle.files.len(),
        pack_dir.display()
    );
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let mut pipeline = load_pipeline(&args.in_path, &args.sample)?;
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;

    let camera = PreviewCamera::default();
    let spacing = pipeline.params().spacing;

    let write_current = |pipeline: &mut Pipeline, seq: usize| -> anyhow::Result<PathBuf> {
        let img = render_preview(
            pipeline.cloud(),
            spacing,
            &camera,
            args.image_width,
            args.image_height,
        );
        let path = args.out.join(format!("preview_{seq:03}.png"));
        img.save(&path)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(path)
    };

    write_current(&mut pipeline, 0)?;
    if pipeline.is_animation() {
        // Simulated display loop: step a 60 Hz clock and advance frames the
        // same way the live preview would, until one full cycle is written.
        let mut clock = PlaybackClock::new(args.tick_delay);
        let mut now = Instant::now();
        let step = Duration::from_millis(16);
        let mut written = 1usize;
        let total = pipeline.frames().len();
        while written < total {
            now += step;
            if clock.should_advance(now) {
                pipeline.advance();
                write_current(&mut pipeline, written)?;
                written += 1;
            }
        }
    }
    eprintln!(
        "wrote {} preview frame(s) to {}",
        pipeline.frames().len(),
        args.out.display()
    );
    Ok(())
}
