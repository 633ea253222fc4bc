use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use renderchain::{
    CpuDevice, ExprEvaluator, FrameTargets, RenderDevice, RenderScript, Renderer, ScriptConfig,
    TextureDesc, TextureFormat, TextureSize, TexturePool,
};

#[derive(Parser, Debug)]
#[command(name = "renderchain", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a render script over a PNG frame on the CPU device.
    Frame(FrameArgs),
    /// Compile a render script for the given sizes and print its status.
    Status(StatusArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Render script JSON.
    #[arg(long)]
    config: PathBuf,

    /// Input PNG.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Output size as WxH (defaults to the input size).
    #[arg(long, value_parser = parse_size)]
    target: Option<TextureSize>,

    /// Number of frames to execute.
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Condition flag, as name=true|false. Repeatable.
    #[arg(long = "set", value_parser = parse_flag)]
    flags: Vec<(String, bool)>,
}

#[derive(Parser, Debug)]
struct StatusArgs {
    /// Render script JSON.
    #[arg(long)]
    config: PathBuf,

    /// Source size as WxH.
    #[arg(long, value_parser = parse_size)]
    size: TextureSize,

    /// Output size as WxH.
    #[arg(long, value_parser = parse_size)]
    target: TextureSize,

    /// Condition flag, as name=true|false. Repeatable.
    #[arg(long = "set", value_parser = parse_flag)]
    flags: Vec<(String, bool)>,
}

fn parse_size(s: &str) -> Result<TextureSize, String> {
    TextureSize::parse(s).map_err(|e| e.to_string())
}

fn parse_flag(s: &str) -> Result<(String, bool), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=true|false, got '{s}'"))?;
    let value = value
        .trim()
        .parse::<bool>()
        .map_err(|_| format!("flag '{name}' must be true or false"))?;
    Ok((name.trim().to_owned(), value))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Status(args) => cmd_status(args),
    }
}

fn evaluator(flags: &[(String, bool)]) -> Rc<ExprEvaluator> {
    let evaluator = ExprEvaluator::new();
    for (name, value) in flags {
        evaluator.set_flag(name.clone(), *value);
    }
    Rc::new(evaluator)
}

fn read_png(path: &Path) -> anyhow::Result<image::Rgba32FImage> {
    let img = image::open(path).with_context(|| format!("read png '{}'", path.display()))?;
    Ok(img.to_rgba32f())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let config = ScriptConfig::from_path(&args.config)?;
    let pixels = read_png(&args.in_path)?;

    let device = Rc::new(CpuDevice::default());
    let input = device.create_from_image(pixels, TextureFormat::Rgba32F)?;
    let target = args.target.unwrap_or(input.size());
    let output = device.create_texture(TextureDesc::new(target, TextureFormat::Rgba32F))?;
    let pool = TexturePool::new(device.clone(), config.pool);
    let renderer = Renderer::new(
        device.clone(),
        pool,
        FrameTargets::rgb(input, output.clone()),
    );

    let mut script = RenderScript::from_config(&config, evaluator(&args.flags), renderer)?;
    script.update();
    let mut failed = 0u32;
    for _ in 0..args.frames {
        if !script.execute() {
            failed += 1;
        }
    }
    eprintln!("status: {}", script.status());
    if let Some(message) = script.error_message() {
        eprintln!("{message}");
    }

    let rendered = device.download(&output)?;
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::DynamicImage::ImageRgba32F(rendered)
        .to_rgba8()
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());

    if failed > 0 {
        anyhow::bail!("{failed} of {} frame(s) failed", args.frames);
    }
    Ok(())
}

fn cmd_status(args: StatusArgs) -> anyhow::Result<()> {
    let config = ScriptConfig::from_path(&args.config)?;

    let device = Rc::new(CpuDevice::default());
    let input = device.create_texture(TextureDesc::new(args.size, TextureFormat::Rgba32F))?;
    let output = device.create_texture(TextureDesc::new(args.target, TextureFormat::Rgba32F))?;
    let pool = TexturePool::new(device.clone(), config.pool);
    let renderer = Renderer::new(device, pool, FrameTargets::rgb(input, output));

    let mut script = RenderScript::from_config(&config, evaluator(&args.flags), renderer)?;
    script.update();
    println!("{}", script.status());
    if let Some(message) = script.error_message() {
        eprintln!("{message}");
        anyhow::bail!("render script '{}' failed to compile", config.name);
    }
    Ok(())
}
