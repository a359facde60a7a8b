use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use sha2::Digest as _;
use sortlast::{CompositeContext, CompositeSettings, LoopbackGroup, Position, ProcessId};

#[derive(Parser, Debug)]
#[command(name = "sortlast", version)]
struct Cli {
    /// Log verbosity for library diagnostics.
    #[arg(long, value_enum, default_value_t = Verbosity::Warn, global = true)]
    verbose: Verbosity,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite one frame across a simulated in-process group.
    Simulate(SimulateArgs),
    /// Print the visibility order for a camera and a list of centroids.
    Order(OrderArgs),
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Scenario JSON (tile size, mode, camera, one centroid per rank).
    #[arg(long)]
    scenario: PathBuf,

    /// Optional compositing settings JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the root's composited image as PNG.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct OrderArgs {
    /// Camera position as `x,y,z`.
    #[arg(long, value_parser = parse_position, allow_hyphen_values = true)]
    camera: Position,

    /// Centroid as `x,y,z`; repeat once per rank, in rank order.
    #[arg(long = "centroid", value_parser = parse_position, allow_hyphen_values = true)]
    centroids: Vec<Position>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
enum ScenarioMode {
    Flat,
    Layered,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Scenario {
    width: u32,
    height: u32,
    mode: ScenarioMode,
    camera: [f32; 3],
    centroids: Vec<[f32; 3]>,
    #[serde(default = "default_layers")]
    layers: u32,
}

fn default_layers() -> u32 {
    1
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
        Command::Order(args) => cmd_order(args),
    }
}

fn init_tracing(v: Verbosity) {
    let level = match v {
        Verbosity::Error => tracing::Level::ERROR,
        Verbosity::Warn => tracing::Level::WARN,
        Verbosity::Info => tracing::Level::INFO,
        Verbosity::Debug => tracing::Level::DEBUG,
        Verbosity::Trace => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn parse_position(s: &str) -> Result<Position, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid coordinate in '{s}': {e}"))?;
    Position::from_slice(&parts).map_err(|e| e.to_string())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let f = File::open(path).with_context(|| format!("open {what} '{}'", path.display()))?;
    let r = BufReader::new(f);
    serde_json::from_reader(r).with_context(|| format!("parse {what} JSON"))
}

fn cmd_order(args: OrderArgs) -> anyhow::Result<()> {
    let mut registry = sortlast::CentroidRegistry::new();
    registry.set_centroids(args.centroids.iter().copied());
    let n = u32::try_from(args.centroids.len()).context("too many centroids")?;

    let order = sortlast::compute_order(args.camera, &registry, n)?;
    for id in &order {
        let d = args
            .camera
            .distance_to(registry.get(*id).context("centroid vanished (bug)")?);
        println!("{id}\t{d:.3}");
    }
    Ok(())
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let scenario: Scenario = read_json(&args.scenario, "scenario")?;
    let settings = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read settings '{}'", path.display()))?;
            CompositeSettings::from_json_str(&text)?
        }
        None => CompositeSettings::default(),
    };

    let ranks = u32::try_from(scenario.centroids.len()).context("too many centroids")?;
    if ranks == 0 {
        anyhow::bail!("scenario needs at least one centroid");
    }
    let members = LoopbackGroup::new(ranks)?;

    let outputs = std::thread::scope(|s| {
        let handles: Vec<_> = members
            .into_iter()
            .map(|member| {
                let scenario = &scenario;
                let settings = settings.clone();
                std::thread::Builder::new()
                    .name(format!("rank-{}", member.rank()))
                    .spawn_scoped(s, move || run_rank(member, settings, scenario))
            })
            .collect::<Result<_, _>>()?;
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .map_err(|_| anyhow::anyhow!("rank thread panicked"))?
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    let root = outputs
        .into_iter()
        .flatten()
        .next()
        .context("no rank produced a root result")?;

    println!("order: {}", format_order(&root.order));
    println!("bytes: {}", root.pixels.len());
    println!("sha256: {}", sha256_hex(&root.pixels));

    if let Some(out) = &args.out {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        image::save_buffer_with_format(
            out,
            &root.pixels,
            scenario.width,
            scenario.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", out.display()))?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

struct RootOutput {
    order: Vec<ProcessId>,
    pixels: Vec<u8>,
}

fn run_rank(
    member: sortlast::LoopbackMember,
    settings: CompositeSettings,
    scenario: &Scenario,
) -> anyhow::Result<Option<RootOutput>> {
    let rank = member.rank();
    let mut ctx = CompositeContext::with_loopback(member, settings);
    ctx.setup(scenario.width, scenario.height)
        .with_context(|| format!("setup on rank {rank}"))?;
    ctx.set_centroids(scenario.centroids.iter().copied().map(Position::from));

    let camera = Position::from_slice(&scenario.camera)?;
    let (w, h) = (scenario.width, scenario.height);

    let order = match scenario.mode {
        ScenarioMode::Flat => ctx.visibility_order(camera)?,
        ScenarioMode::Layered => Vec::new(),
    };

    let view = match scenario.mode {
        ScenarioMode::Flat => {
            let color = synth_color(rank, w, h, 1)?;
            ctx.composite_flat(&color, camera, w, h)
        }
        ScenarioMode::Layered => {
            let layers = scenario.layers;
            let color = synth_color(rank, w, h, layers)?;
            let anchor = Position::from(scenario.centroids[rank.index()]);
            let depth = synth_depth(rank, w, h, layers, camera.distance_to(anchor))?;
            ctx.composite_layered(&color, &depth, w, h, layers)
        }
    }
    .with_context(|| format!("composite on rank {rank}"))?;

    if view.is_empty() {
        return Ok(None);
    }
    Ok(Some(RootOutput {
        order,
        pixels: view.to_vec(),
    }))
}

const PALETTE: [[u8; 3]; 6] = [
    [230, 57, 70],
    [42, 157, 143],
    [69, 123, 157],
    [244, 162, 97],
    [131, 56, 236],
    [255, 209, 102],
];

/// Whether column `x` of `layer` lies in the band of `rank`. Bands start an eighth of the width
/// apart per rank and drift two columns per layer.
fn in_band(rank: ProcessId, w: u32, layer: u32, x: u32) -> bool {
    let (w, x) = (u64::from(w), u64::from(x));
    let band = (w / 2).max(1);
    let start = u64::from(rank.0) * w / 8 % w;
    let shifted = (x + w - u64::from(layer) * 2 % w) % w;
    shifted >= start && shifted < start + band
}

fn frame_elems(w: u32, h: u32, per_pixel: usize, layers: u32) -> anyhow::Result<usize> {
    [h as usize, per_pixel, layers as usize]
        .into_iter()
        .try_fold(w as usize, usize::checked_mul)
        .with_context(|| format!("{w}x{h} frame with {layers} layers is too large"))
}

/// A translucent band per rank, shifted right by rank so neighbours overlap.
fn synth_color(rank: ProcessId, w: u32, h: u32, layers: u32) -> anyhow::Result<Vec<u8>> {
    let [r, g, b] = PALETTE[rank.index() % PALETTE.len()];
    let alpha = 160u16;
    let px = [
        sortlast::premul_from_f32([
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(alpha) / 255.0,
        ]),
        [0, 0, 0, 0],
    ];

    let mut out = Vec::with_capacity(frame_elems(w, h, 4, layers)?);
    for layer in 0..layers {
        for _y in 0..h {
            for x in 0..w {
                out.extend_from_slice(&px[usize::from(!in_band(rank, w, layer, x))]);
            }
        }
    }
    Ok(out)
}

/// Depth proportional to the rank's distance from the camera; far plane outside its band.
fn synth_depth(
    rank: ProcessId,
    w: u32,
    h: u32,
    layers: u32,
    distance: f64,
) -> anyhow::Result<Vec<f32>> {
    let near = (distance / (1.0 + distance)) as f32;
    let mut out = Vec::with_capacity(frame_elems(w, h, 1, layers)?);
    for layer in 0..layers {
        for _y in 0..h {
            for x in 0..w {
                out.push(if in_band(rank, w, layer, x) {
                    (near + layer as f32 * 1e-3).min(0.999)
                } else {
                    1.0
                });
            }
        }
    }
    Ok(out)
}

fn format_order(order: &[ProcessId]) -> String {
    if order.is_empty() {
        return "(engine depth test)".to_string();
    }
    order
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
