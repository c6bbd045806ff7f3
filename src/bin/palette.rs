use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use image_to_palette::{
    DecodeLimits, ExclusionSet, ExtractOptions, ExtractResult, KmeansProvider, PaletteEntry, RecolorParameters,
    SamplingStride, decode_image, encode_png, extract_palettes, parse_palette, recolor,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Extract dominant palettes from images, or pull images toward a palette.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the dominant colors of each input as JSON
    Extract(ExtractArgs),
    /// Recolor each input toward a palette and save it as PNG
    Apply(ApplyArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Number of palette colors per image
    #[arg(short = 'k', long, default_value_t = 8)]
    n_colors: usize,

    /// Sample every Nth pixel in both directions. Adapts to image size when omitted.
    #[arg(short, long)]
    sample_rate: Option<u32>,

    /// Comma-separated hex colors to ignore while sampling
    #[arg(short = 'x', long)]
    exclude: Option<String>,

    /// Number of seeded k-means runs; the best one wins
    #[arg(long, default_value_t = 1)]
    runs: u64,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Comma-separated list of hex colors to recolor toward
    #[arg(short = 'c', long, conflicts_with = "palette_file")]
    palette: Option<String>,

    /// JSON file holding an array of hex strings or {"hex": ...} objects
    #[arg(short = 'f', long)]
    palette_file: Option<PathBuf>,

    /// Brightness multiplier applied before matching
    #[arg(short, long, default_value_t = 1.0)]
    luminosity: f64,

    /// How many of the closest palette colors are blended
    #[arg(short, long, default_value_t = 30)]
    nearest: usize,

    /// Shepard's method exponent
    #[arg(short, long, default_value_t = 4.0)]
    power: f64,

    /// Leave pixels farther than this from every palette color untouched (0 disables)
    #[arg(short, long, default_value_t = 0.0)]
    max_distance: f64,

    /// Output directory
    #[arg(short = 'd', long)]
    out_dir: Option<PathBuf>,

    /// Output filename prefix (ignored when --out-dir supplied)
    #[arg(long, default_value = "recolored_")]
    prefix: String,
}

#[derive(Serialize)]
struct FileResult {
    file: String,
    #[serde(flatten)]
    result: ExtractResult,
}

fn main() -> Result<()> {
    env_logger::init();
    match Cli::parse().command {
        Command::Extract(args) => extract(args),
        Command::Apply(args) => apply(args),
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|x| !x.is_empty()).map(str::to_owned).collect()
}

fn extract(args: ExtractArgs) -> Result<()> {
    let mut sources = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        sources.push(fs::read(input).with_context(|| format!("reading {}", input.display()))?);
    }

    let options = ExtractOptions {
        stride: SamplingStride::from_request(args.sample_rate),
        colors: args.n_colors,
        excluded: ExclusionSet::from_hex(args.exclude.as_deref().map(split_list).unwrap_or_default()),
        limits: DecodeLimits::default(),
    };
    let provider = KmeansProvider { runs: args.runs, ..Default::default() };

    let results: Vec<FileResult> = extract_palettes(&sources, &options, &provider)
        .into_iter()
        .zip(&args.inputs)
        .map(|(result, path)| FileResult { file: path.display().to_string(), result })
        .collect();

    let json = if args.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{json}");
    Ok(())
}

fn load_palette(args: &ApplyArgs) -> Result<Vec<String>> {
    if let Some(list) = &args.palette {
        return Ok(split_list(list));
    }
    let Some(path) = &args.palette_file else {
        bail!("a palette is required: pass --palette or --palette-file");
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let entries: Vec<PaletteEntry> =
        serde_json::from_str(&text).context("palette file must hold hex strings or {\"hex\": ...} objects")?;
    Ok(entries.iter().map(|e| e.as_ref().to_owned()).collect())
}

fn output_path(input: &Path, args: &ApplyArgs) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    match &args.out_dir {
        Some(dir) => dir.join(format!("{stem}.png")),
        None => PathBuf::from(format!("{}{stem}.png", args.prefix)),
    }
}

fn apply(args: ApplyArgs) -> Result<()> {
    let params = RecolorParameters {
        luminosity: args.luminosity,
        nearest: args.nearest,
        power: args.power,
        max_distance: args.max_distance,
    };
    params.validate()?;
    let palette = parse_palette(load_palette(&args)?)?;
    log::debug!("recoloring toward {} colors with {params:?}", palette.len());

    for input in &args.inputs {
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let img = decode_image(&bytes, DecodeLimits::default()).with_context(|| format!("decoding {}", input.display()))?;
        let png = encode_png(&recolor(&img, &palette, &params)?).context("palette apply failed")?;

        let out_path = output_path(input, &args);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, png)?;
        log::info!("{} -> {}", input.display(), out_path.display());
        println!("Saved → {}", out_path.display());
    }

    Ok(())
}
