use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pole-removal", version)]
struct Cli {
    /// Log debug-level detail.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fuse the two bottom camera images into one PNG.
    Fuse(FuseArgs),
    /// List the registered flow algorithms.
    ListFlow,
}

#[derive(Args, Debug)]
struct FuseArgs {
    /// Camera rig JSON.
    #[arg(long)]
    rig: PathBuf,

    /// Options JSON. Individual flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with `<camera id>.png` images.
    #[arg(long)]
    images_dir: Option<PathBuf>,

    /// Directory with red-painted `<camera id>.png` pole masks.
    #[arg(long)]
    pole_mask_dir: Option<PathBuf>,

    /// Output data directory of the previous frame.
    #[arg(long)]
    prev_frame_dir: Option<PathBuf>,

    /// Directory for the flow cache and debug images.
    #[arg(long)]
    output_data_dir: Option<PathBuf>,

    /// Flow algorithm name (see `list-flow`).
    #[arg(long)]
    flow_algorithm: Option<String>,

    /// Alpha feather width in pixels.
    #[arg(long)]
    alpha_feather_px: Option<u32>,

    /// Write intermediate images.
    #[arg(long, default_value_t = false)]
    save_debug_images: bool,

    /// Write this frame's flow for the next frame.
    #[arg(long, default_value_t = false)]
    save_flow_for_next_frame: bool,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Fuse(args) => cmd_fuse(args),
        Command::ListFlow => cmd_list_flow(),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_list_flow() -> anyhow::Result<()> {
    for name in pole_removal::FlowRegistry::default().names() {
        println!("{name}");
    }
    Ok(())
}

fn cmd_fuse(args: FuseArgs) -> anyhow::Result<()> {
    let rig_json = read_text(&args.rig, "camera rig")?;
    let rig = pole_removal::CameraRig::from_json_str(&rig_json)
        .with_context(|| format!("load camera rig '{}'", args.rig.display()))?;
    let opts = build_opts(&args)?;

    let output = pole_removal::combine_bottom_images(&opts, &rig)
        .with_context(|| format!("fuse bottom images of camera '{}'", rig_primary_id(&rig)))?;
    pole_removal::write_image(&args.out, &output.image)
        .with_context(|| format!("write '{}'", args.out.display()))?;

    let stats = output.stats;
    eprintln!(
        "wrote {} ({}x{}, camera {}, {} pixels filled, max flow {:.2}px{})",
        args.out.display(),
        output.image.width(),
        output.image.height(),
        output.camera.id,
        stats.pixels_filled,
        stats.max_flow_magnitude,
        if stats.warm_start { ", warm start" } else { "" }
    );
    Ok(())
}

fn build_opts(args: &FuseArgs) -> anyhow::Result<pole_removal::PoleRemovalOpts> {
    let mut opts = match &args.config {
        Some(path) => {
            let json = read_text(path, "options")?;
            pole_removal::PoleRemovalOpts::from_json_str(&json)
                .with_context(|| format!("load options '{}'", path.display()))?
        }
        None => {
            let images_dir = args
                .images_dir
                .clone()
                .context("--images-dir is required without --config")?;
            let pole_mask_dir = args
                .pole_mask_dir
                .clone()
                .context("--pole-mask-dir is required without --config")?;
            let output_data_dir = args.output_data_dir.clone().unwrap_or_default();
            pole_removal::PoleRemovalOpts::new(images_dir, pole_mask_dir, output_data_dir)
        }
    };

    if let Some(dir) = &args.images_dir {
        opts.images_dir = dir.clone();
    }
    if let Some(dir) = &args.pole_mask_dir {
        opts.pole_mask_dir = dir.clone();
    }
    if let Some(dir) = &args.prev_frame_dir {
        opts.prev_frame_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.output_data_dir {
        opts.output_data_dir = dir.clone();
    }
    if let Some(name) = &args.flow_algorithm {
        opts.flow_algorithm = name.clone();
    }
    if let Some(px) = args.alpha_feather_px {
        opts.alpha_feather_px = px;
    }
    opts.save_debug_images |= args.save_debug_images;
    opts.save_flow_for_next_frame |= args.save_flow_for_next_frame;
    Ok(opts)
}

fn read_text(path: &Path, what: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {what} '{}'", path.display()))
}

fn rig_primary_id(rig: &pole_removal::CameraRig) -> &str {
    rig.bottom_pair().map(|(p, _)| p.id.as_str()).unwrap_or("?")
}
