use clap::{Parser, Subcommand};
use picture_press::batch::{self, BatchMode, BatchOptions};
use picture_press::compress::CompressionPolicy;
use picture_press::imaging::{CodecBackend, OptimizationOptions, OutputFormat};
use picture_press::optimize::{SourceImage, choose_smaller, optimize_image};
use picture_press::variants::create_responsive_versions;
use picture_press::{config, naming, output};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "picture-press")]
#[command(about = "Adaptive image compression and responsive variants")]
#[command(long_about = "\
Adaptive image compression and responsive variants

Re-encodes images so they fit a size budget, lowering quality step by step
until the output is small enough, and produces the fixed set of responsive
files served from a <picture> element:

  hero-mobile.jpg    480px wide, JPEG
  hero-tablet.jpg    768px wide, JPEG
  hero-desktop.jpg   1200px wide, JPEG
  hero.webp          1200px wide, WebP

Images are never upscaled. Aspect ratio is always preserved.

Run 'picture-press gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults apply when absent)
    #[arg(long, default_value = "picture-press.toml", global = true)]
    config: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Target flags for single-shot optimization.
#[derive(clap::Args, Clone)]
struct TargetArgs {
    /// Maximum output width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Maximum output height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Starting quality, 1-100 (default from config)
    #[arg(long)]
    quality: Option<u32>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Jpeg)]
    format: OutputFormat,

    /// Write baseline instead of progressive JPEG
    #[arg(long)]
    no_progressive: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Optimize one image to fit the size budget
    Optimize {
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Output file (default: <stem>-optimized.<ext> next to the input)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write the responsive bundle for one image
    Responsive {
        input: PathBuf,

        /// Base name of the bundle files (default: input file stem)
        #[arg(long)]
        base_name: Option<String>,

        /// Output directory (default: the input's directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Process every image under a directory
    Batch {
        dir: PathBuf,

        /// Output directory
        #[arg(long, default_value = "press-out")]
        out_dir: PathBuf,

        /// What to produce for each image
        #[arg(long, value_enum, default_value_t = BatchMode::Responsive)]
        mode: BatchMode,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Print the <picture> candidates for an image path
    Sources { path: String },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let press_config = config::load_config(Some(cli.config.as_path()))?;
    debug!(?press_config, "configuration loaded");
    let policy = CompressionPolicy::from_config(&press_config.compression);
    init_thread_pool(&press_config.processing);

    match cli.command {
        Command::Optimize {
            input,
            target,
            output: output_path,
        } => {
            let request = target
                .options(press_config.compression.default_quality)
                .resolve()?;
            let bytes = std::fs::read(&input)?;
            let source = SourceImage::new(&bytes);

            let compressed = optimize_image(&CodecBackend::new(), &source, &request, &policy)?;
            let output_path = output_path
                .unwrap_or_else(|| sibling_path(&input, "-optimized", request.format.extension()));

            let selected = choose_smaller(&source, compressed.result.clone());
            std::fs::write(&output_path, selected.bytes(&source))?;
            output::print_optimize_output(
                &display_name(&input),
                &display_name(&output_path),
                &compressed,
                selected.is_original(),
            );
        }
        Command::Responsive {
            input,
            base_name,
            out_dir,
        } => {
            let base_name = match base_name {
                Some(name) => name,
                None => file_stem(&input)?,
            };
            let out_dir = out_dir.unwrap_or_else(|| parent_dir(&input));
            let bytes = std::fs::read(&input)?;
            let source = SourceImage::new(&bytes);

            let bundle =
                create_responsive_versions(&CodecBackend::new(), &source, &base_name, &policy)?;
            std::fs::create_dir_all(&out_dir)?;
            let files: Vec<(&str, &[u8])> = bundle
                .iter()
                .map(|(_, file)| (file.filename.as_str(), file.buffer.as_slice()))
                .collect();
            batch::publish_files(&out_dir, &files)?;
            output::print_bundle(&bundle);
        }
        Command::Batch {
            dir,
            out_dir,
            mode,
            target,
        } => {
            let options = BatchOptions {
                mode,
                request: target
                    .options(press_config.compression.default_quality)
                    .resolve()?,
                policy,
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report =
                batch::run_batch(&CodecBackend::new(), &dir, &out_dir, &options, Some(tx))?;
            printer.join().map_err(|_| "output thread panicked")?;
            output::print_batch_summary(&report);
        }
        Command::Sources { path } => {
            let sources = naming::picture_sources(&path, &press_config.assets.managed_prefix);
            output::print_picture_sources(&sources);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

impl TargetArgs {
    fn options(&self, default_quality: u32) -> OptimizationOptions {
        OptimizationOptions {
            width: self.width,
            height: self.height,
            quality: Some(self.quality.unwrap_or(default_quality)),
            format: Some(self.format),
            progressive: Some(!self.no_progressive),
        }
    }
}

/// Initialize tracing. `RUST_LOG` wins over `--verbose` when set.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "picture_press=debug"
    } else {
        "picture_press=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn file_stem(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| format!("cannot derive a base name from {}", path.display()).into())
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `dir/photo.png` + `-optimized` + `jpg` → `dir/photo-optimized.jpg`
fn sibling_path(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parent_dir(input).join(format!("{stem}{suffix}.{extension}"))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
