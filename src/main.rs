use clap::{Parser, Subcommand};
use fotei::batch::{BatchOptions, BatchOrchestrator};
use fotei::imaging::{EncodingTarget, RustBackend};
use fotei::retry::RetryPolicy;
use fotei::shrink::{self, ShrinkOptions};
use fotei::tagging::{EnvCredentials, GeminiTagger};
use fotei::{config, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fotei")]
#[command(about = "Tag and shrink a personal photo collection")]
#[command(long_about = "\
Tag and shrink a personal photo collection

tag:    walks ROOT in sorted order and asks a vision model for tags for every
        media file. Tags go to ROOT/semantic_tags_metadata.json. Interrupted
        runs resume after the last completed directory; files already in the
        store are never sent again.

shrink: re-encodes images so each fits --target-size at the best quality
        that fits. PNG stays PNG (compression level search); everything else
        becomes JPEG (quality search).

The API key is read from the environment variable named in the config
(GEMINI_API_KEY by default). Set RUST_LOG=debug to see retries.

Run 'fotei gen-config' to generate a documented fotei.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ROOT/fotei.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ShrinkArgs {
    /// Folder to process recursively
    folder: PathBuf,

    /// Byte budget per image, e.g. 200KB, 1.5MB, 512B
    #[arg(long, value_parser = shrink::parse_size)]
    target_size: u64,

    /// Bound for the longest side in pixels (0 keeps dimensions)
    #[arg(long, default_value_t = 0)]
    max_dimension: u32,

    /// Write results under this directory instead of overwriting originals
    #[arg(long)]
    output: Option<PathBuf>,

    /// Report resulting sizes without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate tags for every media file under ROOT
    Tag {
        /// Root directory of the collection
        root: PathBuf,
    },
    /// Re-encode images to fit a byte budget
    Shrink(ShrinkArgs),
    /// Print a stock fotei.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Tag { root } => {
            let root = resolve_root(&root)?;
            let config = config::load_config(&root, cli.config.as_deref())?;
            let credentials = EnvCredentials::new(config.tagging.api_key_env.as_str());
            let tagger = GeminiTagger::new(config.tagging.clone(), credentials)?;
            let orchestrator =
                BatchOrchestrator::new(tagger, RetryPolicy::from_config(&config.retry));
            let options = BatchOptions::from_config(&root, &config);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_tag_event(&event);
                }
            });
            let result = orchestrator.run(&root, &options, Some(tx));
            printer.join().map_err(|_| "output thread panicked")?;
            result?;
            println!("Tags: {}", options.metadata_path.display());
        }
        Command::Shrink(args) => {
            let options = ShrinkOptions {
                target: EncodingTarget::new(args.target_size, args.max_dimension),
                output_dir: args.output,
                dry_run: args.dry_run,
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_shrink_event(&event);
                }
            });
            let result = shrink::shrink_tree(&RustBackend::new(), &args.folder, &options, Some(tx));
            printer.join().map_err(|_| "output thread panicked")?;
            let summary = result?;
            println!("{}", output::format_shrink_summary(&summary, options.dry_run));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Validate the tagging root and make it absolute.
///
/// The checkpoint stores absolute paths, so the root must resolve the same way
/// on every run.
fn resolve_root(root: &Path) -> Result<PathBuf, String> {
    if !root.exists() {
        return Err(format!("Root directory does not exist: {}", root.display()));
    }
    if !root.is_dir() {
        return Err(format!("Root is not a directory: {}", root.display()));
    }
    root.canonicalize()
        .map_err(|e| format!("Cannot resolve {}: {}", root.display(), e))
}
