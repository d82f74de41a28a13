use clap::{Parser, Subcommand};
use marksite::apply::{self, ApplyEvent};
use marksite::manifest::{DEFAULT_MANIFEST, Manifest};
use marksite::options::Options;
use marksite::stage::Stage;
use marksite::{output, site};
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::info;

/// Manifest files to apply, in order.
#[derive(clap::Args, Clone)]
struct ManifestArgs {
    /// Manifest file(s)
    #[arg(default_value = DEFAULT_MANIFEST)]
    manifests: Vec<PathBuf>,
}

#[derive(Parser)]
#[command(name = "marksite")]
#[command(about = "Render Markdown trees into static sites")]
#[command(long_about = "\
Render Markdown trees into static sites

A manifest maps site keys to sites. Each site is built in three stages:
cleanup (remove copy targets), copy (copy files and directories into place)
and build (render the source tree into the destination tree).

Source tree conventions:

  content/
  ├── .marksiteignore              # gitignore-style rules (source root only)
  ├── _header.html                 # Header for this directory and below
  ├── _footer.html                 # Footer for this directory and below
  ├── index.md                     # → index.html
  ├── about.md                     # skipped: about.html exists
  ├── about.html                   # copied as is
  └── blog/
      ├── _header.html             # Overrides the root header under blog/
      ├── _index.marksite          # → index.md listing blog/ (generate-index)
      └── 2024-05-01-launch.md     # → 2024-05-01-launch.html

Headers may contain {{from-h1}} (title from the first '# heading') or
{{from-tag}} (title from a ':title ...' line, removed from the page).

MARKSITE_WRITERS sets the number of concurrent writers (default 20).")]
#[command(version)]
struct Cli {
    /// Log every file handled (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Skip the cleanup stage
    #[arg(long, global = true)]
    no_cleanup: bool,

    /// Skip the copy stage
    #[arg(long, global = true)]
    no_copy: bool,

    /// Skip the build stage
    #[arg(long, global = true)]
    no_build: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run cleanup, copy and build for every site
    Build(ManifestArgs),
    /// Run only the copy stage
    Copy(ManifestArgs),
    /// Run only the cleanup stage
    #[command(alias = "cleanup")]
    Clean(ManifestArgs),
    /// Build a single site without a manifest
    Generate {
        /// Source directory
        src: PathBuf,
        /// Destination directory
        dst: PathBuf,
        /// Title used when a page has none
        #[arg(long, default_value = "")]
        title: String,
        /// Base URL; enables sitemap.xml
        #[arg(long, default_value = "")]
        url: String,
        /// Concurrent writers (0 = MARKSITE_WRITERS or the default)
        #[arg(long, default_value_t = 0)]
        writers: usize,
    },
}

impl Cli {
    /// Stages selected by the subcommand, minus the `--no-*` flags.
    fn stages(&self, base: Stage) -> Stage {
        let mut stages = base;
        if self.no_cleanup {
            stages = stages.skip(Stage::CLEANUP);
        }
        if self.no_copy {
            stages = stages.skip(Stage::COPY);
        }
        if self.no_build {
            stages = stages.skip(Stage::BUILD);
        }
        stages
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "marksite=debug" } else { "marksite=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (stages, args) = match &cli.command {
        Command::Build(args) => (cli.stages(Stage::ALL), args),
        Command::Copy(args) => (cli.stages(Stage::COPY), args),
        Command::Clean(args) => (cli.stages(Stage::CLEANUP), args),
        Command::Generate {
            src,
            dst,
            title,
            url,
            writers,
        } => {
            let options = Options::new().writers(*writers);
            let written = site::generate(src, dst, title, url, options)?;
            output::print_written(dst, &written);
            return Ok(());
        }
    };

    for path in &args.manifests {
        info!(manifest = %path.display(), %stages, "applying");
        let manifest = Manifest::load(path)?;
        run_manifest(&manifest, stages)?;
    }

    Ok(())
}

/// Apply one manifest, printing progress as it arrives.
fn run_manifest(manifest: &Manifest, stages: Stage) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel::<ApplyEvent>();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_apply_event(&event);
        }
    });
    let result = apply::apply_manifest(manifest, stages, Some(tx));
    printer.join().map_err(|_| "progress printer panicked")?;
    result?;
    Ok(())
}
