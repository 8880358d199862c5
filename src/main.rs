use clap::{Parser, Subcommand};
use dated_gallery::exif_cache::ExifCache;
use dated_gallery::generate::{self, BuildPaths, Mode};
use dated_gallery::imaging::RustBackend;
use dated_gallery::logging::{self, LogOnce};
use dated_gallery::{config, output};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Shared flags for commands that read EXIF data.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Ignore the EXIF cache: read every image and don't save the cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "dated-gallery")]
#[command(about = "Incremental photo gallery builder for static sites")]
#[command(long_about = "\
Incremental photo gallery builder for static sites

Every directory under _galleries/ that holds images is a gallery. Images are
resized and thumbnailed into content-addressed files, and a JSON model of all
galleries is written for the site's templates.

Source structure:

  site/
  ├── config.toml                    # [gallery] table (optional)
  └── _galleries/
      ├── 2023-05-01_summer-trip/    # date prefix → date, rest → id and name
      │   ├── _metadata.toml         # optional: id, name, datetime, extra keys
      │   ├── hl_beach.jpg           # hl_ prefix or _hl suffix → highlight
      │   └── dunes.heic             # non-web formats are converted to PNG
      └── travel/lisbon/             # nested galleries are fine
          └── tram.jpg

Gallery date (later sources win):
  directory prefix → earliest EXIF DateTimeOriginal → _metadata datetime

Run 'dated-gallery gen-config' to print a documented [gallery] table.")]
#[command(version = env!("DATED_GALLERY_VERSION"))]
struct Cli {
    /// Site source directory
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Site destination directory
    #[arg(long, default_value = "_site", global = true)]
    dest: PathBuf,

    /// Directory for the EXIF cache and the galleries model
    #[arg(long, default_value = ".gallery-cache", global = true)]
    cache_dir: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process all galleries and write images plus galleries.json
    Build(CacheArgs),
    /// Resolve every gallery and verify images are readable, without writing
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let paths = BuildPaths {
        source: &cli.source,
        dest: &cli.dest,
    };
    let log = LogOnce::new();
    let backend = RustBackend::new();

    match cli.command {
        Command::Build(cache_args) => {
            let config = generate::load_config(&cli.source, &log)?;
            init_thread_pool(&config.processing);
            let cache = if cache_args.no_cache {
                ExifCache::in_memory()
            } else {
                ExifCache::load(&cli.cache_dir)
            };

            println!("==> Building galleries from {}", cli.source.display());
            let Some(result) =
                generate::generate(paths, &config, Mode::Build, &backend, &cache, &log)?
            else {
                println!("==> No galleries to build");
                return Ok(());
            };

            if !cache_args.no_cache {
                cache.save(&cli.cache_dir)?;
            }
            write_json(&cli.cache_dir, "galleries.json", &result.model)?;
            write_json(&cli.cache_dir, "pages.json", &result.pages)?;
            output::print_build_output(&result);
            println!("==> Build complete: {}", cli.dest.display());
        }
        Command::Check => {
            let config = generate::load_config(&cli.source, &log)?;
            init_thread_pool(&config.processing);
            let cache = ExifCache::load(&cli.cache_dir);

            println!("==> Checking {}", cli.source.display());
            match generate::generate(paths, &config, Mode::Check, &backend, &cache, &log)? {
                Some(result) => {
                    output::print_check_output(&result);
                    println!("==> Galleries are valid");
                }
                None => println!("==> No galleries to check"),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn write_json(dir: &Path, name: &str, value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(dir.join(name), json)?;
    Ok(())
}
