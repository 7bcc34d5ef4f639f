use behappy::config::{self, ExtractorKind, GalleryConfig};
use behappy::gallery::{self, Gallery};
use behappy::imaging::RustBackend;
use behappy::metadata::{ExifExtractor, ExiftoolExtractor, MemoizedExtractor, MetadataExtractor};
use behappy::process::{self, BuildSettings};
use behappy::{descriptor, media, output, view};
use clap::{Parser, Subcommand};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("BEHAPPY_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("BEHAPPY_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "behappy")]
#[command(about = "Incremental media builder for static photo galleries")]
#[command(long_about = "\
Incremental media builder for static photo galleries

Every album folder carries a behappy.toml descriptor naming the album and
the files it shows. behappy renders each image at every configured size,
copies videos, and writes gallery.json for a page renderer.

Album folder:

  2019-07-14 - Lake/
  ├── behappy.toml               # [album] id, title, date, tags
  ├── behappy.cache.json         # Metadata cache (written by build)
  ├── IMG_0001.jpg
  └── clip.mp4

Output:

  target-gallery/
  ├── gallery.json
  └── album/<id>/<size>/<content hash>.jpg

Outputs are named after their content, so a rebuild only renders what is
missing. Run 'behappy new <folder>' to start a descriptor and
'behappy gen-config' for a documented gallery config.")]
#[command(version = version_string())]
struct Cli {
    /// Gallery config file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Output directory
    #[arg(long, default_value = "target-gallery", global = true)]
    target: PathBuf,

    /// Only include albums carrying one of these tags (comma separated)
    #[arg(long, value_delimiter = ',', global = true)]
    tags: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every image variant, copy videos and write gallery.json
    Build {
        /// Ignore metadata caches and extract everything again
        #[arg(long)]
        no_cache: bool,
    },
    /// Load every album and print the album tree without writing outputs
    Check,
    /// Write a starter behappy.toml into a folder
    New {
        folder: PathBuf,
    },
    /// List every file of the output directory, relative to it
    Files,
    /// Print a stock behappy.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let tags: BTreeSet<String> = cli
        .tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    match cli.command {
        Command::Build { no_cache } => {
            let config = config::load_config(&cli.config)?;
            let options = config.resize_options()?;
            init_thread_pool(&config.processing);
            let gallery = gallery::load_gallery(&config, &tags)?;
            let extractor = make_extractor(&config);

            println!("==> Building {} albums into {}", gallery.len(), cli.target.display());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let settings = BuildSettings {
                target: cli.target.clone(),
                options,
                no_cache,
            };
            let result =
                process::build(&gallery, &RustBackend::new(), &extractor, &settings, Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            let built = result?;

            let images: usize = built.albums.iter().map(|a| a.media.images.len()).sum();
            output::print_load_summary(&gallery, images);
            let gallery_view =
                view::gallery_view(&config, &gallery, &built.albums, &settings.options);
            let view_path = view::write_gallery_view(&cli.target, &gallery_view)?;
            output::print_build_report(&built.report);

            if built.report.has_failures() {
                return Err(format!(
                    "{} albums skipped, {} tasks failed",
                    built.report.album_failures.len(),
                    built.report.failures().count()
                )
                .into());
            }
            println!("==> Build complete: {}", view_path.display());
        }
        Command::Check => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let gallery = gallery::load_gallery(&config, &tags)?;
            let extractor = make_extractor(&config);
            println!("==> Checking {} albums", gallery.len());

            let media = load_all_media(&gallery, &extractor)?;
            let images: usize = media.values().map(|m| m.images.len()).sum();
            output::print_load_summary(&gallery, images);
            output::print_check(&gallery, &media);
            println!("==> Albums are valid");
        }
        Command::New { folder } => {
            let today = chrono::Local::now().date_naive();
            let path = descriptor::scaffold(&folder, today)?;
            println!("Created {}", path.display());
        }
        Command::Files => {
            let files = output::list_output_files(&cli.target)?;
            output::print_files(&files);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// The configured extractor behind a process-lifetime memo.
fn make_extractor(config: &GalleryConfig) -> MemoizedExtractor<Box<dyn MetadataExtractor>> {
    let inner: Box<dyn MetadataExtractor> = match config.metadata.extractor {
        ExtractorKind::Exif => Box::new(ExifExtractor::new()),
        ExtractorKind::Exiftool => Box::new(ExiftoolExtractor::default()),
    };
    MemoizedExtractor::new(inner, config.metadata.memo_capacity)
}

fn load_all_media(
    gallery: &Gallery,
    extractor: &dyn MetadataExtractor,
) -> Result<HashMap<String, media::AlbumMedia>, Box<dyn std::error::Error>> {
    let mut all = HashMap::new();
    for album in gallery.albums() {
        let loaded = media::load_album_media(album, extractor, false)
            .map_err(|e| format!("album {}: {e}", album.id))?;
        all.insert(album.id.clone(), loaded);
    }
    Ok(all)
}
