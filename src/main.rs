use std::path::PathBuf;

use clap::{
    Args, CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use genrefy::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sort the selected tracks into genres and print the result
    Genres(GenresOptions),

    /// Create one playlist per genre
    Create(CreateOptions),

    /// List your playlists
    Playlists,

    /// Inspect or prune the artist genre cache
    Cache(CacheOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Include your liked songs
    #[clap(long)]
    pub liked: bool,

    /// Include a playlist by id; can be repeated
    #[clap(long = "playlist", value_name = "ID")]
    pub playlists: Vec<String>,

    /// Collect tracks without any genre under "unknown"
    #[clap(long)]
    pub include_unknown: bool,

    /// Drop genres with fewer tracks
    #[clap(long, value_name = "N")]
    pub min_tracks: Option<usize>,

    /// Stop after this many unique tracks
    #[clap(long, value_name = "N")]
    pub max_tracks: Option<usize>,
}

impl SourceArgs {
    fn into_selection(self, genres: Vec<String>) -> cli::SourceSelection {
        cli::SourceSelection {
            liked: self.liked,
            playlists: self.playlists,
            include_unknown: self.include_unknown,
            min_tracks: self.min_tracks,
            max_tracks: self.max_tracks,
            genres,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct GenresOptions {
    #[clap(flatten)]
    sources: SourceArgs,

    /// Write the genre buckets as JSON to this file
    #[clap(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct CreateOptions {
    #[clap(flatten)]
    sources: SourceArgs,

    /// Only create playlists for these genres; can be repeated
    #[clap(long = "genre", value_name = "GENRE")]
    genres: Vec<String>,

    /// Skip genres whose playlist already exists
    #[clap(long)]
    skip_duplicates: bool,

    /// Make the created playlists public
    #[clap(long)]
    public: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CacheOptions {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheSubcommand {
    /// Show how many artists are cached and how many are stale
    Stats,

    /// Remove entries older than the given number of days
    Compact(CompactOpts),
}

#[derive(Parser, Debug, Clone)]
pub struct CompactOpts {
    /// Maximum entry age in days (default: 90)
    #[clap(long)]
    days: Option<u64>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("genrefy=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Genres(opt) => cli::genres(opt.sources.into_selection(Vec::new()), opt.output).await,
        Command::Create(opt) => {
            cli::create(
                opt.sources.into_selection(opt.genres),
                opt.skip_duplicates,
                opt.public,
            )
            .await
        }
        Command::Playlists => cli::playlists().await,
        Command::Cache(opt) => match opt.command {
            CacheSubcommand::Stats => cli::cache_stats().await,
            CacheSubcommand::Compact(c) => cli::cache_compact(c.days).await,
        },
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
