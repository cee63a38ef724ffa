use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dogfetch",
    version,
    about = "Browse the dog image API with retries, offline suspension and an image cache"
)]
pub struct Cli {
    /// API base URL (overrides DOGFETCH_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// host:port probed to decide whether the network is reachable
    #[arg(long, global = true, default_value = "dog.ceo:443")]
    pub probe: String,

    /// Retry lost connections immediately instead of waiting for the probe
    #[arg(long, global = true)]
    pub no_probe: bool,

    /// Debug logging for dogfetch
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every breed, sorted
    Breeds,
    /// List image URLs of a breed
    Images(ImagesArgs),
    /// Print one random image URL of a breed
    Random(RandomArgs),
    /// Fetch an image and save it as PNG
    Download(DownloadArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ImagesArgs {
    /// Breed name; sub-breeds as "hound/afghan"
    pub breed: String,

    /// Print at most this many URLs
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RandomArgs {
    /// Breed name; sub-breeds as "hound/afghan"
    pub breed: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Absolute image URL
    pub url: url::Url,

    /// Output file (written as PNG)
    #[arg(long, short)]
    pub out: PathBuf,
}
