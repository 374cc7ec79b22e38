use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use snapshare_lib::SurfaceSize;

#[derive(Parser)]
#[command(name = "snapshare")]
#[command(
    version,
    about = "Snapshare - Capture, copy, download, persist and share mockup previews",
    long_about = "Snapshare\n\nModes:\n- capture: render a surface to PNG and save it locally.\n- copy: render a surface and place the image on the clipboard.\n- upload: render and persist to the blob + metadata store.\n- share: get or create a share link and hand it to the share facility (clipboard fallback).\n- resolve: look up a share link or id and optionally save the stored image.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose output (debug logging)")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) to set defaults for capture/storage/share/download; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a surface and save it as a local download
    Capture {
        #[command(flatten)]
        surface: SurfaceArgs,

        #[command(flatten)]
        download: DownloadArgs,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Capture a surface and copy the image to the clipboard
    Copy {
        #[command(flatten)]
        surface: SurfaceArgs,

        #[arg(
            long,
            help = "Save a local download instead when the clipboard cannot take images"
        )]
        fallback_download: bool,

        #[command(flatten)]
        download: DownloadArgs,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Capture a surface and persist it to storage
    Upload {
        #[command(flatten)]
        surface: SurfaceArgs,

        #[arg(long, value_name = "ID", help = "Owner id used for key naming and lookups")]
        owner: Option<String>,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Get or create a share link and share it
    Share {
        #[command(flatten)]
        surface: SurfaceArgs,

        #[arg(long, value_name = "ID", help = "Owner id used for key naming and lookups")]
        owner: Option<String>,

        #[arg(
            long,
            help = "Always capture a new artifact instead of reusing the latest one"
        )]
        regenerate: bool,

        #[arg(
            long,
            num_args = 1..,
            value_name = "ARGV",
            help = "Program (and args) used as the native share facility; {url}, {title} and {text} are substituted"
        )]
        share_command: Option<Vec<String>>,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Resolve a share link or id to its stored artifact
    Resolve {
        #[arg(value_name = "ID|LINK", help = "Artifact id or full share link")]
        target: String,

        #[arg(long, value_name = "PATH", help = "Write the stored image to this path")]
        save: Option<PathBuf>,

        #[command(flatten)]
        report: ReportArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SurfaceArgs {
    #[arg(long, value_name = "PATH", help = "Surface composition (JSON or YAML)")]
    pub surface: PathBuf,

    #[arg(
        long = "slot",
        value_name = "N=PATH",
        value_parser = parse_slot,
        help = "Populate upload slot N with an image path, URL or data URL (repeatable)"
    )]
    pub slots: Vec<SlotArg>,

    #[arg(long, value_name = "WIDTHxHEIGHT", help = "Override the surface size")]
    pub size: Option<SurfaceSize>,

    #[arg(
        long,
        default_value = "1.0",
        help = "Encoding quality 0.0-1.0 (PNG is lossless; trades speed for size)"
    )]
    pub quality: f32,

    #[arg(long, default_value = "1.0", help = "Device pixel ratio")]
    pub pixel_ratio: f32,

    #[arg(long, value_name = "FAMILY", help = "Force a font family for all text")]
    pub font: Option<String>,

    #[arg(
        long,
        help = "Inline stylesheet links instead of stripping them (fails on cross-origin sheets)"
    )]
    pub keep_stylesheets: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[arg(long, default_value = "screen", help = "Screen type used in the download name")]
    pub screen: String,

    #[arg(long, help = "Gender variant used in the download name")]
    pub gender: Option<String>,

    #[arg(long, value_name = "PATH", help = "Directory for downloads; created if missing")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, short, help = "Output file path (stdout if omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotArg {
    pub index: usize,
    pub source: String,
}

fn parse_slot(raw: &str) -> Result<SlotArg, String> {
    let (index, source) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected N=PATH, got '{raw}'"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("slot index '{index}' is not a number"))?;
    if source.trim().is_empty() {
        return Err(format!("slot {index} has an empty source"));
    }
    Ok(SlotArg {
        index,
        source: source.to_string(),
    })
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
