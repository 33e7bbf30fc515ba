mod actions;
mod error;
mod manifest;

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};
use log::{error, LevelFilter};

use crate::actions::{ActionContext, BuildRequest, ExtractRequest, OutputFormat};
use crate::error::ActionError;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Inspect, build and repair DS cartridge banners")]
struct Args {
    /// Log every processing step.
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show header and banner information of a cartridge.
    Info {
        #[clap(parse(from_os_str))]
        rom: PathBuf,
        /// Print the report as JSON.
        #[clap(long)]
        json: bool,
    },

    /// Show information about a standalone banner file.
    BannerInfo {
        #[clap(parse(from_os_str))]
        banner: PathBuf,
        #[clap(long)]
        json: bool,
    },

    /// Recompute the banner CRCs of a cartridge in place.
    FixBannerCrc {
        #[clap(parse(from_os_str))]
        rom: PathBuf,
    },

    /// Recompute the logo and header CRCs of a cartridge in place.
    FixHeaderCrc {
        #[clap(parse(from_os_str))]
        rom: PathBuf,
    },

    /// Build a banner from a BMP/GIF/PNG icon or a GRF file.
    #[clap(group(ArgGroup::new("target").required(true).args(&["out", "rom"])))]
    BuildBanner {
        /// Static icon (32x32, at most 16 colors).
        #[clap(long, parse(from_os_str), conflicts_with = "grf")]
        icon: Option<PathBuf>,
        /// Animated icon (GIF), stored as up to 8 unique frames.
        #[clap(long, parse(from_os_str))]
        animation: Option<PathBuf>,
        /// Pre-converted GRF icon.
        #[clap(long, parse(from_os_str))]
        grf: Option<PathBuf>,
        /// English title, used as the fallback for other languages; ';' starts a new line.
        #[clap(long, parse(from_os_str))]
        title: Option<OsString>,
        /// Title for one language, as LANGUAGE=TEXT.
        #[clap(long = "lang-title")]
        lang_title: Vec<String>,
        /// JSON file with icon, animation, grf and titles.
        #[clap(long, parse(from_os_str))]
        manifest: Option<PathBuf>,
        /// Write the banner to a standalone file.
        #[clap(long, parse(from_os_str))]
        out: Option<PathBuf>,
        /// Write the banner into a cartridge at its banner offset.
        #[clap(long, parse(from_os_str))]
        rom: Option<PathBuf>,
    },

    /// Place a prebuilt banner record into a cartridge.
    PutBanner {
        #[clap(parse(from_os_str))]
        rom: PathBuf,
        /// Banner record, as written by `extract-banner --bin`.
        #[clap(parse(from_os_str))]
        bin: PathBuf,
    },

    /// Export the banner of a cartridge.
    ExtractBanner {
        #[clap(parse(from_os_str))]
        rom: PathBuf,
        /// Raw banner record.
        #[clap(long, parse(from_os_str))]
        bin: Option<PathBuf>,
        /// Static icon image.
        #[clap(long, parse(from_os_str))]
        icon: Option<PathBuf>,
        /// Animation as GIF.
        #[clap(long, parse(from_os_str))]
        animation: Option<PathBuf>,
    },
}

fn run(command: Command) -> Result<(), ActionError> {
    let context = |json: bool| {
        ActionContext::new(if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        })
    };

    match command {
        Command::Info { rom, json } => context(json).info(&rom),
        Command::BannerInfo { banner, json } => context(json).banner_info(&banner),
        Command::FixBannerCrc { rom } => context(false).fix_banner_crc(&rom),
        Command::FixHeaderCrc { rom } => context(false).fix_header_crc(&rom),
        Command::BuildBanner {
            icon,
            animation,
            grf,
            title,
            lang_title,
            manifest,
            out,
            rom,
        } => context(false).build_banner(BuildRequest {
            icon,
            animation,
            grf,
            title,
            lang_titles: lang_title,
            manifest,
            out,
            rom,
        }),
        Command::PutBanner { rom, bin } => context(false).put_banner(&rom, &bin),
        Command::ExtractBanner {
            rom,
            bin,
            icon,
            animation,
        } => context(false).extract_banner(
            &rom,
            ExtractRequest {
                bin,
                icon,
                animation,
            },
        ),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    lib_nds::init_logging(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:?}", err);
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
