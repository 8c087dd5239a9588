// Desktop/tooling crate - unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
// Image maths on the host; overflow checks stay on in debug builds.
#![allow(
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
#![allow(missing_docs)]

mod inspect_playlist;
mod pack_image;
mod simulate;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "E-paper photo frame host tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run wake cycles against a card directory and save each frame as PNG
    Simulate {
        /// Directory standing in for the memory card root
        #[arg(long)]
        card: PathBuf,
        /// JSON file overriding the built-in frame configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory the rendered frames are written to
        #[arg(long, default_value = "target/frames")]
        out: PathBuf,
        /// Number of consecutive wakes to simulate
        #[arg(long, default_value_t = 1)]
        cycles: u32,
        /// Battery voltage reported to the cycle, in millivolts
        #[arg(long)]
        battery_mv: Option<u16>,
        /// Draw the frame in emulated external RAM instead of local memory
        #[arg(long)]
        external_ram: bool,
    },
    /// Convert an image (or every image in a directory) to a packed 4bpp frame
    PackImage {
        /// Source image file or directory
        #[arg(long)]
        input: PathBuf,
        /// Output `.bin` file, or directory when `input` is a directory
        #[arg(long)]
        output: PathBuf,
        /// Encode 16 grey levels instead of the seven-colour palette
        #[arg(long)]
        grey: bool,
        /// Disable Floyd-Steinberg error diffusion
        #[arg(long)]
        no_dither: bool,
    },
    /// Decode a stored playlist record and print its contents
    InspectPlaylist {
        /// Path of the record file (`config.bin`)
        #[arg(long)]
        record: PathBuf,
        /// Card root used to resolve locators into file names
        #[arg(long)]
        card: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { card, config, out, cycles, battery_mv, external_ram } => {
            let options = simulate::Options { cycles, battery_mv, external_ram };
            simulate::run(&card, config.as_deref(), &out, options)
        }
        Commands::PackImage { input, output, grey, no_dither } => {
            let palette = if grey { pack_image::Palette::Grey } else { pack_image::Palette::Acep };
            pack_image::run(&input, &output, palette, !no_dither)
        }
        Commands::InspectPlaylist { record, card } => inspect_playlist::run(&record, card.as_deref()),
    }
}
