use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use symscan::{
    address_arg, clear_command, generate_command, list_command, load_command, lookup_command,
    rename_command, scan_command, sig_apply_command, sig_create_command, SessionOptions,
};

/// Function discovery and signature-based naming for raw code images.
///
/// This CLI is a thin wrapper around `symscan-core`. Every invocation maps one
/// image, optionally loads a symbol map, runs a single operation and writes
/// the result back out.
#[derive(Parser, Debug)]
#[command(
    name = "symscan",
    version,
    about = "Symbol scanner for machine-code images",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// The memory image every command operates on.
#[derive(Args, Debug)]
struct ImageArgs {
    /// Raw memory dump to analyse.
    #[arg(long)]
    image: PathBuf,

    /// Address the first byte of the image is mapped at (hex).
    #[arg(long, value_parser = address_arg, default_value = "0x80000000")]
    base: u32,

    /// Engine configuration JSON (scan ranges, signature library).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ImageArgs {
    fn options(&self, map: Option<PathBuf>) -> SessionOptions {
        SessionOptions::new(&self.image)
            .with_base(self.base)
            .with_config(self.config.clone())
            .with_map(map)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover functions in an address range.
    Scan {
        #[command(flatten)]
        image: ImageArgs,

        /// First address to scan (hex).
        #[arg(long, value_parser = address_arg)]
        start: u32,

        /// One past the last address to scan (hex).
        #[arg(long, value_parser = address_arg)]
        end: u32,

        /// Existing symbol map to start from.
        #[arg(long)]
        map: Option<PathBuf>,

        /// Write the resulting symbol map here.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Append each symbol's bytes to the written map.
        #[arg(long, default_value_t = false)]
        with_body: bool,
    },

    /// Scan the configured range and name functions from the signature library.
    Generate {
        #[command(flatten)]
        image: ImageArgs,

        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        with_body: bool,
    },

    /// Load a symbol map; if it does not exist, scan the fallback range instead.
    Load {
        #[command(flatten)]
        image: ImageArgs,

        #[arg(long)]
        map: PathBuf,

        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        with_body: bool,
    },

    /// Remove symbols from a map.
    Clear {
        #[command(flatten)]
        image: ImageArgs,

        #[arg(long)]
        map: Option<PathBuf>,

        /// Only remove symbols whose name starts with this prefix.
        #[arg(long, conflicts_with = "placeholders")]
        prefix: Option<String>,

        /// Only remove symbols still carrying a `zz` placeholder name.
        #[arg(long, default_value_t = false)]
        placeholders: bool,

        /// Write here instead of rewriting --map.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Build a signature library from the named functions of a map.
    SigCreate {
        #[command(flatten)]
        image: ImageArgs,

        #[arg(long)]
        map: PathBuf,

        /// Signature library to write.
        #[arg(long)]
        out: PathBuf,

        /// Only include functions whose name starts with this prefix.
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Name placeholder functions of a map from a signature library.
    SigApply {
        #[command(flatten)]
        image: ImageArgs,

        #[arg(long)]
        map: Option<PathBuf>,

        /// Signature library to apply.
        #[arg(long)]
        sig: PathBuf,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Apply a rename file (`<address> <type> <name>` per line) to a map.
    Rename {
        #[command(flatten)]
        image: ImageArgs,

        #[arg(long)]
        map: PathBuf,

        #[arg(long)]
        renames: PathBuf,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show the symbol at an address with its callers and callees.
    Lookup {
        #[command(flatten)]
        image: ImageArgs,

        #[arg(long)]
        map: Option<PathBuf>,

        #[arg(value_parser = address_arg)]
        address: u32,

        /// Fall back to the function whose range contains the address.
        #[arg(long, default_value_t = false)]
        containing: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List symbols in ascending address order.
    List {
        #[command(flatten)]
        image: ImageArgs,

        #[arg(long)]
        map: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        functions: bool,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("SYMSCAN_LOG")
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Command::Scan { image, start, end, map, out, with_body } => {
            scan_command(&image.options(map), start, end, out.as_deref(), with_body)?
        }
        Command::Generate { image, out, with_body } => {
            generate_command(&image.options(None), out.as_deref(), with_body)?
        }
        Command::Load { image, map, out, with_body } => {
            load_command(&image.options(None), &map, out.as_deref(), with_body)?
        }
        Command::Clear { image, map, prefix, placeholders, out } => {
            clear_command(&image.options(map), prefix.as_deref(), placeholders, out.as_deref())?
        }
        Command::SigCreate { image, map, out, prefix } => {
            sig_create_command(&image.options(Some(map)), &out, prefix.as_deref())?
        }
        Command::SigApply { image, map, sig, out } => {
            sig_apply_command(&image.options(map), &sig, out.as_deref())?
        }
        Command::Rename { image, map, renames, out } => {
            rename_command(&image.options(Some(map)), &renames, out.as_deref())?
        }
        Command::Lookup { image, map, address, containing, json } => {
            lookup_command(&image.options(map), address, containing, json)?
        }
        Command::List { image, map, functions, json } => {
            list_command(&image.options(map), functions, json)?
        }
    }

    Ok(())
}
