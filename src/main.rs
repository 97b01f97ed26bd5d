use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use tilesetc::config::{Config, TilesPngPaletteMode};
use tilesetc::driver::{self, CompileInputs};

#[derive(Parser)]
#[command(
    name = "tilesetc",
    version,
    about = "Compile layered RGBA tile sheets into Gen-3 tileset data"
)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile bottom/middle/top layer sheets into tiles.png, palettes
    /// and metatiles.bin
    Compile(CompileArgs),
    /// Compile a single unlayered tile sheet into tiles.png and palettes
    CompileRaw(CompileRawArgs),
}

#[derive(Args)]
struct SharedOptions {
    /// Output build files to this directory, creating it if needed
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    output: PathBuf,

    /// Number of tiles in a primary set, as in your fieldmap.h
    #[arg(long, value_name = "N")]
    num_tiles_primary: Option<usize>,

    /// Total number of tiles across a primary/secondary pair
    #[arg(long, value_name = "N")]
    num_tiles_total: Option<usize>,

    /// Number of metatiles in a primary set
    #[arg(long, value_name = "N")]
    num_metatiles_primary: Option<usize>,

    /// Total number of metatiles across a primary/secondary pair
    #[arg(long, value_name = "N")]
    num_metatiles_total: Option<usize>,

    /// Number of palettes in a primary set
    #[arg(long, value_name = "N")]
    num_pals_primary: Option<usize>,

    /// Total number of palettes across a primary/secondary pair
    #[arg(long, value_name = "N")]
    num_pals_total: Option<usize>,

    /// Palette mode for the emitted tiles.png; visual only, the in-game
    /// data is unaffected
    #[arg(long, value_enum, value_name = "MODE", default_value_t = PalMode::Greyscale)]
    tiles_png_pal_mode: PalMode,

    /// Use the pokeemerald fieldmap parameters (the default)
    #[arg(long, conflicts_with_all = ["preset_firered", "preset_ruby"])]
    preset_emerald: bool,

    /// Use the pokefirered fieldmap parameters
    #[arg(long, conflicts_with = "preset_ruby")]
    preset_firered: bool,

    /// Use the pokeruby fieldmap parameters
    #[arg(long)]
    preset_ruby: bool,
}

#[derive(Args)]
struct CompileArgs {
    #[command(flatten)]
    options: SharedOptions,

    /// Treat this as a secondary tileset reusing tiles and palettes from
    /// its paired primary
    #[arg(long)]
    secondary: bool,

    /// The bottom, middle and top primary sheets; with --secondary,
    /// followed by the bottom, middle and top secondary sheets
    #[arg(value_name = "SHEETS", required = true)]
    sheets: Vec<PathBuf>,
}

#[derive(Args)]
struct CompileRawArgs {
    #[command(flatten)]
    options: SharedOptions,

    /// The tile sheet to compile
    #[arg(value_name = "SHEET")]
    sheet: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PalMode {
    /// Reserved; currently renders as greyscale
    Pal0,
    /// Pack all compiled palettes into the PNG palette
    TrueColor,
    /// A linear grey ramp over the 4-bit indices
    Greyscale,
}

impl From<PalMode> for TilesPngPaletteMode {
    fn from(mode: PalMode) -> Self {
        match mode {
            PalMode::Pal0 => TilesPngPaletteMode::Pal0,
            PalMode::TrueColor => TilesPngPaletteMode::TrueColor,
            PalMode::Greyscale => TilesPngPaletteMode::Greyscale,
        }
    }
}

fn build_config(options: &SharedOptions) -> Config {
    let mut config = Config::default();
    if options.preset_firered {
        config.apply_firered_preset();
    } else if options.preset_ruby {
        config.apply_ruby_preset();
    }

    if let Some(n) = options.num_tiles_primary {
        config.num_tiles_in_primary = n;
    }
    if let Some(n) = options.num_tiles_total {
        config.num_tiles_total = n;
    }
    if let Some(n) = options.num_metatiles_primary {
        config.num_metatiles_in_primary = n;
    }
    if let Some(n) = options.num_metatiles_total {
        config.num_metatiles_total = n;
    }
    if let Some(n) = options.num_pals_primary {
        config.num_palettes_in_primary = n;
    }
    if let Some(n) = options.num_pals_total {
        config.num_palettes_total = n;
    }
    config.tiles_png_palette_mode = options.tiles_png_pal_mode.into();
    config
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Compile(args) => {
            let mut config = build_config(&args.options);
            config.secondary = args.secondary;

            let mut sheets = args.sheets.into_iter();
            let mut next_three = || -> [PathBuf; 3] {
                [
                    sheets.next().expect("arity checked in main"),
                    sheets.next().expect("arity checked in main"),
                    sheets.next().expect("arity checked in main"),
                ]
            };
            let inputs = CompileInputs {
                primary: next_three(),
                secondary: config.secondary.then(next_three),
            };
            driver::drive_compile(&config, &inputs, &args.options.output)
        }
        Command::CompileRaw(args) => {
            let config = build_config(&args.options);
            driver::drive_compile_raw(&config, &args.sheet, &args.options.output)
        }
    }
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        // Help and version go to stdout and exit 0; everything else is a
        // usage error.
        let code = i32::from(err.use_stderr());
        let _ = err.print();
        process::exit(code);
    });

    if let Command::Compile(args) = &cli.command {
        let expected = if args.secondary { 6 } else { 3 };
        if args.sheets.len() != expected {
            eprintln!(
                "error: expected {expected} sheet paths ({}), got {}",
                if args.secondary {
                    "primary then secondary, bottom/middle/top each"
                } else {
                    "bottom, middle, top"
                },
                args.sheets.len()
            );
            process::exit(1);
        }
    }

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(2);
    }
}
