#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::io::prelude::*;

use anyhow::{Context, Result};
use env_logger::Builder;
use gbapack_pack::prelude::*;
use log::{Level, LevelFilter};
use owo_colors::OwoColorize;

mod cli;

/// Pre-built crt0 loader images, selected by boot mode at pack time.
const CRT0_MULTIBOOT: &[u8] = include_bytes!("../assets/crt0_multiboot.bin");
const CRT0_ROM: &[u8] = include_bytes!("../assets/crt0_rom.bin");

fn color_level(level: Level) -> String {
    match level {
        Level::Error => level.red().to_string(),
        Level::Warn => level.yellow().to_string(),
        Level::Info => level.green().to_string(),
        Level::Debug => level.blue().to_string(),
        Level::Trace => level.purple().to_string(),
    }
}

const fn level_filter(verbose: usize) -> LevelFilter {
    match verbose {
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

fn main() -> Result<()> {
    let args: cli::Args = argp::parse_args_or_exit(argp::DEFAULT);

    if args.version {
        println!("gbapack {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.verbose != 0 {
        Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{}] {} {}",
                    gbapack_core::time::current_time(),
                    color_level(record.level()),
                    record.args()
                )
            })
            .filter(None, level_filter(args.verbose))
            .init();
    }

    let input = args.input.context("missing required argument: input")?;
    let output = args.output.context("missing required argument: output")?;

    let data = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;

    let config = PackConfig { compress: !args.no_compress, external_tool: args.external_tool.clone() };

    log::info!("packing {}", input.display());
    let packed = pack(&data, CRT0_MULTIBOOT, CRT0_ROM, &config)?;

    std::fs::write(&output, packed).with_context(|| format!("writing {}", output.display()))?;
    log::info!("wrote {}", output.display());

    Ok(())
}
