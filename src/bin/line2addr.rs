//! CLI front end: resolves a `file:line` pair to an address in a DWARF
//! v2/v3 executable, or dumps the whole decoded graph.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use thyrion::{Dwarf, Elf};

/// Maps a source (file, line) to a machine address using DWARF debug info.
#[derive(Parser, Debug)]
#[command(name = "line2addr", version, about)]
struct Args {
    /// `file:line`, e.g. `main.c:42`
    location: String,

    /// The ELF executable or object file to read debug info from
    executable: PathBuf,

    /// Dump the whole decoded graph instead of performing a lookup
    #[arg(long)]
    dump: bool,

    /// Raise logging verbosity (repeatable: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn parse_location(location: &str) -> Option<(&str, u32)> {
    let (file, line) = location.rsplit_once(':')?;
    let line = line.parse().ok()?;
    Some((file, line))
}

fn run(args: &Args) -> Result<Option<u64>, thyrion::DwarfError> {
    let elf = Elf::open(&args.executable)?;
    let dwarf = Dwarf::open(&elf)?;

    if args.dump {
        print!("{dwarf}");
        return Ok(None);
    }

    let Some((file, line)) = parse_location(&args.location) else {
        eprintln!("usage: line2addr <file>:<line> <executable>");
        std::process::exit(2);
    };
    Ok(dwarf.find_address(file, line))
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(level_for(args.verbose))
        .init();

    match run(&args) {
        Ok(Some(address)) => {
            println!("0x{address:08x}");
            ExitCode::SUCCESS
        }
        Ok(None) if args.dump => ExitCode::SUCCESS,
        Ok(None) => {
            eprintln!("Address not found");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
