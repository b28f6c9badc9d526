use clap::Parser;
use memsim::config::{
    DEFAULT_BLOCK_SIZE, DEFAULT_CYCLES, DEFAULT_LATENCY_RAM,
    DEFAULT_LATENCY_ROM, DEFAULT_ROM_SIZE, SimConfig,
};
use memsim::parse::{self, LoadError};
use memsim::sim::SimError;
use memsim::system::{MemorySystem, RunStatus, SetupError, SimResult};
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

//===========================================================================//

#[derive(Parser)]
#[clap(author, about, long_about = None, version)]
struct Cli {
    /// The maximum number of clock cycles to simulate.
    #[clap(
        long,
        default_value_t = DEFAULT_CYCLES,
        value_parser = wide_number
    )]
    cycles: u64,
    /// Writes a VCD waveform trace to this path (".vcd" is appended if
    /// missing).
    #[clap(long)]
    tf: Option<PathBuf>,
    /// The ROM latency, in clock cycles.
    #[clap(
        long,
        default_value_t = DEFAULT_LATENCY_ROM,
        value_parser = number
    )]
    latency_rom: u32,
    /// The main memory latency, in clock cycles.
    #[clap(
        long,
        default_value_t = DEFAULT_LATENCY_RAM,
        value_parser = number
    )]
    latency_ram: u32,
    /// The ROM size in bytes; main memory starts right after it.
    #[clap(
        long,
        default_value_t = DEFAULT_ROM_SIZE,
        value_parser = number
    )]
    rom_size: u32,
    /// The size of one ownership block of main memory, in bytes.
    #[clap(
        long,
        default_value_t = DEFAULT_BLOCK_SIZE,
        value_parser = number
    )]
    block_size: u32,
    /// A file with the initial ROM contents, one word per line.
    #[clap(long)]
    rom_content: Option<PathBuf>,
    /// The CSV file of requests to simulate.
    requests: PathBuf,
}

impl Cli {
    fn config(&self) -> SimConfig {
        SimConfig {
            cycles: self.cycles,
            latency_rom: self.latency_rom,
            latency_ram: self.latency_ram,
            rom_size: self.rom_size,
            block_size: self.block_size,
        }
    }
}

fn number(text: &str) -> Result<u32, String> {
    parse::parse_int_literal(text).map_err(|error| error.message)
}

fn wide_number(text: &str) -> Result<u64, String> {
    parse::parse_u64_literal(text).map_err(|error| error.message)
}

//===========================================================================//

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("cannot create trace file {}: {source}", path.display())]
    Trace { path: PathBuf, source: io::Error },
}

fn trace_path(path: &Path) -> PathBuf {
    if path.extension() == Some(OsStr::new("vcd")) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".vcd");
        PathBuf::from(name)
    }
}

fn simulate(cli: &Cli, config: &SimConfig) -> Result<SimResult, RunError> {
    let rom_words = match &cli.rom_content {
        Some(path) => parse::load_rom_content(path, config.rom_size)?,
        None => Vec::new(),
    };
    let requests = parse::load_requests(&cli.requests)?;
    log::info!("loaded {} requests", requests.len());
    let mut system = MemorySystem::new(config, &rom_words)?;
    log::info!("simulating {}", system.description());
    if let Some(path) = &cli.tf {
        let path = trace_path(path);
        let file = match File::create(&path) {
            Ok(file) => file,
            Err(source) => return Err(RunError::Trace { path, source }),
        };
        log::info!("tracing to {}", path.display());
        system.trace_to(Box::new(BufWriter::new(file)));
    }
    let result = system.run(&requests, config.cycles)?;
    system.finish_trace()?;
    Ok(result)
}

//===========================================================================//

fn main() -> ExitCode {
    let env = env_logger::Env::default().default_filter_or("warn");
    env_logger::Builder::from_env(env).init();
    let cli = Cli::parse();
    let config = cli.config();
    if let Err(error) = config.validate() {
        eprintln!("error: {error}");
        return ExitCode::from(2);
    }
    if cli.requests.extension() != Some(OsStr::new("csv")) {
        eprintln!(
            "error: request file {} must have a .csv extension",
            cli.requests.display()
        );
        return ExitCode::from(2);
    }
    match simulate(&cli, &config) {
        Ok(result) => {
            println!("--- Simulation Finished ---");
            println!("Cycles: {}", result.cycles);
            println!("Errors: {}", result.errors);
            if result.status == RunStatus::CycleDeficit {
                println!("Status: cycle deficit");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

//===========================================================================//


//===========================================================================//
