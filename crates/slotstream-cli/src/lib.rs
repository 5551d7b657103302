//! Command-line front end for chunked resource streaming.
//!
//! The `slotstream` binary is a thin wrapper around these commands. A
//! directory store stands in for the resource section of an executable.
//!
//! # Commands
//!
//! - `pack`: stream a file through a producer thread into resource slots
//! - `unpack`: reassemble the logical stream into a file
//! - `inspect`: print the run identifier and chunk table

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use slotstream_resources::{
    ChunkConfig, ChunkError, ChunkReader, ChunkWriter, DirectoryStore, PackSummary,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(
    name = "slotstream",
    about = "Pack a stream into named resource slots and read it back",
    version
)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pack a file into a resource store
    Pack(PackArgs),
    /// Reassemble the stored stream into a file
    Unpack(UnpackArgs),
    /// Show the run identifier and chunk table of a store
    Inspect(InspectArgs),
}

/// Arguments of `pack`
#[derive(Debug, Args)]
pub struct PackArgs {
    /// File to pack
    #[arg(long)]
    pub input: PathBuf,

    /// Store directory, created if missing; a previous run in it is replaced
    #[arg(long, env = "SLOTSTREAM_STORE")]
    pub store: PathBuf,

    /// JSON chunk configuration
    #[arg(long, env = "SLOTSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bytes per slot, header included
    #[arg(long)]
    pub split_size: Option<usize>,

    /// Largest stream the slot budget must hold
    #[arg(long)]
    pub max_total_size: Option<u64>,

    /// Write one empty placeholder instead of filling every unused slot
    #[arg(long)]
    pub single_placeholder: bool,
}

/// Arguments of `unpack`
#[derive(Debug, Args)]
pub struct UnpackArgs {
    /// Store directory
    #[arg(long, env = "SLOTSTREAM_STORE")]
    pub store: PathBuf,

    /// Output file
    #[arg(long)]
    pub output: PathBuf,
}

/// Arguments of `inspect`
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Store directory
    #[arg(long, env = "SLOTSTREAM_STORE")]
    pub store: PathBuf,
}

impl PackArgs {
    /// Configuration file, if any, with command-line overrides applied
    pub fn chunk_config(&self) -> Result<ChunkConfig> {
        let mut config = match &self.config {
            Some(path) => ChunkConfig::from_json_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ChunkConfig::default(),
        };
        if let Some(split_size) = self.split_size {
            config = config.with_split_size(split_size);
        }
        if let Some(max_total_size) = self.max_total_size {
            config = config.with_max_total_size(max_total_size);
        }
        if self.single_placeholder {
            config = config.with_fill_placeholders(false);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run a parsed command, writing reports to `out`
pub fn run<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    match cli.command {
        Command::Pack(args) => {
            let summary = pack(&args)?;
            writeln!(
                out,
                "packed {} bytes into {} chunks ({} slots), run {}",
                summary.payload_bytes, summary.chunks, summary.slots_written, summary.run_id
            )?;
        }
        Command::Unpack(args) => {
            let bytes = unpack(&args.store, &args.output)?;
            writeln!(out, "wrote {} bytes to {}", bytes, args.output.display())?;
        }
        Command::Inspect(args) => inspect(&args.store, out)?,
    }
    Ok(())
}

/// Pack `args.input` into `args.store`
pub fn pack(args: &PackArgs) -> Result<PackSummary> {
    let config = args.chunk_config()?;
    let input = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let metadata = input
        .metadata()
        .with_context(|| format!("failed to stat {}", args.input.display()))?;
    if metadata.is_file() && metadata.len() > config.max_total_size {
        return Err(ChunkError::BudgetExceeded {
            max_slots: config.max_slots(),
            payload_size: config.payload_size(),
        })
        .with_context(|| {
            format!(
                "{} holds {} bytes, more than the {} byte budget",
                args.input.display(),
                metadata.len(),
                config.max_total_size
            )
        });
    }

    let mut store = DirectoryStore::create(&args.store)
        .with_context(|| format!("failed to create store {}", args.store.display()))?;
    store
        .clear_run()
        .with_context(|| format!("failed to clear store {}", args.store.display()))?;

    info!(
        "packing {} into {} ({} byte slots)",
        args.input.display(),
        args.store.display(),
        config.split_size
    );
    let summary = ChunkWriter::new(config)?.pack(&mut store, move |sink| {
        let mut input = input;
        io::copy(&mut input, sink)?;
        Ok(())
    })?;
    Ok(summary)
}

/// Reassemble the stream in `store` into `output`, returning its length
pub fn unpack(store: &Path, output: &Path) -> Result<u64> {
    let store = DirectoryStore::open(store)
        .with_context(|| format!("failed to open store {}", store.display()))?;
    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let mut writer = BufWriter::new(file);
    let bytes = ChunkReader::new(Arc::new(store)).copy_to(&mut writer)?;
    writer.flush()?;
    info!("unpacked {} bytes to {}", bytes, output.display());
    Ok(bytes)
}

/// Print the run identifier and chunk table of `store`
pub fn inspect<W: Write>(store: &Path, out: &mut W) -> Result<()> {
    let store = DirectoryStore::open(store)
        .with_context(|| format!("failed to open store {}", store.display()))?;
    let reader = ChunkReader::new(Arc::new(store));

    let run_id = reader.run_id()?;
    let entries = reader.discover()?;
    let total: u64 = entries.iter().map(|entry| entry.payload_len).sum();

    writeln!(out, "run:    {run_id}")?;
    writeln!(out, "chunks: {}", entries.len())?;
    writeln!(out, "bytes:  {total}")?;
    for entry in &entries {
        writeln!(
            out,
            "{:>6}/{:<6} {:>10}  {}",
            entry.split_id, entry.number_of_splits, entry.payload_len, entry.name
        )?;
    }
    Ok(())
}
