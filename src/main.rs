use atlaskit::decoder::{decode_with, inspect, DecodeOptions};
use atlaskit::observer::TracingObserver;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "atlaskit", about = "Atlas Steam Workshop .z archive decoder")]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a .z archive into a single file
    Unpack {
        source:      PathBuf,
        destination: PathBuf,
        /// Fail instead of replacing an existing destination
        #[arg(long)]
        no_clobber: bool,
    },
    /// Show the archive header and chunk index
    Info {
        source: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { source, destination, no_clobber } => {
            let opts = DecodeOptions { overwrite: !no_clobber };
            let summary = decode_with(&source, &destination, &opts, &mut TracingObserver)?;
            println!("Unpacked {} chunk(s), {} B -> {}",
                summary.chunk_count, summary.bytes_written, destination.display());
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { source, json } => {
            let info = inspect(&source)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
                return Ok(());
            }

            println!("── Atlas .z archive ─────────────────────────────────────");
            println!("  Path             {}", source.display());
            println!("  Signature        {}", info.header.signature_version);
            println!("  Chunk unit size  {} B", info.header.chunk_unit_size);
            println!("  Packed size      {} B", info.header.packed_size);
            println!("  Unpacked size    {} B", info.header.unpacked_size);
            println!("  Chunks           {}", info.chunk_count);
            println!("  Indexed packed   {} B", info.total_compressed);
            println!("  Data offset      {}", info.data_offset);
            println!("{:>8} {:>14} {:>14}", "Chunk", "Compressed", "Uncompressed");
            for (i, e) in info.entries.iter().enumerate() {
                println!("{:>8} {:>14} {:>14}", i, e.compressed_size, e.uncompressed_size);
            }
        }
    }

    Ok(())
}
