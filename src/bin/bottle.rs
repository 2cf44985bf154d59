//! `bottle`: store and fetch blobs in memcached from the command line.
//!
//! # Usage
//!
//! ```text
//! bottle put report.pdf ./report.pdf      # store a file
//! cat data.bin | bottle put data.bin       # store stdin
//! bottle get report.pdf -o out.pdf         # fetch into a file
//! bottle get report.pdf > out.pdf          # fetch to stdout
//! bottle stats                             # cache counters
//! bottle flush                             # drop everything in the cache
//! ```
//!
//! Exit status: 0 on success, 2 for a bad key or bad arguments, 3 for a
//! missing blob, 4 for a key or content conflict, 5 for an oversize blob,
//! 6 when the cache is evicting, 7 for corrupt data, 8 when the cache is
//! unreachable, 1 for anything else.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use bottlecache::{
    BlobError, BlobStore, CacheConfig, ConfigError, DEFAULT_CACHE_HOST, DEFAULT_CACHE_PORT,
    MemcachedClient, StoreConfig,
};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "bottle",
    version,
    about = "Chunked blob storage in memcached"
)]
struct Cli {
    /// memcached host.
    #[arg(long, global = true, env = "CACHE_HOST", default_value = DEFAULT_CACHE_HOST)]
    host: String,

    /// memcached port.
    #[arg(long, global = true, env = "CACHE_PORT", default_value_t = DEFAULT_CACHE_PORT)]
    port: u16,

    /// Socket timeout in milliseconds.
    #[arg(long, global = true, env = "CACHE_TIMEOUT_MS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: Option<u64>,

    /// Chunk size in bytes.
    #[arg(long, global = true, env = "CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Largest blob accepted, in bytes.
    #[arg(long, global = true, env = "MAX_FILE_SIZE")]
    max_file_size: Option<u64>,

    /// Directory for staging streamed input.
    #[arg(long, global = true, env = "SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a blob.
    Put {
        /// Key to store the blob under.
        key: String,

        /// File to read; `-` or nothing reads stdin.
        file: Option<PathBuf>,
    },

    /// Fetch a blob.
    Get {
        /// Key of the blob.
        key: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the cache's counters.
    Stats,

    /// Drop every entry in the cache.
    Flush,
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("bottle: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn setup_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let store = open_store(&cli)?;

    match cli.command {
        Commands::Put { key, file } => {
            let key = match file {
                Some(path) if path.as_os_str() != "-" => {
                    let file = File::open(&path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    store.put_reader(&key, file)?
                }
                _ => store.put_reader(&key, io::stdin().lock())?,
            };
            println!("{key}");
        }
        Commands::Get { key, output } => {
            let data = store.get(&key)?;
            match output {
                Some(path) => std::fs::write(&path, &data)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
            }
            debug!(key = %key, size = data.len(), "fetched blob");
        }
        Commands::Stats => {
            let stats = store.stats()?;
            println!("evictions       {}", stats.evictions);
            println!("curr_items      {}", stats.curr_items);
            println!("bytes           {}", stats.bytes);
            println!("limit_maxbytes  {}", stats.limit_maxbytes);
        }
        Commands::Flush => store.flush()?,
    }

    Ok(())
}

fn open_store(cli: &Cli) -> Result<BlobStore<MemcachedClient>> {
    let mut cache = CacheConfig::new(cli.host.clone(), cli.port);
    if let Some(ms) = cli.timeout_ms {
        cache = cache.with_timeout(Duration::from_millis(ms));
    }

    let mut config = StoreConfig::default();
    if let Some(size) = cli.chunk_size {
        config = config.with_chunk_size(size);
    }
    if let Some(size) = cli.max_file_size {
        config = config.with_max_file_size(size);
    }
    if let Some(dir) = &cli.scratch_dir {
        config = config.with_scratch_dir(dir.clone());
    }

    debug!(addr = %cache.addr(), chunk_size = config.chunk_size(), "opening store");
    Ok(BlobStore::new(MemcachedClient::new(cache), config)?)
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<BlobError>() {
        Some(BlobError::InvalidKey { .. }) => 2,
        Some(BlobError::NoSuchKey { .. }) => 3,
        Some(BlobError::KeyExists { .. } | BlobError::FileCollision { .. }) => 4,
        Some(BlobError::FileTooLarge { .. }) => 5,
        Some(BlobError::CacheUnderEvictionPressure { .. }) => 6,
        Some(BlobError::CorruptData { .. }) => 7,
        Some(BlobError::CacheUnavailable(_)) => 8,
        Some(BlobError::Scratch(_)) | None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exit_codes() {
        let code = |e: BlobError| exit_code(&anyhow::Error::from(e));

        assert_eq!(code(BlobError::NoSuchKey { key: "k".into() }), 3);
        assert_eq!(code(BlobError::KeyExists { key: "k".into() }), 4);
        assert_eq!(code(BlobError::FileCollision { key: "k".into() }), 4);
        assert_eq!(code(BlobError::FileTooLarge { size: 2, max: 1 }), 5);
        assert_eq!(
            code(BlobError::CacheUnderEvictionPressure { evictions: 1 }),
            6
        );
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn test_put_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["bottle", "put", "doc"]).unwrap();
        assert!(matches!(cli.command, Commands::Put { file: None, .. }));
    }
}
