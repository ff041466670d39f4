//! Binary entrypoint for the rfidgate CLI.
//!
//! Commands:
//! - `start [--port <path>]` - run the gateway, optionally attached to a reader on a serial port
//! - `init` - create a starter `config.toml`
//! - `status` - print a configuration summary and the persisted delivery backlog
//! - `decode <file>` - decode a hex capture offline and print frames and tags as JSON lines
//!
//! See the library crate docs for module-level details: `rfidgate::`.
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use rfidgate::clock::SystemClock;
use rfidgate::config::Config;
use rfidgate::gateway::Gateway;
use rfidgate::logutil::{hex_snippet, parse_hex};
use rfidgate::protocol::{DecodeLimits, Decoded, FrameStream, ScannerTuning};
use rfidgate::server::{spawn_stdin_commands, GatewayServer};
use rfidgate::storage::{get_u64, KvStore, MemoryStore, SledStore};
use rfidgate::transport::console::ConsolePublisher;
use rfidgate::transport::{ByteSource, Link, NoLink};

#[derive(Parser)]
#[command(name = "rfidgate")]
#[command(about = "Gateway between a UHF RFID reader and a message broker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Start {
        /// Reader serial port (e.g., /dev/ttyUSB0); overrides the configured port
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Show configuration summary and persisted backlog
    Status,
    /// Decode a hex capture of reader traffic
    Decode {
        /// File containing hex bytes (whitespace and 0x prefixes allowed)
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { port } => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting rfidgate v{}", env!("CARGO_PKG_VERSION"));

            let chosen_port = port.or_else(|| {
                let configured = config.reader.port.clone();
                (!configured.is_empty()).then_some(configured)
            });
            let (link, source) = match chosen_port {
                Some(port_path) => match open_reader(&port_path, config.reader.baud_rate) {
                    Ok(pair) => {
                        info!("Connected to reader on {}", port_path);
                        pair
                    }
                    Err(e) => {
                        warn!(
                            "Failed to open reader on {}: {} (gateway continuing without reader)",
                            port_path, e
                        );
                        (Arc::new(NoLink) as Arc<dyn Link>, None)
                    }
                },
                None => {
                    info!("No --port specified and no configured reader port; starting without reader.");
                    (Arc::new(NoLink) as Arc<dyn Link>, None)
                }
            };

            let kv = open_store(&config);
            let gateway = Arc::new(Gateway::new(
                &config,
                link,
                Arc::new(ConsolePublisher::new()),
                kv,
                Arc::new(SystemClock::new()),
            ));
            let server = GatewayServer::new(config, gateway);
            spawn_stdin_commands(server.handle());
            info!("Gateway starting...");
            server.run(source).await?;
        }
        Commands::Init => {
            info!("Initializing new gateway configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            let backlog = match SledStore::open(config.storage.kv_path()) {
                Ok(store) => get_u64(&store, "buf_count").ok().flatten(),
                Err(e) => {
                    warn!("Cannot open storage (is the gateway running?): {}", e);
                    None
                }
            };
            let summary = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "client_id": config.broker.client_id,
                "reader_port": config.reader.port,
                "baud_rate": config.reader.baud_rate,
                "data_dir": config.storage.data_dir,
                "queue_capacity": config.queue.capacity,
                "persist_capacity": config.queue.persist_capacity,
                "persisted_backlog": backlog,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Decode { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| anyhow!("Failed to read capture {}: {}", file, e))?;
            let bytes =
                parse_hex(&text).ok_or_else(|| anyhow!("{} is not a valid hex capture", file))?;
            let (limits, tuning) = pre_config
                .as_ref()
                .map(|c| (c.decode_limits(), c.scanner_tuning()))
                .unwrap_or_default();
            for line in decode_capture(&bytes, limits, tuning) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

fn decoded_json(item: &Decoded) -> serde_json::Value {
    match item {
        Decoded::Frame(f) => serde_json::json!({
            "frame": {
                "category": f.category,
                "message_id": f.message_id,
                "flags": f.flags,
                "length": f.payload.len(),
                "payload": hex_snippet(&f.payload, f.payload.len()),
            }
        }),
        Decoded::Heuristic(t) => serde_json::json!({
            "tag": { "epc": t.epc, "rssi": t.rssi, "ant": t.antenna }
        }),
    }
}

/// Decode a whole capture: bounded passes until the stream stops yielding, then a
/// strict drain of whatever is left buffered.
fn decode_capture(
    bytes: &[u8],
    limits: DecodeLimits,
    tuning: ScannerTuning,
) -> Vec<serde_json::Value> {
    let mut stream = FrameStream::with_tuning(tuning);
    let mut out = Vec::new();
    let mut items = stream.decode_chunk(bytes, limits);
    while !items.is_empty() {
        out.extend(items.iter().map(decoded_json));
        items = stream.decode_chunk(&[], limits);
    }
    out.extend(stream.finish(limits).iter().map(decoded_json));
    out
}

type ReaderPair = (Arc<dyn Link>, Option<Box<dyn ByteSource>>);

#[cfg(feature = "serial")]
fn open_reader(port: &str, baud: u32) -> Result<ReaderPair> {
    let (link, reader) = rfidgate::transport::serial::open(port, baud)?;
    let link: Arc<dyn Link> = Arc::new(link);
    let source: Box<dyn ByteSource> = Box::new(reader);
    Ok((link, Some(source)))
}

#[cfg(not(feature = "serial"))]
fn open_reader(port: &str, _baud: u32) -> Result<ReaderPair> {
    Err(anyhow!(
        "serial support not compiled in (port {}); rebuild with --features serial",
        port
    ))
}

/// Sled under the data directory, or an in-memory store when that fails so the
/// gateway still runs (without restart persistence).
fn open_store(config: &Config) -> Arc<dyn KvStore> {
    let path = config.storage.kv_path();
    match SledStore::open(&path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                "Failed to open storage at {}: {} (delivery queue will not survive restarts)",
                path.display(),
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.clone())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });
    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Mirror to the console only in the foreground
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
