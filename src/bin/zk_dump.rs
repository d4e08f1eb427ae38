//! `zk-dump`: print the ZooKeeper conversation seen on an interface or found
//! in a pcap capture.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use zktraffic::{Sniffer, SnifferConfig};

#[derive(Debug, Parser)]
#[command(
    name = "zk-dump",
    version,
    about = "Decode ZooKeeper requests and replies from a live interface or a pcap capture"
)]
struct Args {
    /// Capture file in legacy pcap format. Overrides `capture_file` from the
    /// configuration.
    #[arg(conflicts_with = "iface")]
    capture: Option<PathBuf>,

    /// Network interface to sniff (requires the `live` feature).
    #[arg(short, long)]
    iface: Option<String>,

    /// BPF filter for live capture. Defaults to `port <PORT>`.
    #[arg(short, long)]
    filter: Option<String>,

    /// ZooKeeper client port.
    #[arg(short, long)]
    port: Option<u16>,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print one JSON object per line instead of the multi-line form.
    #[arg(long)]
    json: bool,

    /// Cap on requests awaiting a reply.
    #[arg(long)]
    max_outstanding: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG`
    /// takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}

fn build_config(args: &Args) -> Result<SnifferConfig, zktraffic::ConfigError> {
    let mut config = match &args.config {
        Some(path) => SnifferConfig::load(path)?,
        None => SnifferConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(limit) = args.max_outstanding {
        config.max_outstanding_requests = Some(limit);
    }
    if let Some(capture) = &args.capture {
        config.capture_file = Some(capture.clone());
        config.interface = None;
    }
    if let Some(iface) = &args.iface {
        config.interface = Some(iface.clone());
        config.capture_file = None;
    }
    if let Some(filter) = &args.filter {
        config.filter = Some(filter.clone());
    }
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let sniffer = Sniffer::new(config);
    if let Err(e) = sniffer.run() {
        error!(error = %e, "cannot start capture");
        return ExitCode::FAILURE;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    while let Some(msg) = sniffer.get_next_message() {
        let written = if args.json {
            match msg.to_json() {
                Ok(line) => writeln!(out, "{line}"),
                Err(e) => {
                    error!(error = %e, xid = msg.xid(), "failed to serialize message");
                    continue;
                }
            }
        } else {
            writeln!(out, "{msg}")
        };
        if written.is_err() {
            // Reader went away (e.g. piped into `head`).
            break;
        }
    }

    sniffer.stop();
    let stats = sniffer.stats();
    info!(
        frames = stats.frames,
        client_messages = stats.client_messages,
        server_messages = stats.server_messages,
        undecoded = stats.undecoded_frames,
        rejected = stats.rejected_records,
        "capture finished"
    );
    ExitCode::SUCCESS
}
