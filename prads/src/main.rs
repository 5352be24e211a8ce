use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use prads_lib::capture::{self, VecSource};
use prads_lib::config::{self, Config};
use prads_lib::persist::NullPersistence;
use prads_lib::sig::Database;

/// Passive Real-time Asset Detection System.
#[derive(Parser, Debug)]
#[command(author, version, about = "Passive Real-time Asset Detection System")]
struct Cli {
    /// Capture device / interface.
    #[arg(short = 'd', long = "dev", visible_alias = "iface")]
    iface: Option<String>,

    /// Path to the config file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Directory holding config/signature files (prefixes relative paths).
    #[arg(long = "confdir")]
    confdir: Option<PathBuf>,

    /// Service signature file.
    #[arg(short = 's', long = "service-signatures")]
    service_signatures: Option<PathBuf>,

    /// OS fingerprint file (SYN signatures).
    #[arg(short = 'o', long = "os-fingerprints")]
    os_fingerprints: Option<PathBuf>,

    /// Debug verbosity level.
    #[arg(long = "debug", value_name = "N")]
    debug: Option<u8>,

    /// Verbose logging (equivalent to RUST_LOG=debug).
    #[arg(long = "verbose")]
    verbose: bool,

    /// Load all signature databases, print them, and exit.
    #[arg(long = "dump")]
    dump: bool,

    /// Dump the current asset database and exit.
    #[arg(long = "dumpdb")]
    dumpdb: bool,

    /// Run as a daemon.
    #[arg(long = "daemon")]
    daemon: bool,

    /// Enable/disable ARP fingerprinting.
    #[arg(long = "arp")]
    arp: bool,

    /// Enable/disable TCP service fingerprinting.
    #[arg(long = "service-tcp")]
    service_tcp: bool,

    /// Enable/disable UDP service fingerprinting.
    #[arg(long = "service-udp")]
    service_udp: bool,

    /// Enable/disable OS fingerprinting overall.
    #[arg(long = "os")]
    os: bool,

    /// Database connection string.
    #[arg(long = "db")]
    db: Option<String>,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_target(false)
        .init();
}

/// CLI flags override config-file values (spec.md §6).
fn apply_cli_overrides(mut cfg: Config, cli: &Cli) -> Config {
    if let Some(iface) = &cli.iface {
        cfg.interface = iface.clone();
    }
    if let Some(sig) = &cli.service_signatures {
        cfg.sig_file_serv_tcp = sig.display().to_string();
    }
    if let Some(os) = &cli.os_fingerprints {
        cfg.sig_file_syn = os.display().to_string();
    }
    if cli.daemon {
        cfg.daemon = true;
    }
    if cli.arp {
        cfg.arp = true;
    }
    if cli.service_tcp {
        cfg.service_tcp = true;
    }
    if cli.service_udp {
        cfg.service_udp = true;
    }
    if cli.os {
        cfg.os_syn_fingerprint = true;
    }
    if let Some(db) = &cli.db {
        cfg.db = Some(db.clone());
    }
    cfg
}

fn run() -> prads_lib::error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose || cli.debug.unwrap_or(0) > 0);

    let cfg = match &cli.config {
        Some(path) => config::load_from_path(path)?,
        None => Config::default(),
    };
    let cfg = apply_cli_overrides(cfg, &cli);

    let db = Database::load_all(&cfg)?;

    if cli.dump {
        print!("{}", db.dump());
        return Ok(());
    }

    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "prads".to_string());
    // A real pcap-backed CaptureSource is the out-of-scope external
    // collaborator spec.md §1 names; until one is wired in, an empty
    // VecSource lets the loop's signal/flush/shutdown machinery run.
    let source = VecSource::new(Vec::new());
    let persistence = NullPersistence::disabled();
    capture::run(&db, &cfg, source, persistence, &hostname)?;

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error during startup");
            ExitCode::FAILURE
        }
    }
}
