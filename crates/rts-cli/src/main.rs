use anyhow::{Context, Result};
use clap::Parser;
use rts_extract::emulator::{BridgeScript, ScriptedBridge};
use rts_extract::{
    ExtractorConfig, TreeExtractor, DEFAULT_INSPECT_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SETTLE_TIMEOUT_MS,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rts")]
#[command(about = "Replay a captured component tree through the render-tree extractor")]
struct Args {
    /// Bridge capture file (JSON) to replay
    capture: PathBuf,
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,
    #[arg(long, default_value_t = DEFAULT_SETTLE_TIMEOUT_MS)]
    settle_timeout_ms: u64,
    /// Per-inspection bound in milliseconds; 0 disables the bound
    #[arg(long, default_value_t = DEFAULT_INSPECT_TIMEOUT_MS)]
    inspect_timeout_ms: u64,
    #[arg(long, default_value_t = false)]
    pretty: bool,
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let raw = fs::read_to_string(&args.capture)
        .with_context(|| format!("reading capture file {}", args.capture.display()))?;
    let script: BridgeScript = serde_json::from_str(&raw).context("parsing capture file")?;
    let bridge = ScriptedBridge::new(script);

    let extractor = TreeExtractor::new(ExtractorConfig {
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        settle_timeout: Duration::from_millis(args.settle_timeout_ms),
        inspect_timeout: (args.inspect_timeout_ms > 0)
            .then(|| Duration::from_millis(args.inspect_timeout_ms)),
    });

    info!(event = "replay_start", capture = %args.capture.display());
    let tree = extractor
        .extract(&bridge)
        .await
        .context("extracting render tree")?;
    info!(event = "replay_complete", entries = tree.len());

    let output = if args.pretty {
        serde_json::to_string_pretty(&tree)?
    } else {
        serde_json::to_string(&tree)?
    };
    println!("{output}");
    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug {
        "debug".to_string()
    } else {
        std::env::var("RTS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
