use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nucleus_link_runtime::config::{ConsoleKind, RadioKind, RuntimeConfig};

/// Focus motor link runtime: smooths POS commands into radio frames at a fixed rate
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port of the radio dongle
    #[arg(long)]
    radio_port: Option<String>,

    #[arg(long)]
    radio_baud: Option<u32>,

    /// Run without radio hardware
    #[arg(long)]
    simulate: bool,

    /// Where operator commands come from
    #[arg(long, value_enum)]
    console: Option<ConsoleArg>,

    /// Serial command port, used with --console serial
    #[arg(long)]
    command_port: Option<String>,

    /// Echo typed characters back to the console
    #[arg(long, conflicts_with = "no_echo")]
    echo: bool,

    #[arg(long)]
    no_echo: bool,

    /// Also accept commands and publish status over zenoh
    #[arg(long)]
    zenoh: bool,

    #[arg(long)]
    loop_hz: Option<u64>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ConsoleArg {
    Stdio,
    Serial,
    Off,
}

impl Args {
    fn apply(self, mut config: RuntimeConfig) -> RuntimeConfig {
        if let Some(port) = self.radio_port {
            config.radio.port = port;
        }
        if let Some(baud) = self.radio_baud {
            config.radio.baudrate = baud;
        }
        if self.simulate {
            config.radio.kind = RadioKind::Simulated;
        }
        if let Some(console) = self.console {
            config.console.kind = match console {
                ConsoleArg::Stdio => ConsoleKind::Stdio,
                ConsoleArg::Serial => ConsoleKind::Serial,
                ConsoleArg::Off => ConsoleKind::Off,
            };
        }
        if let Some(port) = self.command_port {
            config.console.port = port;
        }
        if self.echo {
            config.console.echo = true;
        }
        if self.no_echo {
            config.console.echo = false;
        }
        if self.zenoh {
            config.zenoh = true;
        }
        if let Some(hz) = self.loop_hz {
            config.loop_hz = hz;
        }
        config
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=debug or trace); stdout is reserved for the console
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let base = match &args.config {
        Some(path) => match RuntimeConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        None => RuntimeConfig::default(),
    };
    let config = args.apply(base);
    info!("Configuration: {:?}", config);

    if let Err(e) = nucleus_link_runtime::runtime::run(config).await {
        error!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
