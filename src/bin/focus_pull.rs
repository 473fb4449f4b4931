// Keyboard focus pulling over zenoh: Up/Down coarse, Left/Right fine, C centre,
// S status, Q quit. `--demo` sweeps the lens, `--send` runs one command.
use std::io::Write;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tracing::{info, warn};

use nucleus_link_runtime::config::{
    POSITION_CENTER, POSITION_MAX, TOPIC_CMD, TOPIC_REPLY, TOPIC_STATUS,
};
use nucleus_link_runtime::messages::StatusReport;

const COARSE_STEP: i32 = 100;
const FINE_STEP: i32 = 10;
const POLL_MS: u64 = 20;
const REPLY_WAIT: Duration = Duration::from_secs(1);
const DEMO_DWELL: Duration = Duration::from_secs(2);

const DEMO_SEQUENCE: [(u16, &str); 6] = [
    (0, "Minimum position"),
    (1024, "Quarter position"),
    (2048, "Center position"),
    (3072, "Three-quarter position"),
    (4095, "Maximum position"),
    (2048, "Back to center"),
];

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(about = "Operator client for the focus link runtime")]
struct Args {
    /// Run the demo sweep and exit
    #[arg(long)]
    demo: bool,

    /// Send one command line, print the reply and exit
    #[arg(long, conflicts_with = "demo")]
    send: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD).await?;
    let replies = session.declare_subscriber(TOPIC_REPLY).await?;

    if let Some(line) = args.send {
        publisher.put(line).await?;
        match tokio::time::timeout(REPLY_WAIT, replies.recv_async()).await {
            Ok(Ok(sample)) => {
                print!("{}", String::from_utf8_lossy(&sample.payload().to_bytes()))
            }
            _ => warn!("No reply within {:?}", REPLY_WAIT),
        }
        return Ok(());
    }

    if args.demo {
        info!("Running motor demo sequence...");
        for (position, label) in DEMO_SEQUENCE {
            info!("{}...", label);
            publisher.put(format!("POS {}", position)).await?;
            tokio::time::sleep(DEMO_DWELL).await;
        }
        info!("Demo complete!");
        return Ok(());
    }

    // Start from wherever the runtime is aiming, if it is publishing status.
    // The subscriber is dropped right after; left undrained, its bounded
    // FIFO fills and blocks delivery on the reply topic too.
    let status = session.declare_subscriber(TOPIC_STATUS).await?;
    let target = match tokio::time::timeout(REPLY_WAIT, status.recv_async()).await {
        Ok(Ok(sample)) => initial_target(&sample.payload().to_bytes()),
        _ => {
            warn!("No status from runtime, starting at center");
            POSITION_CENTER
        }
    };
    drop(status);

    info!("Controls: Up/Down=coarse, Left/Right=fine, C=center, S=status, Q=quit");
    enable_raw_mode()?;
    let result = run_pull(&publisher, &replies, target).await;
    disable_raw_mode()?;

    result
}

type ReplySubscriber =
    zenoh::pubsub::Subscriber<zenoh::handlers::FifoChannelHandler<zenoh::sample::Sample>>;

async fn run_pull(
    publisher: &zenoh::pubsub::Publisher<'_>,
    replies: &ReplySubscriber,
    mut target: u16,
) -> Result<()> {
    let mut last_sent = target;
    let mut last_key = Instant::now();

    loop {
        if event::poll(Duration::from_millis(POLL_MS))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Up if pressed => target = nudge(target, COARSE_STEP),
                    KeyCode::Down if pressed => target = nudge(target, -COARSE_STEP),
                    KeyCode::Right if pressed => target = nudge(target, FINE_STEP),
                    KeyCode::Left if pressed => target = nudge(target, -FINE_STEP),
                    KeyCode::Char('c') if pressed => target = POSITION_CENTER,
                    KeyCode::Char('s') if pressed => publisher.put("STATUS").await?,
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,
                    _ => {}
                }
                last_key = Instant::now();
            }
        }

        // Coalesce key repeats: send once input settles for a poll period
        if last_sent != target && last_key.elapsed() >= Duration::from_millis(POLL_MS) {
            publisher.put(format!("POS {}", target)).await?;
            last_sent = target;
        }

        while let Ok(Some(sample)) = replies.try_recv() {
            let text = String::from_utf8_lossy(&sample.payload().to_bytes()).into_owned();
            print!("{}", text);
            std::io::stdout().flush()?;
        }
    }

    Ok(())
}

/// Target from a status payload, centre if it does not parse
fn initial_target(payload: &[u8]) -> u16 {
    serde_json::from_slice::<StatusReport>(payload)
        .map(|s| s.target_position.min(POSITION_MAX))
        .unwrap_or(POSITION_CENTER)
}

fn nudge(position: u16, delta: i32) -> u16 {
    (position as i32 + delta).clamp(0, POSITION_MAX as i32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nudge_clamps() {
        assert_eq!(nudge(2048, COARSE_STEP), 2148);
        assert_eq!(nudge(50, -COARSE_STEP), 0);
        assert_eq!(nudge(4090, FINE_STEP), 4095);
    }

    #[test]
    fn test_demo_stays_in_range() {
        assert!(DEMO_SEQUENCE.iter().all(|(p, _)| *p <= POSITION_MAX));
        assert_eq!(DEMO_SEQUENCE.last().map(|(p, _)| *p), Some(POSITION_CENTER));
    }

    #[test]
    fn test_initial_target_from_status() {
        let report = StatusReport {
            target_position: 500,
            current_position: 2048,
            destination: "FFFF".to_string(),
            packets_sent: 3,
            message_count: 1,
        };
        let payload = serde_json::to_vec(&report).unwrap();
        assert_eq!(initial_target(&payload), 500);
        assert_eq!(initial_target(b"not json"), POSITION_CENTER);
        assert_eq!(initial_target(b""), POSITION_CENTER);
    }
}
