// 100 Hz control loop
// The runtime task is the single owner of control state, the live frame and
// the radio. Consoles and the zenoh bridge only send it Requests, so nothing
// is shared across contexts and no lock is needed.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{info, warn};

// local imports
use crate::command;
use crate::config::{
    ConsoleKind, HEARTBEAT_TICKS, REQUEST_QUEUE_DEPTH, RadioConfig, RadioKind, RuntimeConfig,
    STATUS_PUBLISH_TICKS, TOPIC_CMD, TOPIC_REPLY, TOPIC_STATUS,
};
use crate::console;
use crate::messages::{Request, StatusReport};
use crate::radio::{RadioError, RadioTransport, SerialRadio, SimulatedRadio};
use crate::smoother::MotionSmoother;
use crate::state::ControlState;

pub struct Runtime {
    state: ControlState,
    smoother: MotionSmoother,
    radio: Box<dyn RadioTransport>,
}

impl Runtime {
    pub fn new(radio: Box<dyn RadioTransport>) -> Self {
        Self {
            state: ControlState::new(),
            smoother: MotionSmoother::new(),
            radio,
        }
    }

    /// Process one command line
    pub fn on_line(&mut self, line: &str) -> Option<String> {
        command::handle_line(line, &mut self.state, &mut self.smoother, self.radio.as_mut())
    }

    pub fn on_tick(&mut self) {
        self.smoother.tick(&mut self.state, self.radio.as_mut());
    }

    pub fn on_request(&mut self, request: Request) {
        // A dropped receiver means the session went away; nothing to do
        match request {
            Request::Line { line, reply } => {
                let _ = reply.send(self.on_line(&line));
            }
            Request::Banner { reply } => {
                let _ = reply.send(command::banner(self.state.destination));
            }
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn status(&self) -> StatusReport {
        StatusReport::from(&self.state)
    }

    pub fn ticks(&self) -> u32 {
        self.smoother.ticks()
    }
}

pub fn open_radio(config: &RadioConfig) -> Result<Box<dyn RadioTransport>, RadioError> {
    match config.kind {
        RadioKind::Serial => {
            info!("Opening radio on {} @ {} baud", config.port, config.baudrate);
            Ok(Box::new(SerialRadio::open(&config.port, config.baudrate)?))
        }
        RadioKind::Simulated => {
            warn!("Radio simulated, frames are logged at trace level only");
            Ok(Box::new(SimulatedRadio::new()))
        }
    }
}

pub async fn run(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.validate()?;

    let mut runtime = Runtime::new(open_radio(&config.radio)?);
    let (requests_tx, mut requests) = mpsc::channel::<Request>(REQUEST_QUEUE_DEPTH);

    match config.console.kind {
        ConsoleKind::Stdio => console::spawn_stdio(config.console.echo, requests_tx.clone())?,
        ConsoleKind::Serial => console::spawn_serial(
            &config.console.port,
            config.console.baudrate,
            config.console.echo,
            requests_tx.clone(),
        )?,
        ConsoleKind::Off => info!("Console disabled"),
    }

    // Session and status publisher live as long as the loop
    let zenoh_link = if config.zenoh {
        info!("Opening Zenoh session...");
        let session = zenoh::open(zenoh::Config::default()).await?;
        let subscriber = session.declare_subscriber(TOPIC_CMD).await?;
        let pub_reply = session.declare_publisher(TOPIC_REPLY).await?;
        let pub_status = session.declare_publisher(TOPIC_STATUS).await?;
        info!("Subscribed to: {}", TOPIC_CMD);
        info!("Publishing to: {}, {}", TOPIC_REPLY, TOPIC_STATUS);

        let bridge = requests_tx.clone();
        tokio::spawn(async move {
            while let Ok(sample) = subscriber.recv_async().await {
                let line = String::from_utf8_lossy(&sample.payload().to_bytes()).into_owned();
                let (reply, response) = oneshot::channel();
                if bridge.send(Request::Line { line, reply }).await.is_err() {
                    break;
                }
                if let Ok(Some(text)) = response.await {
                    if let Err(e) = pub_reply.put(text).await {
                        warn!("Failed to publish reply: {}", e);
                    }
                }
            }
        });
        Some((session, pub_status))
    } else {
        None
    };

    let mut tick = interval(Duration::from_micros(1_000_000 / config.loop_hz));
    info!(
        "Runtime started: {}Hz loop, heartbeat every {} ticks",
        config.loop_hz, HEARTBEAT_TICKS
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                runtime.on_tick();

                if let Some((_, pub_status)) = &zenoh_link {
                    if runtime.ticks() % STATUS_PUBLISH_TICKS == 0 {
                        let status_json = serde_json::to_string(&runtime.status())?;
                        if let Err(e) = pub_status.put(status_json).await {
                            warn!("Failed to publish status: {}", e);
                        }
                    }
                }
            }
            Some(request) = requests.recv() => runtime.on_request(request),
            _ = &mut shutdown => {
                info!("Interrupted, stopping after {} packets", runtime.state().packets_sent);
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::{Address, RecordingRadio};

    fn runtime() -> (Runtime, RecordingRadio) {
        let radio = RecordingRadio::new();
        (Runtime::new(Box::new(radio.clone())), radio)
    }

    #[test]
    fn test_pos_then_status_converges() {
        let (mut rt, _radio) = runtime();
        assert_eq!(rt.on_line("POS 500").as_deref(), Some("OK:POS=500\r\n"));

        for _ in 0..31 {
            rt.on_tick();
        }
        let status = rt.on_line("STATUS").unwrap();
        assert!(status.contains("Target=500, Current=500"), "{}", status);
    }

    #[test]
    fn test_dest_reaches_next_frame() {
        let (mut rt, radio) = runtime();
        rt.on_tick();
        assert_eq!(rt.on_line("DEST 18 52").as_deref(), Some("OK:DEST=1234\r\n"));
        radio.take();

        // Idle ticks until the next heartbeat
        for _ in 0..10 {
            rt.on_tick();
        }
        let frames = radio.take();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].destination(), Address::new(0x12, 0x34));
    }

    #[test]
    fn test_scan_between_ticks_keeps_live_frame() {
        let (mut rt, radio) = runtime();
        rt.on_line("POS 2148");
        rt.on_tick();
        rt.on_line("SCAN 1 2");
        rt.on_tick();

        let frames = radio.frames();
        assert_eq!(frames.len(), 12);
        let last = frames[11];
        assert_eq!(last.destination(), Address::BROADCAST);
        assert_eq!(last.position(), 2148 + 1); // odd tick jitter
        // One sequence space across live and scan frames
        let seqs: Vec<u8> = frames.iter().map(|f| f.sequence()).collect();
        assert_eq!(seqs, (0..12).collect::<Vec<u8>>());
        assert_eq!(rt.state().packets_sent, 12);
    }

    #[test]
    fn test_requests() {
        let (mut rt, _radio) = runtime();

        let (reply, mut response) = oneshot::channel();
        rt.on_request(Request::Line {
            line: "FOO".to_string(),
            reply,
        });
        assert_eq!(
            response.try_recv().unwrap().as_deref(),
            Some("ERROR: Unknown command 'FOO'\r\n")
        );

        let (reply, mut banner) = oneshot::channel();
        rt.on_request(Request::Banner { reply });
        assert!(banner.try_recv().unwrap().contains("Destination: FFFF"));
    }

    #[test]
    fn test_status_report() {
        let (mut rt, _radio) = runtime();
        rt.on_line("DEST 0 7");
        let report = rt.status();
        assert_eq!(report.destination, "0007");
        assert_eq!(report.message_count, 1);
    }
}
