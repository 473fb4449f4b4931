// Operator console: line assembly over a byte stream
//
// Each session runs on its own OS thread (blocking reads from stdin or a
// serial command port) and talks to the runtime only through Request
// messages. Output goes through a bounded queue drained by a writer thread;
// when the queue is full, output is dropped rather than stalling input.

use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{SyncSender, TrySendError, sync_channel};
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, trace, warn};

use crate::config::{MAX_LINE_LEN, TX_QUEUE_DEPTH};
use crate::messages::Request;

pub const PROMPT: &str = "> ";

const READ_CHUNK: usize = 64;
const SERIAL_READ_TIMEOUT_MS: u64 = 500;

/// Result of feeding one byte to the assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// Byte appended to the current line (echo it)
    Stored,
    /// Line full, byte discarded
    Dropped,
    /// Terminator with nothing buffered
    Blank,
    Line(String),
}

#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(MAX_LINE_LEN),
        }
    }

    pub fn push(&mut self, byte: u8) -> Feed {
        match byte {
            b'\n' | b'\r' => {
                if self.buf.is_empty() {
                    Feed::Blank
                } else {
                    let line = String::from_utf8_lossy(&self.buf).into_owned();
                    self.buf.clear();
                    Feed::Line(line)
                }
            }
            _ if self.buf.len() < MAX_LINE_LEN => {
                self.buf.push(byte);
                Feed::Stored
            }
            _ => Feed::Dropped,
        }
    }
}

/// Best-effort handle onto the output queue
#[derive(Clone)]
pub struct Outbox {
    tx: SyncSender<Vec<u8>>,
}

impl Outbox {
    /// Start the writer thread for `writer`
    pub fn spawn<W: Write + Send + 'static>(mut writer: W) -> std::io::Result<Self> {
        let (tx, rx) = sync_channel::<Vec<u8>>(TX_QUEUE_DEPTH);
        thread::Builder::new()
            .name("console-tx".into())
            .spawn(move || {
                for chunk in rx {
                    if let Err(e) = writer.write_all(&chunk).and_then(|_| writer.flush()) {
                        warn!("Console write failed: {}", e);
                        break;
                    }
                }
            })?;
        Ok(Self { tx })
    }

    pub fn send(&self, bytes: impl Into<Vec<u8>>) {
        match self.tx.try_send(bytes.into()) {
            Ok(()) => {}
            Err(TrySendError::Full(chunk)) => {
                trace!("Output queue full, dropped {} bytes", chunk.len())
            }
            Err(TrySendError::Disconnected(_)) => trace!("Console writer gone"),
        }
    }
}

/// Serve a session on the process stdin/stdout
pub fn spawn_stdio(echo: bool, requests: mpsc::Sender<Request>) -> std::io::Result<()> {
    let outbox = Outbox::spawn(std::io::stdout())?;
    thread::Builder::new()
        .name("console-rx".into())
        .spawn(move || run_session(std::io::stdin(), outbox, echo, requests))?;
    info!("Console on stdio (echo {})", if echo { "on" } else { "off" });
    Ok(())
}

/// Serve a session on a serial command port (e.g. a USB CDC-ACM gadget)
pub fn spawn_serial(
    port_name: &str,
    baudrate: u32,
    echo: bool,
    requests: mpsc::Sender<Request>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let reader = serialport::new(port_name, baudrate)
        .timeout(Duration::from_millis(SERIAL_READ_TIMEOUT_MS))
        .open()?;
    let writer = reader.try_clone()?;
    let outbox = Outbox::spawn(writer)?;
    thread::Builder::new()
        .name("console-rx".into())
        .spawn(move || run_session(reader, outbox, echo, requests))?;
    info!("Console on {} @ {} baud", port_name, baudrate);
    Ok(())
}

/// Read bytes until EOF or the runtime goes away
pub fn run_session<R: Read>(
    mut reader: R,
    outbox: Outbox,
    echo: bool,
    requests: mpsc::Sender<Request>,
) {
    let (reply, banner) = oneshot::channel();
    if requests.blocking_send(Request::Banner { reply }).is_err() {
        return;
    }
    if let Ok(text) = banner.blocking_recv() {
        outbox.send(text);
        outbox.send(PROMPT);
    }

    let mut assembler = LineAssembler::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => {
                info!("Console input closed");
                return;
            }
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => continue,
            Err(e) => {
                warn!("Console read failed: {}", e);
                return;
            }
        };

        for &byte in &chunk[..n] {
            match assembler.push(byte) {
                Feed::Stored if echo => outbox.send([byte]),
                Feed::Line(line) => {
                    if echo {
                        outbox.send("\r\n");
                    }
                    let Some(response) = dispatch(&requests, line) else {
                        return;
                    };
                    if let Some(text) = response {
                        outbox.send(text);
                    }
                    outbox.send(PROMPT);
                }
                _ => {}
            }
        }
    }
}

/// Hand a line to the runtime and wait for its answer. `None` once the runtime has stopped.
fn dispatch(requests: &mpsc::Sender<Request>, line: String) -> Option<Option<String>> {
    let (reply, response) = oneshot::channel();
    requests.blocking_send(Request::Line { line, reply }).ok()?;
    response.blocking_recv().ok()
}
