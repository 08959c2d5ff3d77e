//! Background thread that owns the serial port, drives the protocol
//! driver, and feeds buffered work into the device's motion buffer as
//! space frees up.
//!
//! Grounded directly on `worker_thread.py::worker_loop` and `queue_taker`.

use std::io::Write;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, warn};
use trapline_core::{DriverConfig, ProtocolDriver};
use trapline_proto::messages::{CodecTable, MessageTag, PeripheralStatus, Status, StatusFlag, SystemDescription};
use trapline_proto::{FramedParser, Handshake, Message, ProtocolError};

use crate::error::ClientError;
use crate::event::Event;

/// One entry from [`crate::client::Connection::send_buffered`]: the records
/// to transmit plus the `start`/`done` flags the caller requested for this
/// batch.
pub struct BufferedBatch {
    /// Messages to transmit, in order.
    pub records: Vec<Message>,
    /// Whether the caller wants a `Start` emitted once this batch lands.
    pub start: bool,
    /// Whether the caller wants a `Done` emitted once this batch lands.
    pub done: bool,
}

/// Shared state between the worker thread and the client facade.
#[derive(Default)]
pub struct Signals {
    /// Set once the handshake completes and the worker enters its main loop.
    pub initialized: Event,
    /// Set by the facade to request a clean worker shutdown.
    pub die: Event,
    /// Set whenever the device reports `Busy` or `Homing`.
    pub busy: Event,
    /// Set whenever the device reports anything other than `Busy`/`Homing`.
    pub idle: Event,
    /// The most recently received `Status`.
    pub status: Mutex<Option<Status>>,
    /// The most recently received `PeripheralStatus`.
    pub peripheral: Mutex<Option<PeripheralStatus>>,
}

/// Tuning knobs for opening and running a connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    pub path: String,
    /// Baud rate to open the port at.
    pub baud_rate: u32,
    /// How long to wait for the handshake's `Describe` reply.
    pub handshake_timeout: Duration,
    /// Read buffer size for the worker's nonblocking polls.
    pub read_chunk_size: usize,
}

impl ClientConfig {
    /// A config for `path` with the driver's usual defaults.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: 115_200,
            handshake_timeout: Duration::from_secs(1),
            read_chunk_size: 1024,
        }
    }
}

/// Pulls up to `n` records at a time out of the buffered-work queue,
/// coalescing the `start`/`done` flags of however many batches it had to
/// drain to do so.
///
/// Grounded on `worker_thread.py::queue_taker`: `done` is only reported true
/// once the queue is fully drained *and* the batch that emptied it itself
/// carried `done`; `start` is one-shot, reported and cleared only once a
/// full request is satisfied — a request that runs the queue dry first
/// keeps carrying `start` forward into the next call.
#[derive(Default)]
struct QueueTaker {
    pending: Option<BufferedBatch>,
    start: bool,
    done: bool,
}

impl QueueTaker {
    fn take(&mut self, queue: &Receiver<BufferedBatch>, mut n: usize) -> (Vec<Message>, bool, bool) {
        let mut out = Vec::new();
        while n > 0 {
            if self.pending.is_none() {
                match queue.try_recv() {
                    Ok(batch) => {
                        self.done |= batch.done;
                        self.start |= batch.start;
                        self.pending = Some(batch);
                    }
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                        let done = self.done;
                        self.done = false;
                        return (out, self.start, done);
                    }
                }
            }
            let Some(batch) = self.pending.as_mut() else {
                unreachable!("just populated above")
            };
            if batch.records.len() > n {
                out.extend(batch.records.drain(0..n));
                n = 0;
            } else {
                n -= batch.records.len();
                out.extend(batch.records.drain(..));
                self.pending = None;
            }
        }
        let start = self.start;
        self.start = false;
        (out, start, self.done && self.pending.is_none())
    }
}

fn read_exact_with_timeout(
    port: &mut dyn SerialPort,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<(), ClientError> {
    let deadline = Instant::now() + timeout;
    let mut filled = 0;
    while filled < buf.len() {
        if Instant::now() >= deadline {
            return Err(ClientError::HandshakeTimeout);
        }
        match port.read(&mut buf[filled..]) {
            Ok(0) => return Err(ClientError::HandshakeTimeout),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(ClientError::HandshakeTimeout),
            Err(e) => return Err(ClientError::Io(e)),
        }
    }
    Ok(())
}

fn read_nonblocking(port: &mut dyn SerialPort, buf: &mut [u8]) -> Result<usize, ClientError> {
    match port.read(buf) {
        Ok(n) => Ok(n),
        Err(e) if matches!(e.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) => Ok(0),
        Err(e) => Err(ClientError::Io(e)),
    }
}

/// Write the `Inquire` tag, read exactly one `Describe` reply within
/// `config.handshake_timeout`, and bind the protocol version/axis count
/// into a fresh [`ProtocolDriver`].
///
/// Grounded on `parser.py::protocol_handshake`/`ProtocolParser.connect_to_port`.
fn perform_handshake(
    port: &mut dyn SerialPort,
    config: &ClientConfig,
) -> Result<(Handshake, ProtocolDriver), ClientError> {
    port.write_all(&[MessageTag::Inquire as u8])?;

    let mut response = vec![0_u8; 1 + SystemDescription::SIZE];
    read_exact_with_timeout(port, &mut response, config.handshake_timeout)?;

    if response[0] != MessageTag::Describe as u8 {
        return Err(ClientError::HandshakeTimeout);
    }
    let description = SystemDescription::decode(&response[1..])?;
    let handshake = Handshake::from_description(description)?;
    Ok((handshake, ProtocolDriver::new(DriverConfig::default())))
}

/// Apply an inbound `Status` to the driver's flow-control state and the
/// shared signals, returning how many buffered records the device can now
/// accept, if any.
///
/// Grounded on `worker_thread.py::worker_loop`'s `isinstance(message,
/// defs.Status)` branch, including its asymmetry: the idle/halt branch only
/// sets `idle` and deliberately leaves `busy` untouched.
fn handle_status(status: &Status, driver: &mut ProtocolDriver, signals: &Signals) -> Option<usize> {
    let mut can_send = None;
    if driver.status_request_matches(status.request_counter) {
        match status.status_flag {
            StatusFlag::Busy | StatusFlag::Idle | StatusFlag::Halt => {
                if status.free_space == 0 {
                    driver.invalidate_status();
                    thread::sleep(Duration::from_millis(50));
                } else {
                    can_send = Some(status.free_space as usize);
                }
            }
            StatusFlag::Homing => {
                driver.invalidate_status();
                thread::sleep(Duration::from_millis(25));
            }
            StatusFlag::Dead | StatusFlag::BufferUnderflow => {}
        }
    }

    {
        let mut slot = signals.status.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(status.clone());
    }
    match status.status_flag {
        StatusFlag::Busy | StatusFlag::Homing => {
            signals.busy.set();
            signals.idle.clear();
        }
        _ => signals.idle.set(),
    }

    can_send
}

/// Runs until the `die` signal is raised or an unrecoverable protocol error
/// occurs. Owns `port` and the protocol driver exclusively — no other
/// thread touches either.
///
/// # Errors
/// Returns the error that killed the connection. A clean shutdown via the
/// `die` signal returns `Ok(())`.
pub fn run(
    config: &ClientConfig,
    signals: &Signals,
    immediate_rx: &Receiver<Message>,
    buffered_rx: &Receiver<BufferedBatch>,
) -> Result<(), ClientError> {
    let mut port = serialport::new(&config.path, config.baud_rate).timeout(config.handshake_timeout).open()?;

    let (handshake, mut driver) = perform_handshake(port.as_mut(), config)?;
    let mut table = CodecTable::initial();
    table.bind(&handshake.env)?;
    let mut parser = FramedParser::new(table, handshake.env);

    port.set_timeout(Duration::ZERO)?;
    signals.initialized.set();

    for chunk in driver.request_status()? {
        port.write_all(&chunk)?;
    }

    let mut taker = QueueTaker::default();
    let mut read_buf = vec![0_u8; config.read_chunk_size];

    loop {
        if signals.die.is_set() {
            return Ok(());
        }

        while let Ok(message) = immediate_rx.try_recv() {
            for chunk in driver.encode_batch(std::slice::from_ref(&message))? {
                port.write_all(&chunk)?;
            }
        }

        if !driver.has_any_outstanding_request() {
            for chunk in driver.request_status()? {
                port.write_all(&chunk)?;
            }
        }

        let read = read_nonblocking(port.as_mut(), &mut read_buf)?;
        if read > 0 {
            parser.feed(&read_buf[..read]);
        }

        while let Some(decoded) = parser.poll() {
            let can_send = match decoded {
                Ok(Message::Status(status)) => handle_status(&status, &mut driver, signals),
                Ok(Message::Buffer(buffer)) => {
                    if driver.buffer_request_matches(buffer.request_counter) {
                        if buffer.spaces == 0 {
                            driver.invalidate_buffer();
                            None
                        } else {
                            Some(buffer.spaces as usize)
                        }
                    } else {
                        None
                    }
                }
                Ok(Message::PeripheralStatus(peripheral)) => {
                    let mut slot = signals.peripheral.lock().unwrap_or_else(PoisonError::into_inner);
                    *slot = Some(peripheral);
                    None
                }
                Ok(Message::Error(bytes)) => {
                    warn!(len = bytes.len(), "device reported a fatal error");
                    return Err(ClientError::DeviceError(bytes));
                }
                Ok(other) => {
                    debug!(?other, "unhandled inbound message");
                    None
                }
                Err(ProtocolError::UnknownTag { tag }) => {
                    warn!(tag, "unknown tag from device, connection is no longer trustworthy");
                    return Err(ClientError::Protocol(ProtocolError::UnknownTag { tag }));
                }
                Err(err) => return Err(ClientError::Protocol(err)),
            };

            if let Some(n) = can_send {
                let (records, start, done) = taker.take(buffered_rx, n);
                if records.is_empty() {
                    driver.invalidate_status();
                    driver.invalidate_buffer();
                    thread::sleep(Duration::from_millis(50));
                } else {
                    for chunk in driver.send_segments(&records, done, start)? {
                        port.write_all(&chunk)?;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn queue_taker_reports_done_only_once_queue_drains() {
        let (tx, rx) = mpsc::channel();
        tx.send(BufferedBatch {
            records: vec![Message::Done, Message::Start],
            start: true,
            done: true,
        })
        .unwrap_or_else(|_| ());

        let mut taker = QueueTaker::default();
        let (taken, start, done) = taker.take(&rx, 1);
        assert_eq!(taken.len(), 1);
        assert!(start);
        assert!(!done);

        let (taken, start, done) = taker.take(&rx, 1);
        assert_eq!(taken.len(), 1);
        assert!(!start);
        assert!(done);
    }

    #[test]
    fn queue_taker_returns_short_on_empty_queue() {
        let (_tx, rx) = mpsc::channel::<BufferedBatch>();
        let mut taker = QueueTaker::default();
        let (taken, start, done) = taker.take(&rx, 5);
        assert!(taken.is_empty());
        assert!(!start);
        assert!(!done);
    }
}
