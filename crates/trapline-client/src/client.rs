//! The foreground API: open a connection, push work at it, read back
//! status. Everything here runs on the caller's thread; the heavy lifting
//! happens on the worker thread spawned by [`Connection::open`].

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use trapline_proto::messages::Status;
use trapline_proto::Message;

use crate::error::ClientError;
use crate::worker::{self, BufferedBatch, ClientConfig, Signals};

/// A live link to the device: a background worker thread, two SPSC queues
/// feeding it, and the shared signal/status state the facade reads.
pub struct Connection {
    signals: Arc<Signals>,
    immediate_tx: Sender<Message>,
    buffered_tx: Sender<BufferedBatch>,
    worker: Option<JoinHandle<Result<(), ClientError>>>,
}

impl Connection {
    /// Spawn the worker thread and block until the handshake completes (the
    /// `initialized` signal fires) or the worker dies trying.
    ///
    /// # Errors
    /// Returns whatever the worker failed with before it could finish the
    /// handshake — most commonly [`ClientError::HandshakeTimeout`] or a
    /// wrapped [`trapline_proto::ProtocolError`].
    pub fn open(config: ClientConfig) -> Result<Self, ClientError> {
        let signals = Arc::new(Signals::default());
        let (immediate_tx, immediate_rx) = mpsc::channel();
        let (buffered_tx, buffered_rx) = mpsc::channel();

        let worker_signals = Arc::clone(&signals);
        let worker = std::thread::Builder::new()
            .name("trapline-worker".into())
            .spawn(move || worker::run(&config, &worker_signals, &immediate_rx, &buffered_rx))
            .map_err(ClientError::Io)?;

        // The worker sets `initialized` right after the handshake and
        // before entering its main loop; if it dies first, the die signal
        // never fires and we'd wait forever, so poll the handle instead.
        loop {
            if signals.initialized.is_set() {
                break;
            }
            if worker.is_finished() {
                return match worker.join() {
                    Ok(Err(err)) => Err(err),
                    Ok(Ok(())) => Err(ClientError::PortClosed),
                    Err(_) => Err(ClientError::WorkerPanicked),
                };
            }
            std::thread::yield_now();
        }

        Ok(Self { signals, immediate_tx, buffered_tx, worker: Some(worker) })
    }

    /// Raise the stop signal and join the worker thread.
    ///
    /// # Errors
    /// Returns the error the worker exited with, if it was already dead or
    /// ended abnormally; a clean shutdown returns `Ok(())`.
    pub fn close(mut self) -> Result<(), ClientError> {
        self.signals.die.set();
        self.join_worker()
    }

    fn join_worker(&mut self) -> Result<(), ClientError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(ClientError::WorkerPanicked),
        }
    }

    /// Enqueue a single-shot message (e.g. `Override`) for the worker to
    /// transmit ahead of any queued buffered work.
    pub fn send_immediate(&self, message: Message) {
        // An unbounded SPSC channel whose only receiver lives for as long
        // as the worker thread; a send error means the worker already
        // died, which `wait_until_idle`/`status` will surface.
        let _ = self.immediate_tx.send(message);
    }

    /// Enqueue a batch of buffered records (`Segment`/`Immediate`/`Home`)
    /// for transmission subject to device flow control, optimistically
    /// clearing the `busy` signal so a subsequent `wait_until_idle` doesn't
    /// return on stale state from before this batch was queued.
    pub fn send_buffered(&self, records: Vec<Message>, start: bool, done: bool) {
        self.signals.busy.clear();
        let _ = self.buffered_tx.send(BufferedBatch { records, start, done });
    }

    /// Block until the device has been seen `Busy` (or `Homing`) at least
    /// once since the last clear, then until it next reports `Idle`.
    pub fn wait_until_idle(&self) {
        self.signals.busy.wait();
        self.signals.idle.wait();
    }

    /// The most recently published `Status`, or `None` before the first
    /// reply has arrived.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        self.signals.status.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.signals.die.set();
            let _ = self.join_worker();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_buffered_clears_busy_before_enqueueing() {
        let signals = Arc::new(Signals::default());
        signals.busy.set();
        let (immediate_tx, _immediate_rx) = mpsc::channel();
        let (buffered_tx, buffered_rx) = mpsc::channel();
        let connection =
            Connection { signals: Arc::clone(&signals), immediate_tx, buffered_tx, worker: None };

        connection.send_buffered(vec![Message::Done], true, true);

        assert!(!signals.busy.is_set());
        let batch = buffered_rx.try_recv().expect("batch queued");
        assert!(batch.start);
        assert!(batch.done);
    }
}
