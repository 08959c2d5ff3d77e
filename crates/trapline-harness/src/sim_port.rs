//! An in-memory duplex byte pipe standing in for a serial port.
//!
//! A thin wrapper tests drive explicitly rather than a background I/O
//! loop: a synchronous `std::io::{Read, Write}` pair backed by a shared
//! byte queue.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// One end of a simulated duplex link. Reads drain bytes the peer wrote;
/// writes hand bytes to the peer. `read` returns `Ok(0)` on an empty queue
/// rather than blocking, matching the zero-timeout non-blocking read the
/// worker loop performs against a real serial port.
#[derive(Clone)]
pub struct SimPort {
    inbound: Arc<Mutex<VecDeque<u8>>>,
    outbound: Arc<Mutex<VecDeque<u8>>>,
}

/// Build a connected pair: bytes written to one end are readable from the
/// other.
#[must_use]
pub fn duplex_pair() -> (SimPort, SimPort) {
    let host_to_device = Arc::new(Mutex::new(VecDeque::new()));
    let device_to_host = Arc::new(Mutex::new(VecDeque::new()));
    let host = SimPort { inbound: Arc::clone(&device_to_host), outbound: Arc::clone(&host_to_device) };
    let device = SimPort { inbound: host_to_device, outbound: device_to_host };
    (host, device)
}

impl Read for SimPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut queue = self.inbound.lock().unwrap_or_else(PoisonError::into_inner);
        let n = queue.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = queue.pop_front().unwrap_or_else(|| unreachable!("n bounded by queue.len()"));
        }
        Ok(n)
    }
}

impl Write for SimPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner).extend(buf.iter().copied());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_written_on_one_end_are_readable_on_the_other() {
        let (mut host, mut device) = duplex_pair();
        host.write_all(&[1, 2, 3]).unwrap();
        let mut buf = [0_u8; 3];
        assert_eq!(device.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn read_on_empty_queue_returns_zero_rather_than_blocking() {
        let (mut host, _device) = duplex_pair();
        let mut buf = [0_u8; 8];
        assert_eq!(host.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn each_end_is_independent() {
        let (mut host, mut device) = duplex_pair();
        device.write_all(&[9]).unwrap();
        let mut buf = [0_u8; 1];
        assert_eq!(host.read(&mut buf).unwrap(), 1);
        assert_eq!(buf, [9]);
        assert_eq!(device.read(&mut buf).unwrap(), 0);
    }
}
