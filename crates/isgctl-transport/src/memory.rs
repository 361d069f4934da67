use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::EventChannel;

/// In-process channel pair, for tests and simulated kernels.
///
/// Whatever one end sends, the other end receives as a whole message.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
    read_timeout: Option<Duration>,
}

impl MemoryChannel {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::channel();
        let (right_tx, left_rx) = mpsc::channel();
        (
            Self {
                tx: left_tx,
                rx: left_rx,
                read_timeout: None,
            },
            Self {
                tx: right_tx,
                rx: right_rx,
                read_timeout: None,
            },
        )
    }

    /// Set the receive timeout. `None` blocks until a message or hang-up.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }
}

impl EventChannel for MemoryChannel {
    fn send(&mut self, msg: &[u8]) -> Result<()> {
        trace!(len = msg.len(), "memory channel send");
        self.tx
            .send(Bytes::copy_from_slice(msg))
            .map_err(|_| TransportError::Closed)
    }

    fn receive(&mut self) -> Result<Bytes> {
        match self.read_timeout {
            Some(timeout) => self.rx.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => TransportError::Timeout(timeout),
                RecvTimeoutError::Disconnected => TransportError::Closed,
            }),
            None => self.rx.recv().map_err(|_| TransportError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_cross_in_order() {
        let (mut user, mut kernel) = MemoryChannel::pair();
        user.send(b"one").unwrap();
        user.send(b"two").unwrap();

        assert_eq!(kernel.receive().unwrap().as_ref(), b"one");
        assert_eq!(kernel.receive().unwrap().as_ref(), b"two");

        kernel.send(b"ack").unwrap();
        assert_eq!(user.receive().unwrap().as_ref(), b"ack");
    }

    #[test]
    fn receive_times_out() {
        let (mut user, _kernel) = MemoryChannel::pair();
        user.set_read_timeout(Some(Duration::from_millis(5)));
        let err = user.receive().unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[test]
    fn hang_up_reports_closed() {
        let (mut user, kernel) = MemoryChannel::pair();
        drop(kernel);
        assert!(matches!(user.send(b"x"), Err(TransportError::Closed)));
        assert!(matches!(user.receive(), Err(TransportError::Closed)));
    }

    #[test]
    fn works_across_threads() {
        let (mut user, mut kernel) = MemoryChannel::pair();
        let handle = std::thread::spawn(move || {
            let msg = kernel.receive().unwrap();
            kernel.send(&msg).unwrap();
        });

        user.send(b"echo").unwrap();
        assert_eq!(user.receive().unwrap().as_ref(), b"echo");
        handle.join().unwrap();
    }

    #[test]
    fn boxed_channel_forwards() {
        let (user, mut kernel) = MemoryChannel::pair();
        let mut boxed: Box<dyn EventChannel> = Box::new(user);
        boxed.send(b"boxed").unwrap();
        assert_eq!(kernel.receive().unwrap().as_ref(), b"boxed");
    }
}
