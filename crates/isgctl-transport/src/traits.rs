use bytes::Bytes;

use crate::error::Result;

/// A message channel to the ISG module.
///
/// Each call moves exactly one complete message; the channel never splits
/// or reassembles payloads.
pub trait EventChannel {
    /// Send one encoded event.
    fn send(&mut self, msg: &[u8]) -> Result<()>;

    /// Receive the next complete message (blocking, subject to timeout).
    fn receive(&mut self) -> Result<Bytes>;
}

impl<C: EventChannel + ?Sized> EventChannel for &mut C {
    fn send(&mut self, msg: &[u8]) -> Result<()> {
        (**self).send(msg)
    }

    fn receive(&mut self) -> Result<Bytes> {
        (**self).receive()
    }
}

impl<C: EventChannel + ?Sized> EventChannel for Box<C> {
    fn send(&mut self, msg: &[u8]) -> Result<()> {
        (**self).send(msg)
    }

    fn receive(&mut self) -> Result<Bytes> {
        (**self).receive()
    }
}
