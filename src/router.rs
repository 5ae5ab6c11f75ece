//! Response routing: a parse buffer fed by the transport, and the
//! send-then-await-typed-response exchange every control command uses.
//!
//! At most one request is in flight per transport; `&mut` access to
//! [`Channel`] serializes callers without any locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::packet::{self, Packet, RequestCode, ERROR_TYPE, FRAME_HEAD};
use crate::transport::Transport;

/// Spacing between polling rounds; transports block for roughly this long
/// when no data is pending.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default transceive budget: six rounds, ~600 ms.
pub(crate) const POLL_ROUNDS: u32 = 6;

/// Growable byte queue between the transport and the frame decoder.
/// Frames are consumed from the head, atomically, once fully validated.
#[derive(Debug, Default)]
pub struct ParseBuffer {
    buf: Vec<u8>,
}

impl ParseBuffer {
    pub fn new() -> Self {
        ParseBuffer::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract the next complete frame, if any.
    ///
    /// A malformed frame at the head never discards the rest of the
    /// buffer: the head advances one byte and scanning re-seeks the
    /// `55 55` marker.
    pub fn next_frame(&mut self) -> Option<Packet> {
        loop {
            match packet::decode_one(&self.buf) {
                Ok(Some((frame, consumed))) => {
                    self.buf.drain(..consumed);
                    return Some(frame);
                }
                Ok(None) => return None,
                Err(err) => {
                    debug!("resync after {err}");
                    self.buf.drain(..1);
                    match self.buf.windows(2).position(|w| w == FRAME_HEAD) {
                        Some(pos) => {
                            self.buf.drain(..pos);
                        }
                        None => {
                            // A trailing 0x55 may be the first half of the
                            // next header; everything before it is garbage.
                            let keep = usize::from(self.buf.last() == Some(&0x55));
                            let garbage = self.buf.len() - keep;
                            self.buf.drain(..garbage);
                        }
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// A transport plus its parse buffer: the single seat from which requests
/// are issued and responses awaited.
pub struct Channel {
    transport: Transport,
    parse: ParseBuffer,
    rounds: u32,
    cancel: Arc<AtomicBool>,
}

impl Channel {
    pub fn new(transport: Transport) -> Self {
        Channel {
            transport,
            parse: ParseBuffer::new(),
            rounds: POLL_ROUNDS,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag consulted at every polling round; setting it aborts the
    /// in-flight exchange with [`Error::Cancelled`] at its next
    /// suspension point.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Override the per-transceive polling budget.
    pub fn set_response_timeout(&mut self, timeout: Duration) {
        let rounds = timeout.as_millis() / POLL_INTERVAL.as_millis();
        self.rounds = rounds.max(1) as u32;
    }

    /// Frame and write a packet without awaiting any response.
    pub async fn send(&mut self, typ: u8, payload: &[u8]) -> Result<()> {
        let frame = packet::encode(typ, payload)?;
        self.transport.write(&frame).await
    }

    /// Send a request and await its typed response.
    pub async fn transceive(&mut self, req: RequestCode, payload: &[u8]) -> Result<Packet> {
        self.transceive_expecting(req, payload, req.response_code())
            .await
    }

    /// Send a request and await a response of `expected` type. Needed for
    /// info queries, whose response type is the queried key.
    pub async fn transceive_expecting(
        &mut self,
        req: RequestCode,
        payload: &[u8],
        expected: u8,
    ) -> Result<Packet> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        self.send(req as u8, payload).await?;
        for _ in 0..self.rounds {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            let chunk = self.transport.read_or_drain().await?;
            self.parse.feed(&chunk);
            while let Some(frame) = self.parse.next_frame() {
                if frame.typ == expected {
                    return Ok(frame);
                }
                if frame.typ == ERROR_TYPE {
                    let code = frame.payload.first().copied().unwrap_or(0);
                    return Err(Error::Printer(code));
                }
                // Unsolicited heartbeat or status traffic; not ours.
                debug!(
                    "{}",
                    Error::UnexpectedResponse {
                        got: frame.typ,
                        expected
                    }
                );
            }
        }
        warn!(
            "no {:#04x} response to {:#04x} within {} rounds",
            expected, req as u8, self.rounds
        );
        Err(Error::Timeout)
    }

    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    #[cfg(test)]
    pub(crate) fn mock(&mut self) -> &mut crate::transport::MockTransport {
        match &mut self.transport {
            Transport::Mock(mock) => mock,
            _ => unreachable!("test channel is always mock-backed"),
        }
    }
}
