//! Transport variants.
//!
//! One job owns one transport for its whole life; none of the variants
//! tolerate overlapping requests. The router drives whichever variant the
//! session was opened with through the same three operations.

use crate::ble::BleTransport;
use crate::error::Result;
use crate::usb::UsbTransport;

pub enum Transport {
    Usb(UsbTransport),
    Ble(BleTransport),
    #[cfg(test)]
    Mock(MockTransport),
}

impl Transport {
    /// Deliver one frame to the device.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Self::Usb(usb) => usb.write(bytes),
            Self::Ble(ble) => ble.write(bytes).await,
            #[cfg(test)]
            Self::Mock(mock) => {
                mock.push_write(bytes);
                Ok(())
            }
        }
    }

    /// Pull whatever inbound bytes are available, waiting up to roughly
    /// one polling interval when there are none.
    pub async fn read_or_drain(&mut self) -> Result<Vec<u8>> {
        match self {
            Self::Usb(usb) => usb.read(),
            Self::Ble(ble) => ble.drain().await,
            #[cfg(test)]
            Self::Mock(mock) => Ok(mock.read().await),
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        match self {
            Self::Usb(usb) => usb.close(),
            Self::Ble(ble) => ble.close().await,
            #[cfg(test)]
            Self::Mock(_) => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) use mock::{response_code, MockTransport};

#[cfg(test)]
mod mock {
    use std::collections::VecDeque;

    use crate::packet::{self, Packet, RequestCode};
    use crate::router::{ParseBuffer, POLL_INTERVAL};

    /// Scripted in-memory link: outbound frames are decoded and handed to
    /// a responder closure that plays the printer's part.
    pub(crate) struct MockTransport {
        /// Raw bytes written, in order: the byte stream a printer would see.
        pub wire: Vec<u8>,
        /// Outbound packets decoded from the wire, in order.
        pub sent: Vec<Packet>,
        inbound: VecDeque<u8>,
        responder: Box<dyn FnMut(&Packet) -> Vec<Vec<u8>> + Send>,
        outparse: ParseBuffer,
    }

    impl MockTransport {
        pub fn scripted(
            responder: impl FnMut(&Packet) -> Vec<Vec<u8>> + Send + 'static,
        ) -> Self {
            MockTransport {
                wire: Vec::new(),
                sent: Vec::new(),
                inbound: VecDeque::new(),
                responder: Box::new(responder),
                outparse: ParseBuffer::new(),
            }
        }

        /// Acknowledge every control packet with `[0x01]` on its response
        /// type; image rows are consumed silently.
        pub fn acking() -> Self {
            Self::scripted(|req| match response_code(req.typ) {
                Some(code) => vec![packet::encode(code, &[0x01]).unwrap()],
                None => vec![],
            })
        }

        pub fn push_write(&mut self, bytes: &[u8]) {
            self.wire.extend_from_slice(bytes);
            self.outparse.feed(bytes);
            while let Some(frame) = self.outparse.next_frame() {
                for reply in (self.responder)(&frame) {
                    self.inbound.extend(reply);
                }
                self.sent.push(frame);
            }
        }

        pub async fn read(&mut self) -> Vec<u8> {
            if self.inbound.is_empty() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            self.inbound.drain(..).collect()
        }

        /// How many times a given packet type was sent.
        pub fn sent_count(&self, typ: RequestCode) -> usize {
            self.sent.iter().filter(|p| p.typ == typ as u8).count()
        }
    }

    /// Mirror of the firmware's response-type table, for scripting replies.
    pub(crate) fn response_code(typ: u8) -> Option<u8> {
        match typ {
            0x85 => None,
            0x20 | 0x21 | 0x23 | 0xA3 => Some(typ + 0x10),
            _ => Some(typ + 1),
        }
    }
}
