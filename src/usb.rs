//! Bulk USB transport.
//!
//! Opens the first device matching the caller's vendor/product filters and
//! claims the first interface exposing both a bulk-in and a bulk-out
//! endpoint. Command frames go out in a single bulk transfer; reads pull
//! whatever the printer has queued, which may be nothing, a partial frame,
//! or several frames at once.

use std::time::Duration;

use log::{debug, info};
use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};

use crate::error::{Error, Result};
use crate::router::POLL_INTERVAL;

/// Vendor id the NIIMBOT family enumerates under.
pub const VENDOR_ID: u16 = 0x3513;

const WRITE_TIMEOUT: Duration = Duration::from_secs(3);
const READ_CHUNK: usize = 1024;

/// A (vendor, product) pair to match during enumeration. A `None` product
/// matches any device of the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbFilter {
    pub vendor_id: u16,
    pub product_id: Option<u16>,
}

impl Default for UsbFilter {
    fn default() -> Self {
        UsbFilter {
            vendor_id: VENDOR_ID,
            product_id: None,
        }
    }
}

impl UsbFilter {
    fn matches(&self, vendor: u16, product: u16) -> bool {
        self.vendor_id == vendor && self.product_id.map_or(true, |p| p == product)
    }
}

pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    iface: u8,
    ep_in: u8,
    ep_out: u8,
}

impl UsbTransport {
    /// Open the first device matching any of `filters`.
    pub fn open(filters: &[UsbFilter]) -> Result<Self> {
        let context = Context::new()?;
        for device in context.devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("skipping device without descriptor: {err}");
                    continue;
                }
            };
            if !filters
                .iter()
                .any(|f| f.matches(desc.vendor_id(), desc.product_id()))
            {
                continue;
            }
            debug!(
                "opening {:04x}:{:04x}",
                desc.vendor_id(),
                desc.product_id()
            );
            return Self::claim(&device);
        }
        Err(Error::TransportUnavailable)
    }

    fn claim(device: &Device<Context>) -> Result<Self> {
        let handle = device.open()?;
        handle.set_auto_detach_kernel_driver(true).ok();

        let config = device.config_descriptor(0)?;
        if handle.active_configuration().unwrap_or(0) == 0 {
            handle.set_active_configuration(config.number())?;
        }

        // First interface with both a bulk-in and a bulk-out endpoint.
        for interface in config.interfaces() {
            for desc in interface.descriptors() {
                let mut ep_in = None;
                let mut ep_out = None;
                for endpoint in desc.endpoint_descriptors() {
                    if endpoint.transfer_type() != TransferType::Bulk {
                        continue;
                    }
                    match endpoint.direction() {
                        Direction::In => ep_in = ep_in.or(Some(endpoint.address())),
                        Direction::Out => ep_out = ep_out.or(Some(endpoint.address())),
                    }
                }
                if let (Some(ep_in), Some(ep_out)) = (ep_in, ep_out) {
                    let iface = desc.interface_number();
                    handle.claim_interface(iface)?;
                    info!(
                        "claimed interface {iface}, bulk in {ep_in:#04x}, bulk out {ep_out:#04x}"
                    );
                    return Ok(UsbTransport {
                        handle,
                        iface,
                        ep_in,
                        ep_out,
                    });
                }
            }
        }
        Err(Error::TransportUnavailable)
    }

    /// One bulk-out transfer of the whole frame; a short count means the
    /// transfer was cut off, likely by a timeout.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let n = self.handle.write_bulk(self.ep_out, bytes, WRITE_TIMEOUT)?;
        debug!("wrote {n} bytes to endpoint {:#04x}", self.ep_out);
        if n != bytes.len() {
            return Err(Error::ShortWrite {
                written: n,
                expected: bytes.len(),
            });
        }
        Ok(())
    }

    /// One bulk-in transfer; an empty result means the printer had nothing
    /// queued within the polling interval.
    pub fn read(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; READ_CHUNK];
        match self.handle.read_bulk(self.ep_in, &mut buf, POLL_INTERVAL) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(rusb::Error::Timeout) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.handle.release_interface(self.iface)?;
        Ok(())
    }
}
