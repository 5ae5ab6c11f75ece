//! The caller-owned session.
//!
//! A [`Printer`] wraps one transport and one parse buffer for the duration
//! of a connection. All state lives here; nothing is global. `&mut self`
//! on every operation keeps a single request in flight per transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::ble::{BleConfig, BleTransport};
use crate::error::{Error, Result};
use crate::info::{
    self, Heartbeat, InfoKey, InfoValue, PrintProgress, RfidTag,
};
use crate::job::{self, PrintOptions};
use crate::model::Model;
use crate::packet::RequestCode;
use crate::raster::{self, Raster};
use crate::router::Channel;
use crate::transport::Transport;
use crate::usb::{UsbFilter, UsbTransport};

/// How the printer is reached.
#[derive(Debug, Clone)]
pub enum Connection {
    Usb { filters: Vec<UsbFilter> },
    Ble(BleConfig),
}

/// Connection settings, consumed by [`Printer::connect`].
#[derive(Debug, Clone)]
pub struct Config {
    model: Model,
    connection: Connection,
    response_timeout: Option<Duration>,
}

impl Config {
    /// Reach the printer over the USB bulk endpoints, matching the default
    /// vendor id.
    pub fn usb(model: Model) -> Self {
        Config {
            model,
            connection: Connection::Usb {
                filters: vec![UsbFilter::default()],
            },
            response_timeout: None,
        }
    }

    /// Reach the printer over BLE, matched by advertised service.
    pub fn ble(model: Model) -> Self {
        Config {
            model,
            connection: Connection::Ble(BleConfig::default()),
            response_timeout: None,
        }
    }

    /// Replace the USB filter list.
    pub fn usb_filters(self, filters: Vec<UsbFilter>) -> Self {
        Config {
            connection: Connection::Usb { filters },
            ..self
        }
    }

    /// Match the BLE advertisement by device name prefix instead of by
    /// service.
    pub fn ble_name(self, prefix: impl Into<String>) -> Self {
        let mut ble = match self.connection {
            Connection::Ble(ble) => ble,
            Connection::Usb { .. } => BleConfig::default(),
        };
        ble.name_prefix = Some(prefix.into());
        Config {
            connection: Connection::Ble(ble),
            ..self
        }
    }

    /// Override the per-request response timeout (default 600 ms).
    pub fn response_timeout(self, timeout: Duration) -> Self {
        Config {
            response_timeout: Some(timeout),
            ..self
        }
    }
}

/// Clone-able handle that aborts a running job at its next suspension
/// point.
#[derive(Debug, Clone)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

pub struct Printer {
    channel: Channel,
    model: Model,
    cancel: Arc<AtomicBool>,
}

impl Printer {
    pub async fn connect(config: Config) -> Result<Self> {
        let transport = match &config.connection {
            Connection::Usb { filters } => Transport::Usb(UsbTransport::open(filters)?),
            Connection::Ble(ble) => Transport::Ble(BleTransport::open(ble).await?),
        };
        let mut channel = Channel::new(transport);
        if let Some(timeout) = config.response_timeout {
            channel.set_response_timeout(timeout);
        }
        let cancel = channel.cancel_flag();
        Ok(Printer {
            channel,
            model: config.model,
            cancel,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_transport(model: Model, transport: Transport) -> Self {
        let channel = Channel::new(transport);
        let cancel = channel.cancel_flag();
        Printer {
            channel,
            model,
            cancel,
        }
    }

    pub fn model(&self) -> Model {
        self.model
    }

    /// Query one typed read-only attribute.
    pub async fn info(&mut self, key: InfoKey) -> Result<InfoValue> {
        let reply = self
            .channel
            .transceive_expecting(RequestCode::GetInfo, &[key as u8], key as u8)
            .await?;
        Ok(info::decode_info(key, &reply.payload))
    }

    pub async fn heartbeat(&mut self) -> Result<Heartbeat> {
        let reply = self
            .channel
            .transceive(RequestCode::Heartbeat, &[0x01])
            .await?;
        Ok(info::decode_heartbeat(&reply.payload))
    }

    /// Read the RFID tag of the installed roll, if any.
    pub async fn rfid(&mut self) -> Result<Option<RfidTag>> {
        let reply = self
            .channel
            .transceive(RequestCode::GetRfid, &[0x01])
            .await?;
        info::decode_rfid(&reply.payload)
    }

    /// Per-page progress of the job being printed.
    pub async fn print_status(&mut self) -> Result<PrintProgress> {
        let reply = self
            .channel
            .transceive(RequestCode::GetPrintStatus, &[0x01])
            .await?;
        info::decode_print_status(&reply.payload)
    }

    /// Release the print lock; some firmware requires this after an
    /// interrupted job. Returns the printer's acknowledgement.
    pub async fn allow_print_clear(&mut self) -> Result<bool> {
        let reply = self
            .channel
            .transceive(RequestCode::AllowPrintClear, &[0x01])
            .await?;
        Ok(reply.ack())
    }

    /// Print one raster. Parameters are validated against the model
    /// catalog before anything touches the wire.
    pub async fn print(&mut self, raster: &Raster, options: &PrintOptions) -> Result<()> {
        let spec = self.model.spec();
        if options.density > spec.max_density {
            return Err(Error::DensityExceedsModel {
                density: options.density,
                max: spec.max_density,
            });
        }
        if !spec.label_types.contains(&options.label_type) {
            return Err(Error::LabelTypeNotSupported);
        }
        let bitmap = raster::encode(
            raster,
            options.rotation,
            options.threshold,
            options.density,
            spec.max_width_px,
        )?;
        self.cancel.store(false, Ordering::Relaxed);
        job::run(&mut self.channel, &self.cancel, &bitmap, options).await
    }

    /// Handle for aborting a running [`print`](Self::print) from another
    /// task.
    pub fn canceller(&self) -> Canceller {
        Canceller(self.cancel.clone())
    }

    pub async fn close(mut self) -> Result<()> {
        debug!("closing session");
        self.channel.close().await
    }
}
