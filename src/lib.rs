//! Client for NIIMBOT thermal label printers.
//!
//! Speaks the framed command protocol over either the USB bulk endpoint
//! pair or the BLE transparent-UART characteristic, drives complete print
//! jobs, and converts RGBA rasters into the printer's packed monochrome
//! rows.
//!
//! ```no_run
//! use niimbot::{Config, Model, PrintOptions, Printer, Raster};
//!
//! # async fn print_label(rgba: Vec<u8>) -> niimbot::Result<()> {
//! let mut printer = Printer::connect(Config::usb(Model::B1)).await?;
//! let raster = Raster::new(384, 240, rgba);
//! printer.print(&raster, &PrintOptions::default()).await?;
//! printer.close().await
//! # }
//! ```

pub use crate::ble::BleConfig;
pub use crate::error::{Error, Result};
pub use crate::info::{Heartbeat, InfoKey, InfoValue, PrintProgress, RfidTag};
pub use crate::job::{JobStep, PrintOptions};
pub use crate::model::{LabelType, Model, ModelSpec};
pub use crate::packet::{Packet, RequestCode};
pub use crate::printer::{Canceller, Config, Connection, Printer};
pub use crate::raster::{Bitmap, Raster, Rotation, Threshold};
pub use crate::usb::UsbFilter;

mod ble;
mod error;
pub mod export;
mod info;
mod job;
mod model;
mod packet;
mod printer;
mod raster;
mod router;
mod transport;
mod usb;
