use thiserror::Error;

use crate::job::JobStep;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no matching printer found")]
    TransportUnavailable,

    #[error(transparent)]
    Usb(#[from] rusb::Error),

    #[error(transparent)]
    Ble(#[from] btleplug::Error),

    #[error("bulk transfer wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("frame does not start with 55 55")]
    BadHeader,

    #[error("frame does not end with AA AA")]
    BadTrailer,

    #[error("frame checksum mismatch")]
    BadChecksum,

    #[error("buffer ends before the frame does")]
    Truncated,

    #[error("payload of {0} bytes does not fit the length field")]
    PayloadTooLong(usize),

    #[error("expected response type {expected:#04x}, got {got:#04x}")]
    UnexpectedResponse { got: u8, expected: u8 },

    #[error("printer reported error {0:#04x}")]
    Printer(u8),

    #[error("printer rejected {0}")]
    Rejected(JobStep),

    #[error("no response within the polling budget")]
    Timeout,

    #[error("printer did not confirm end of print")]
    EndPrintTimeout,

    #[error("raster width {width} exceeds the {max} pixel print head")]
    WidthExceedsModel { width: u32, max: u32 },

    #[error("density {density} exceeds the model maximum of {max}")]
    DensityExceedsModel { density: u8, max: u8 },

    #[error("label type is not supported by this model")]
    LabelTypeNotSupported,

    #[error("job cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
