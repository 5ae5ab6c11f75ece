//! Offline export of a prepared bitmap.
//!
//! Produces the standalone artifacts the label tooling exchanges: a
//! binary blob carrying the whole bitmap in one long-framed packet, and a
//! hex dump of the same bytes for inspection. Neither form is ever sent
//! over a live connection.

use crate::error::Result;
use crate::packet;
use crate::raster::Bitmap;

/// Frame the whole bitmap as a single export blob.
pub fn blob(bitmap: &Bitmap) -> Result<Vec<u8>> {
    packet::encode_long(&bitmap.data)
}

/// Hex dump of the export blob, sixteen bytes per line.
pub fn text(bitmap: &Bitmap) -> Result<String> {
    let bytes = blob(bitmap)?;
    let mut out = String::with_capacity(bytes.len() * 3);
    for line in bytes.chunks(16) {
        for (i, byte) in line.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{byte:02X}"));
        }
        out.push('\n');
    }
    Ok(out)
}
