//! Raster preparation: RGBA frames in, per-row image packets out.
//!
//! The printer wants one bit per pixel, packed MSB-first, one packet per
//! row. Binarization happens once into a flat buffer; the row packets are
//! then produced lazily so streaming a tall label never holds more than
//! one packet of working memory beyond the bitmap itself.

use crate::error::{Error, Result};
use crate::packet::{Packet, RequestCode};

/// An RGBA frame as delivered by a canvas: row-major, top-to-bottom,
/// four bytes per pixel.
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        assert_eq!(
            rgba.len(),
            width as usize * height as usize * 4,
            "rgba buffer must hold width * height * 4 bytes"
        );
        Raster {
            width,
            height,
            rgba,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    fn dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::None | Self::Cw180 => (width, height),
            Self::Cw90 | Self::Cw270 => (height, width),
        }
    }

    /// Source pixel for output position `(x, y)` in a `width` × `height`
    /// input.
    fn source(self, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::None => (x, y),
            Self::Cw90 => (y, height - 1 - x),
            Self::Cw180 => (width - 1 - x, height - 1 - y),
            Self::Cw270 => (width - 1 - y, x),
        }
    }
}

/// How a grayscale value turns into ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Fixed cutoff; pixels darker than this print.
    Fixed(u8),
    /// Cutoff derived from the job density as `256 - density * 40`.
    DensityScaled,
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Fixed(128)
    }
}

impl Threshold {
    fn cutoff(self, density: u8) -> u16 {
        match self {
            Self::Fixed(t) => t as u16,
            Self::DensityScaled => 256u16.saturating_sub(density as u16 * 40),
        }
    }
}

/// A 1-bit-per-pixel, row-padded bitmap ready for streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub row_bytes: usize,
    pub data: Vec<u8>,
}

/// Binarize a raster into the wire bitmap.
///
/// `max_width_px` is the head width of the connected model; a rotated
/// raster wider than that cannot be printed and fails up front.
pub fn encode(
    raster: &Raster,
    rotation: Rotation,
    threshold: Threshold,
    density: u8,
    max_width_px: u32,
) -> Result<Bitmap> {
    let (width, height) = rotation.dimensions(raster.width, raster.height);
    if width > max_width_px {
        return Err(Error::WidthExceedsModel {
            width,
            max: max_width_px,
        });
    }

    let cutoff = threshold.cutoff(density);
    let row_bytes = (width as usize + 7) / 8;
    let mut data = vec![0u8; row_bytes * height as usize];

    for y in 0..height {
        let row = &mut data[y as usize * row_bytes..(y as usize + 1) * row_bytes];
        for x in 0..width {
            let (sx, sy) = rotation.source(x, y, raster.width, raster.height);
            let p = (sy as usize * raster.width as usize + sx as usize) * 4;
            let (r, g, b, a) = (
                raster.rgba[p],
                raster.rgba[p + 1],
                raster.rgba[p + 2],
                raster.rgba[p + 3],
            );
            // Transparent pixels print white.
            if a < 128 {
                continue;
            }
            let gray = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
            if (gray as u16) < cutoff {
                row[x as usize / 8] |= 1u8 << (7 - x % 8);
            }
        }
    }

    Ok(Bitmap {
        width,
        height,
        row_bytes,
        data,
    })
}

impl Bitmap {
    /// Whether pixel `(x, y)` is ink.
    pub fn bit(&self, x: u32, y: u32) -> bool {
        let byte = self.data[y as usize * self.row_bytes + x as usize / 8];
        byte & (1u8 << (7 - x % 8)) != 0
    }

    /// Lazily yields one image-row packet per row, in row order.
    pub fn rows(&self) -> Rows<'_> {
        Rows { bitmap: self, y: 0 }
    }
}

/// Payload header: row index (big-endian), three reserved bytes, a
/// constant 0x01.
fn row_payload(y: u16, row: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(6 + row.len());
    payload.extend_from_slice(&y.to_be_bytes());
    payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    payload.extend_from_slice(row);
    payload
}

pub struct Rows<'a> {
    bitmap: &'a Bitmap,
    y: u32,
}

impl Iterator for Rows<'_> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.y >= self.bitmap.height {
            return None;
        }
        let start = self.y as usize * self.bitmap.row_bytes;
        let row = &self.bitmap.data[start..start + self.bitmap.row_bytes];
        let packet = Packet::new(RequestCode::ImageRow as u8, row_payload(self.y as u16, row));
        self.y += 1;
        Some(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Raster {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        Raster::new(width, height, data)
    }

    #[test]
    fn threshold_mapping_is_pinned() {
        let cases = [
            // (pixel, fixed-128 ink, density-5-scaled ink)
            ([255, 255, 255, 255], false, false),
            ([0, 0, 0, 255], true, true),
            ([200, 200, 200, 255], false, false),
            ([100, 100, 100, 255], true, false),
            ([40, 40, 40, 255], true, true),
        ];
        for (rgba, fixed, scaled) in cases {
            let raster = solid(8, 1, rgba);
            let bm = encode(&raster, Rotation::None, Threshold::Fixed(128), 3, 384).unwrap();
            assert_eq!(bm.bit(0, 0), fixed, "fixed threshold for {rgba:?}");
            let bm = encode(&raster, Rotation::None, Threshold::DensityScaled, 5, 384).unwrap();
            assert_eq!(bm.bit(0, 0), scaled, "scaled threshold for {rgba:?}");
        }
    }

    #[test]
    fn transparent_prints_white() {
        let raster = solid(8, 1, [0, 0, 0, 0]);
        let bm = encode(&raster, Rotation::None, Threshold::default(), 3, 384).unwrap();
        assert_eq!(bm.data, vec![0x00]);
    }

    #[test]
    fn bit_packing_is_msb_first() {
        // Ink at x = 0 and x = 2 in a 16-wide row: 1010 0000 1010 0000.
        let mut raster = solid(16, 1, [255, 255, 255, 255]);
        for x in [0usize, 2, 8, 10] {
            raster.rgba[x * 4..x * 4 + 4].copy_from_slice(&[0, 0, 0, 255]);
        }
        let bm = encode(&raster, Rotation::None, Threshold::default(), 3, 384).unwrap();
        assert_eq!(bm.data, vec![0xA0, 0xA0]);
        assert!(bm.bit(0, 0) && !bm.bit(1, 0) && bm.bit(2, 0));
    }

    #[test]
    fn image_row_payload_layout() {
        let mut raster = solid(16, 8, [255, 255, 255, 255]);
        let y = 7usize;
        for x in [0usize, 2, 8, 10] {
            let p = (y * 16 + x) * 4;
            raster.rgba[p..p + 4].copy_from_slice(&[0, 0, 0, 255]);
        }
        let bm = encode(&raster, Rotation::None, Threshold::default(), 3, 384).unwrap();
        let packet = bm.rows().nth(7).unwrap();
        assert_eq!(packet.typ, 0x85);
        assert_eq!(
            packet.payload,
            [0x00, 0x07, 0x00, 0x00, 0x00, 0x01, 0xA0, 0xA0]
        );
    }

    #[test]
    fn one_packet_per_row_in_order() {
        let raster = solid(24, 40, [0, 0, 0, 255]);
        let bm = encode(&raster, Rotation::None, Threshold::default(), 3, 384).unwrap();
        let rows: Vec<Packet> = bm.rows().collect();
        assert_eq!(rows.len(), 40);
        for (i, packet) in rows.iter().enumerate() {
            assert_eq!(
                u16::from_be_bytes([packet.payload[0], packet.payload[1]]),
                i as u16
            );
        }
    }

    #[test]
    fn ragged_width_pads_with_white() {
        let raster = solid(12, 2, [0, 0, 0, 255]);
        let bm = encode(&raster, Rotation::None, Threshold::default(), 3, 384).unwrap();
        assert_eq!(bm.row_bytes, 2);
        // 12 ink pixels: FF F0, trailing four bits stay white.
        assert_eq!(&bm.data[..2], &[0xFF, 0xF0]);
    }

    #[test]
    fn rotation_remaps_pixels() {
        // 2x3 raster, single ink pixel at (0, 0).
        let mut raster = solid(2, 3, [255, 255, 255, 255]);
        raster.rgba[..4].copy_from_slice(&[0, 0, 0, 255]);

        let bm = encode(&raster, Rotation::Cw90, Threshold::default(), 3, 384).unwrap();
        assert_eq!((bm.width, bm.height), (3, 2));
        assert!(bm.bit(2, 0));

        let bm = encode(&raster, Rotation::Cw180, Threshold::default(), 3, 384).unwrap();
        assert_eq!((bm.width, bm.height), (2, 3));
        assert!(bm.bit(1, 2));

        let bm = encode(&raster, Rotation::Cw270, Threshold::default(), 3, 384).unwrap();
        assert_eq!((bm.width, bm.height), (3, 2));
        assert!(bm.bit(0, 1));
    }

    #[test]
    fn width_checked_against_model() {
        let raster = solid(400, 1, [0, 0, 0, 255]);
        assert!(matches!(
            encode(&raster, Rotation::None, Threshold::default(), 3, 384),
            Err(Error::WidthExceedsModel { width: 400, max: 384 })
        ));
        // Rotation is applied before the check.
        let raster = solid(1, 400, [0, 0, 0, 255]);
        assert!(matches!(
            encode(&raster, Rotation::Cw90, Threshold::default(), 3, 384),
            Err(Error::WidthExceedsModel { width: 400, max: 384 })
        ));
    }
}
