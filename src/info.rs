//! Read-only printer attributes: info keys, heartbeat, RFID tag data and
//! per-page print progress.

use crate::error::{Error, Result};

/// Keys accepted by the info query. The response carries the key as its
/// packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InfoKey {
    Density = 1,
    PrintSpeed = 2,
    LabelType = 3,
    Language = 6,
    AutoShutdown = 7,
    DeviceType = 8,
    SoftVersion = 9,
    Battery = 10,
    DeviceSerial = 11,
    HardVersion = 12,
}

/// Decoded info attribute. The shape is a function of the key.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    /// Lowercase hex rendering of the serial bytes.
    Serial(String),
    /// Firmware/hardware version, hundredths.
    Version(f64),
    Number(u64),
}

fn be_uint(payload: &[u8]) -> u64 {
    payload.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

pub(crate) fn decode_info(key: InfoKey, payload: &[u8]) -> InfoValue {
    match key {
        InfoKey::DeviceSerial => {
            let hex: String = payload.iter().map(|b| format!("{b:02x}")).collect();
            InfoValue::Serial(hex)
        }
        InfoKey::SoftVersion | InfoKey::HardVersion => {
            InfoValue::Version(be_uint(payload) as f64 / 100.0)
        }
        _ => InfoValue::Number(be_uint(payload)),
    }
}

/// Snapshot returned by the heartbeat command. Firmware revisions answer
/// with different payload sizes; fields absent from a given size are
/// `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Heartbeat {
    pub closing_state: Option<u8>,
    pub power_level: Option<u8>,
    pub paper_state: Option<u8>,
    pub rfid_read_state: Option<u8>,
}

pub(crate) fn decode_heartbeat(payload: &[u8]) -> Heartbeat {
    let mut beat = Heartbeat::default();
    match payload.len() {
        20 => {
            beat.paper_state = Some(payload[18]);
            beat.rfid_read_state = Some(payload[19]);
        }
        19 => {
            beat.closing_state = Some(payload[15]);
            beat.power_level = Some(payload[9]);
            beat.paper_state = Some(payload[6]);
            beat.rfid_read_state = Some(payload[7]);
        }
        13 => {
            beat.power_level = Some(payload[9]);
            beat.rfid_read_state = Some(payload[10]);
        }
        10 => {
            beat.closing_state = Some(payload[8]);
            beat.power_level = Some(payload[9]);
        }
        9 => {
            beat.closing_state = Some(payload[8]);
        }
        _ => {}
    }
    beat
}

/// Contents of the RFID tag in the installed label roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfidTag {
    pub uuid: String,
    pub barcode: String,
    pub serial: String,
    pub total_len: u16,
    pub used_len: u16,
    pub kind: u8,
}

/// `None` when no tag is present (first payload byte is zero).
pub(crate) fn decode_rfid(payload: &[u8]) -> Result<Option<RfidTag>> {
    if payload.first().copied().unwrap_or(0) == 0 {
        return Ok(None);
    }
    if payload.len() < 9 {
        return Err(Error::Truncated);
    }
    let uuid: String = payload[..8].iter().map(|b| format!("{b:02x}")).collect();
    let mut idx = 8;
    let barcode = read_prefixed(payload, &mut idx)?;
    let serial = read_prefixed(payload, &mut idx)?;

    let tail = payload.get(idx..idx + 5).ok_or(Error::Truncated)?;
    Ok(Some(RfidTag {
        uuid,
        barcode,
        serial,
        total_len: u16::from_be_bytes([tail[0], tail[1]]),
        used_len: u16::from_be_bytes([tail[2], tail[3]]),
        kind: tail[4],
    }))
}

fn read_prefixed(payload: &[u8], idx: &mut usize) -> Result<String> {
    let len = *payload.get(*idx).ok_or(Error::Truncated)? as usize;
    *idx += 1;
    let bytes = payload.get(*idx..*idx + len).ok_or(Error::Truncated)?;
    *idx += len;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Progress report for the page being printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintProgress {
    pub page: u16,
    pub progress1: u8,
    pub progress2: u8,
}

pub(crate) fn decode_print_status(payload: &[u8]) -> Result<PrintProgress> {
    if payload.len() < 4 {
        return Err(Error::Truncated);
    }
    Ok(PrintProgress {
        page: u16::from_be_bytes([payload[0], payload[1]]),
        progress1: payload[2],
        progress2: payload[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_is_lowercase_hex() {
        let value = decode_info(InfoKey::DeviceSerial, &[0xAB, 0x01, 0xFF]);
        assert_eq!(value, InfoValue::Serial("ab01ff".into()));
    }

    #[test]
    fn versions_are_hundredths() {
        let value = decode_info(InfoKey::SoftVersion, &[0x00, 123]);
        assert_eq!(value, InfoValue::Version(1.23));
        let value = decode_info(InfoKey::HardVersion, &[0x01, 0x00]);
        assert_eq!(value, InfoValue::Version(2.56));
    }

    #[test]
    fn scalars_are_big_endian() {
        assert_eq!(decode_info(InfoKey::Battery, &[4]), InfoValue::Number(4));
        assert_eq!(
            decode_info(InfoKey::AutoShutdown, &[0x01, 0x02]),
            InfoValue::Number(258)
        );
    }

    #[test]
    fn heartbeat_by_length() {
        let mut payload = vec![0u8; 20];
        payload[18] = 2;
        payload[19] = 3;
        let beat = decode_heartbeat(&payload);
        assert_eq!(beat.paper_state, Some(2));
        assert_eq!(beat.rfid_read_state, Some(3));
        assert_eq!(beat.power_level, None);

        let mut payload = vec![0u8; 13];
        payload[9] = 4;
        payload[10] = 1;
        let beat = decode_heartbeat(&payload);
        assert_eq!(beat.power_level, Some(4));
        assert_eq!(beat.rfid_read_state, Some(1));

        let mut payload = vec![0u8; 19];
        payload[15] = 1;
        payload[9] = 3;
        payload[6] = 2;
        payload[7] = 1;
        let beat = decode_heartbeat(&payload);
        assert_eq!(beat.closing_state, Some(1));
        assert_eq!(beat.power_level, Some(3));
        assert_eq!(beat.paper_state, Some(2));

        assert_eq!(decode_heartbeat(&[0u8; 5]), Heartbeat::default());
    }

    #[test]
    fn rfid_without_tag_is_none() {
        assert_eq!(decode_rfid(&[0x00, 0x01, 0x02]).unwrap(), None);
        assert_eq!(decode_rfid(&[]).unwrap(), None);
    }

    #[test]
    fn rfid_parses_tag() {
        let mut payload = vec![0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11];
        payload.push(3);
        payload.extend_from_slice(b"abc");
        payload.push(2);
        payload.extend_from_slice(b"xy");
        payload.extend_from_slice(&[0x01, 0x2C]); // total 300
        payload.extend_from_slice(&[0x00, 0x64]); // used 100
        payload.push(2);

        let tag = decode_rfid(&payload).unwrap().unwrap();
        assert_eq!(tag.uuid, "0a0b0c0d0e0f1011");
        assert_eq!(tag.barcode, "abc");
        assert_eq!(tag.serial, "xy");
        assert_eq!(tag.total_len, 300);
        assert_eq!(tag.used_len, 100);
        assert_eq!(tag.kind, 2);
    }

    #[test]
    fn rfid_short_payload_is_an_error() {
        assert!(decode_rfid(&[0x0A, 0x0B]).is_err());
    }

    #[test]
    fn print_status_layout() {
        let progress = decode_print_status(&[0x00, 0x02, 50, 80]).unwrap();
        assert_eq!(progress.page, 2);
        assert_eq!(progress.progress1, 50);
        assert_eq!(progress.progress2, 80);
    }
}
