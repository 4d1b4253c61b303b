// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IEEE-1284 Device ID handling.
//
// GET_DEVICE_ID returns a two-byte length (which includes itself) followed
// by `KEY:value;` pairs.  The length is specified as big-endian, but some
// devices send it little-endian, so an out-of-range big-endian value is
// reinterpreted before giving up.  The claimed length is never trusted
// beyond the bytes that actually arrived.

/// Size of the buffer handed to the GET_DEVICE_ID control transfer.
pub const DEVICE_ID_BUFFER: usize = 1024;

/// Smallest length prefix accepted as plausible.
const MIN_DEVICE_ID_LENGTH: usize = 14;

const MAKE_KEYS: [&str; 2] = ["MANUFACTURER:", "MFG:"];
const MODEL_KEYS: [&str; 2] = ["MODEL:", "MDL:"];
const SERIAL_KEYS: [&str; 3] = ["SERIALNUMBER:", "SERN:", "SN:"];

/// Decode the length prefix of a GET_DEVICE_ID response.
///
/// Returns `None` when neither byte order gives a length inside
/// `[14, DEVICE_ID_BUFFER]`.
pub fn prefixed_length(raw: &[u8]) -> Option<usize> {
    let (&first, &second) = (raw.first()?, raw.get(1)?);
    let plausible = |len: usize| (MIN_DEVICE_ID_LENGTH..=DEVICE_ID_BUFFER).contains(&len);

    let big = u16::from_be_bytes([first, second]) as usize;
    if plausible(big) {
        return Some(big);
    }
    let little = u16::from_le_bytes([first, second]) as usize;
    plausible(little).then_some(little)
}

/// Extract the Device ID text from a raw GET_DEVICE_ID response.
///
/// An implausible length yields an empty string.
pub fn extract(raw: &[u8]) -> String {
    let Some(length) = prefixed_length(raw) else {
        return String::new();
    };

    let end = length.min(raw.len());
    let body = &raw[2.min(end)..end];
    let body = body.split(|&b| b == 0).next().unwrap_or(body);
    String::from_utf8_lossy(body).into_owned()
}

/// Make, model and serial number pulled out of a Device ID.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdFields {
    pub make: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
}

impl DeviceIdFields {
    /// Parse by first-match substring search, longer keys first.
    pub fn parse(device_id: &str) -> Self {
        Self {
            make: lookup(device_id, &MAKE_KEYS),
            model: lookup(device_id, &MODEL_KEYS),
            serial: lookup(device_id, &SERIAL_KEYS),
        }
    }

    /// Make, or `"Unknown"`.
    pub fn make_or_unknown(&self) -> &str {
        self.make.as_deref().unwrap_or("Unknown")
    }

    /// Model, or `"Unknown"`.
    pub fn model_or_unknown(&self) -> &str {
        self.model.as_deref().unwrap_or("Unknown")
    }
}

fn lookup(device_id: &str, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let start = device_id.find(key)? + key.len();
        let rest = &device_id[start..];
        let value = rest.find(';').map_or(rest, |end| &rest[..end]);
        Some(value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HP_ID: &str = "MFG:HP;MDL:LaserJet 1020;CMD:ACL;CLS:PRINTER;DES:HP LaserJet 1020;SN:CNB1234567;";

    fn response(length_prefix: [u8; 2], body: &str) -> Vec<u8> {
        let mut raw = length_prefix.to_vec();
        raw.extend_from_slice(body.as_bytes());
        raw
    }

    fn be_prefixed(body: &str) -> Vec<u8> {
        let len = (body.len() + 2) as u16;
        response(len.to_be_bytes(), body)
    }

    #[test]
    fn big_endian_length_is_used_first() {
        let raw = be_prefixed(HP_ID);
        assert_eq!(prefixed_length(&raw), Some(HP_ID.len() + 2));
        assert_eq!(extract(&raw), HP_ID);
    }

    #[test]
    fn little_endian_length_is_the_fallback() {
        let len = (HP_ID.len() + 2) as u16;
        let raw = response(len.to_le_bytes(), HP_ID);
        // Big-endian reading of these bytes is far beyond the buffer.
        assert!(u16::from_be_bytes([raw[0], raw[1]]) as usize > DEVICE_ID_BUFFER);
        assert_eq!(prefixed_length(&raw), Some(HP_ID.len() + 2));
        assert_eq!(extract(&raw), HP_ID);
    }

    #[test]
    fn length_out_of_range_both_ways_yields_empty() {
        // 0x0005 / 0x0500: too small, then too large.
        let raw = response([0x00, 0x05], "MFG:X;");
        assert_eq!(prefixed_length(&raw), None);
        assert_eq!(extract(&raw), "");

        // 0xFFFF either way.
        let raw = response([0xFF, 0xFF], HP_ID);
        assert_eq!(extract(&raw), "");
    }

    #[test]
    fn claimed_length_is_clamped_to_received_bytes() {
        // Claims 1000 bytes but only a few arrived.
        let raw = response(1000u16.to_be_bytes(), "MFG:Acme;MDL:Z;");
        assert_eq!(extract(&raw), "MFG:Acme;MDL:Z;");
    }

    #[test]
    fn text_stops_at_nul() {
        let mut raw = be_prefixed("MFG:Acme;MDL:Z1;");
        raw.extend_from_slice(&[0, b'j', b'u', b'n', b'k']);
        let len = (raw.len()) as u16;
        raw[..2].copy_from_slice(&len.to_be_bytes());
        assert_eq!(extract(&raw), "MFG:Acme;MDL:Z1;");
    }

    #[test]
    fn short_responses_yield_empty() {
        assert_eq!(extract(&[]), "");
        assert_eq!(extract(&[0x00]), "");
    }

    #[test]
    fn parse_short_keys() {
        let fields = DeviceIdFields::parse(HP_ID);
        assert_eq!(fields.make.as_deref(), Some("HP"));
        assert_eq!(fields.model.as_deref(), Some("LaserJet 1020"));
        assert_eq!(fields.serial.as_deref(), Some("CNB1234567"));
    }

    #[test]
    fn parse_long_keys_take_precedence() {
        let id = "MANUFACTURER:Zebra Technologies;MFG:Zebra;MODEL:ZTC GK420d;MDL:GK420;SERIALNUMBER:28J1;SN:X;";
        let fields = DeviceIdFields::parse(id);
        assert_eq!(fields.make.as_deref(), Some("Zebra Technologies"));
        assert_eq!(fields.model.as_deref(), Some("ZTC GK420d"));
        assert_eq!(fields.serial.as_deref(), Some("28J1"));
    }

    #[test]
    fn parse_sern_key() {
        let fields = DeviceIdFields::parse("MFG:Brother;MDL:QL-800;SERN:000G8Z123456");
        assert_eq!(fields.serial.as_deref(), Some("000G8Z123456"));
    }

    #[test]
    fn missing_make_and_model_default_to_unknown() {
        let fields = DeviceIdFields::parse("CMD:ZPL;");
        assert_eq!(fields.make_or_unknown(), "Unknown");
        assert_eq!(fields.model_or_unknown(), "Unknown");
        assert_eq!(fields.serial, None);

        let empty = DeviceIdFields::parse("");
        assert_eq!(empty, DeviceIdFields::default());
    }
}
