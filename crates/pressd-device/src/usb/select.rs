// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer-class interface selection over plain descriptor data.
//
// Kept free of libusb types so the scoring rules can be checked without
// hardware.

/// USB interface class code for printers.
pub const CLASS_PRINTER: u8 = 0x07;

/// Printer subclass (the only one defined).
const SUBCLASS_PRINTER: u8 = 1;

/// Direction bit of an endpoint address (set = device-to-host).
const ENDPOINT_DIR_IN: u8 = 0x80;

/// Vendor id excluded from scanning: the host platform's own devices.
pub const EXCLUDED_VENDOR_ID: u16 = 0x05ac;

/// Printer-class protocol level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UsbProtocol {
    /// Host-to-printer only.
    Unidirectional = 1,
    /// Status can be read back.
    Bidirectional = 2,
}

impl UsbProtocol {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Unidirectional),
            2 => Some(Self::Bidirectional),
            _ => None,
        }
    }
}

/// One endpoint descriptor, reduced to what selection needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub bulk: bool,
}

impl EndpointInfo {
    fn is_in(&self) -> bool {
        self.address & ENDPOINT_DIR_IN != 0
    }
}

/// One alternate setting of an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltSettingInfo {
    pub class_code: u8,
    pub sub_class_code: u8,
    pub protocol_code: u8,
    pub interface_number: u8,
    pub setting_number: u8,
    pub endpoints: Vec<EndpointInfo>,
}

/// The alternate setting chosen on an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub protocol: UsbProtocol,
    pub interface_number: u8,
    pub alt_setting: u8,
    /// Endpoint indices within the alternate setting's descriptor list.
    pub read_index: Option<usize>,
    pub write_index: usize,
    /// Endpoint addresses resolved from those indices.
    pub read_endpoint: Option<u8>,
    pub write_endpoint: u8,
}

/// Whether a device descriptor is worth scanning at all.
pub fn device_is_candidate(num_configurations: u8, vendor_id: u16, product_id: u16) -> bool {
    num_configurations != 0 && vendor_id != 0 && product_id != 0 && vendor_id != EXCLUDED_VENDOR_ID
}

/// Pick the best printer-class alternate setting of one interface.
///
/// `best_so_far` is the highest protocol already adopted elsewhere on the
/// same device; a setting is adopted only when its protocol is at least
/// that.  Ties go to the later setting.  Returns `None` when nothing on
/// this interface was adopted.
pub fn select_alt_setting(
    alt_settings: &[AltSettingInfo],
    best_so_far: Option<UsbProtocol>,
) -> Option<Selection> {
    let mut best = best_so_far;
    let mut selection = None;

    for alt in alt_settings {
        if alt.class_code != CLASS_PRINTER || alt.sub_class_code != SUBCLASS_PRINTER {
            continue;
        }
        let Some(protocol) = UsbProtocol::from_code(alt.protocol_code) else {
            continue;
        };
        if best.is_some_and(|b| protocol < b) {
            continue;
        }

        // Last bulk endpoint in each direction wins.
        let mut read_index = None;
        let mut write_index = None;
        for (index, endpoint) in alt.endpoints.iter().enumerate() {
            if !endpoint.bulk {
                continue;
            }
            if endpoint.is_in() {
                read_index = Some(index);
            } else {
                write_index = Some(index);
            }
        }

        let Some(write_index) = write_index else {
            continue;
        };
        let read_index = match protocol {
            UsbProtocol::Bidirectional => match read_index {
                Some(index) => Some(index),
                None => continue,
            },
            UsbProtocol::Unidirectional => None,
        };

        best = Some(protocol);
        selection = Some(Selection {
            protocol,
            interface_number: alt.interface_number,
            alt_setting: alt.setting_number,
            read_index,
            write_index,
            read_endpoint: read_index.map(|i| alt.endpoints[i].address),
            write_endpoint: alt.endpoints[write_index].address,
        });
    }

    selection
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(address: u8) -> EndpointInfo {
        EndpointInfo {
            address,
            bulk: true,
        }
    }

    fn interrupt(address: u8) -> EndpointInfo {
        EndpointInfo {
            address,
            bulk: false,
        }
    }

    fn printer_alt(setting: u8, protocol: u8, endpoints: Vec<EndpointInfo>) -> AltSettingInfo {
        AltSettingInfo {
            class_code: CLASS_PRINTER,
            sub_class_code: 1,
            protocol_code: protocol,
            interface_number: 0,
            setting_number: setting,
            endpoints,
        }
    }

    #[test]
    fn bidirectional_wins_regardless_of_order() {
        let uni = printer_alt(0, 1, vec![bulk(0x01)]);
        let bidi = printer_alt(1, 2, vec![bulk(0x02), bulk(0x82)]);

        let forward = select_alt_setting(&[uni.clone(), bidi.clone()], None).unwrap();
        let backward = select_alt_setting(&[bidi, uni], None).unwrap();

        assert_eq!(forward.protocol, UsbProtocol::Bidirectional);
        assert_eq!(forward, backward);
        assert_eq!(forward.alt_setting, 1);
        assert_eq!(forward.write_endpoint, 0x02);
        assert_eq!(forward.read_endpoint, Some(0x82));
    }

    #[test]
    fn equal_protocol_adopts_later_setting() {
        let a = printer_alt(0, 2, vec![bulk(0x01), bulk(0x81)]);
        let b = printer_alt(1, 2, vec![bulk(0x03), bulk(0x83)]);
        let chosen = select_alt_setting(&[a, b], None).unwrap();
        assert_eq!(chosen.alt_setting, 1);
    }

    #[test]
    fn last_bulk_endpoint_per_direction_is_used() {
        let alt = printer_alt(
            0,
            2,
            vec![bulk(0x01), bulk(0x81), interrupt(0x83), bulk(0x02), bulk(0x84)],
        );
        let chosen = select_alt_setting(&[alt], None).unwrap();
        assert_eq!(chosen.write_index, 3);
        assert_eq!(chosen.write_endpoint, 0x02);
        assert_eq!(chosen.read_index, Some(4));
        assert_eq!(chosen.read_endpoint, Some(0x84));
    }

    #[test]
    fn candidate_without_write_endpoint_is_rejected() {
        let alt = printer_alt(0, 2, vec![bulk(0x81)]);
        assert_eq!(select_alt_setting(&[alt], None), None);
    }

    #[test]
    fn bidirectional_requires_read_endpoint() {
        let alt = printer_alt(0, 2, vec![bulk(0x01)]);
        assert_eq!(select_alt_setting(&[alt], None), None);
    }

    #[test]
    fn unidirectional_records_no_read_endpoint() {
        let alt = printer_alt(0, 1, vec![bulk(0x01), bulk(0x81)]);
        let chosen = select_alt_setting(&[alt], None).unwrap();
        assert_eq!(chosen.protocol, UsbProtocol::Unidirectional);
        assert_eq!(chosen.read_endpoint, None);
    }

    #[test]
    fn non_printer_settings_are_ignored() {
        let mut storage = printer_alt(0, 2, vec![bulk(0x01), bulk(0x81)]);
        storage.class_code = 0x08;
        let mut vendor = printer_alt(1, 3, vec![bulk(0x01), bulk(0x81)]);
        vendor.protocol_code = 0xff;
        let mut subclass = printer_alt(2, 2, vec![bulk(0x01), bulk(0x81)]);
        subclass.sub_class_code = 2;
        assert_eq!(select_alt_setting(&[storage, vendor, subclass], None), None);
    }

    #[test]
    fn lower_protocol_than_device_best_is_skipped() {
        let uni = printer_alt(0, 1, vec![bulk(0x01)]);
        assert_eq!(
            select_alt_setting(&[uni.clone()], Some(UsbProtocol::Bidirectional)),
            None
        );
        assert!(select_alt_setting(&[uni], Some(UsbProtocol::Unidirectional)).is_some());
    }

    #[test]
    fn device_filter_skips_incomplete_and_excluded_devices() {
        assert!(device_is_candidate(1, 0x03f0, 0x0517));
        assert!(!device_is_candidate(0, 0x03f0, 0x0517));
        assert!(!device_is_candidate(1, 0, 0x0517));
        assert!(!device_is_candidate(1, 0x03f0, 0));
        assert!(!device_is_candidate(1, EXCLUDED_VENDOR_ID, 0x1234));
    }
}
