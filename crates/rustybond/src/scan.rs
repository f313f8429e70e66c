//! Bluetooth LE scan reports
//!
//! Advertising reports delivered during a scan are collected per peer into
//! a [`ScanReport`], which is handed out when the scan times out.

use crate::gap::PeerAddress;

// Advertising data types carrying the device name
const AD_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// The latest advertisement seen from one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub peer_address: PeerAddress,
    pub rssi: i8,
    pub name: Option<String>,
    /// Parsed (type, data) advertising structures
    pub advertising_data: Vec<(u8, Vec<u8>)>,
    /// Number of advertisements received from this peer
    pub seen: u32,
}

/// Advertisements collected over one scan, one entry per peer address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    entries: Vec<ScanEntry>,
}

impl ScanReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an advertising report, replacing older data from the same peer
    pub fn add_report(&mut self, peer_address: PeerAddress, rssi: i8, data: &[u8]) {
        let advertising_data = parse_advertising_data(data);
        let name = advertising_data
            .iter()
            .rev()
            .find(|(ad_type, _)| {
                *ad_type == AD_TYPE_COMPLETE_LOCAL_NAME || *ad_type == AD_TYPE_SHORT_LOCAL_NAME
            })
            .map(|(_, value)| String::from_utf8_lossy(value).into_owned());

        match self.entries.iter_mut().find(|e| e.peer_address == peer_address) {
            Some(entry) => {
                entry.rssi = rssi;
                entry.seen += 1;
                if name.is_some() {
                    entry.name = name;
                }
                entry.advertising_data = advertising_data;
            }
            None => self.entries.push(ScanEntry {
                peer_address,
                rssi,
                name,
                advertising_data,
                seen: 1,
            }),
        }
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    pub fn find(&self, peer_address: &PeerAddress) -> Option<&ScanEntry> {
        self.entries.iter().find(|e| e.peer_address == *peer_address)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Parse advertisement data into (type, data) tuples
///
/// Parsing stops at the first zero-length or truncated structure.
pub fn parse_advertising_data(data: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i] as usize;
        if length == 0 || i + length >= data.len() {
            break;
        }

        let ad_type = data[i + 1];
        let ad_data = data[i + 2..i + 1 + length].to_vec();

        result.push((ad_type, ad_data));

        i += 1 + length;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap::AddressType;

    fn addr(last: u8) -> PeerAddress {
        PeerAddress::new(AddressType::Public, [0, 1, 2, 3, 4, last])
    }

    #[test]
    fn test_parse_advertising_data() {
        // Flags, complete local name "Hi"
        let data = [0x02, 0x01, 0x06, 0x03, 0x09, b'H', b'i'];
        let parsed = parse_advertising_data(&data);
        assert_eq!(parsed, vec![(0x01, vec![0x06]), (0x09, b"Hi".to_vec())]);

        // Truncated trailing structure is dropped
        let data = [0x02, 0x01, 0x06, 0x05, 0x09, b'H'];
        assert_eq!(parse_advertising_data(&data).len(), 1);
        assert!(parse_advertising_data(&[]).is_empty());
    }

    #[test]
    fn test_report_merges_by_address() {
        let mut report = ScanReport::new();
        report.add_report(addr(1), -40, &[0x03, 0x09, b'A', b'B']);
        report.add_report(addr(2), -70, &[0x02, 0x01, 0x06]);
        report.add_report(addr(1), -45, &[0x02, 0x01, 0x06]);

        assert_eq!(report.entries().len(), 2);
        let entry = report.find(&addr(1)).unwrap();
        assert_eq!(entry.rssi, -45);
        assert_eq!(entry.seen, 2);
        // Name survives an advertisement without one
        assert_eq!(entry.name.as_deref(), Some("AB"));
        assert!(report.find(&addr(2)).unwrap().name.is_none());

        report.clear();
        assert!(report.entries().is_empty());
    }
}
