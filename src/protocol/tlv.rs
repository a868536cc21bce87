//! Thread TLV encoding
//!
//! Every TLV is a one-byte type and a one-byte length followed by the value.
//! A length byte of `0xff` announces an extended TLV whose real length follows
//! as a big-endian `u16`.

use std::net::Ipv6Addr;

use bytes::{BufMut, BytesMut};

use crate::core::InterfaceIdentifier;

/// Length byte that announces a two-byte extended length
pub const EXTENDED_LENGTH: u8 = 0xff;

/// Size of one entry in an IPv6 Addresses TLV
pub const IPV6_ADDRESS_SIZE: usize = 16;

/// Thread TLV types used by the registration protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TlvType {
    /// Target address (16 bytes)
    Target = 0,
    /// Mesh-local EID interface identifier (8 bytes)
    MeshLocalEid = 3,
    /// Status (1 byte)
    Status = 4,
    /// Time since the last transaction (4 bytes)
    LastTransactionTime = 6,
    /// Registration timeout in seconds (4 bytes)
    Timeout = 11,
    /// Concatenated 16-byte addresses
    Ipv6Addresses = 14,
    /// Commissioner session id (2 bytes)
    CommissionerSessionId = 15,
}

impl TlvType {
    /// Converts to the wire byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A TLV borrowed from a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// Raw type byte
    pub tlv_type: u8,
    /// Value bytes
    pub value: &'a [u8],
}

/// Iterator over the TLVs of a payload
///
/// Iteration stops at the first truncated TLV.
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
    remaining: &'a [u8],
}

impl<'a> TlvIter<'a> {
    /// Iterates the TLVs in `payload`
    pub fn new(payload: &'a [u8]) -> Self {
        TlvIter { remaining: payload }
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Tlv<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&tlv_type, rest) = self.remaining.split_first()?;
        let (&length, rest) = rest.split_first()?;

        let (length, rest) = if length == EXTENDED_LENGTH {
            if rest.len() < 2 {
                self.remaining = &[];
                return None;
            }
            (usize::from(u16::from_be_bytes([rest[0], rest[1]])), &rest[2..])
        } else {
            (usize::from(length), rest)
        };

        if rest.len() < length {
            self.remaining = &[];
            return None;
        }

        let (value, rest) = rest.split_at(length);
        self.remaining = rest;
        Some(Tlv { tlv_type, value })
    }
}

/// Finds the value of the first TLV of `tlv_type`
pub fn find(payload: &[u8], tlv_type: TlvType) -> Option<&[u8]> {
    TlvIter::new(payload)
        .find(|tlv| tlv.tlv_type == tlv_type.to_byte())
        .map(|tlv| tlv.value)
}

/// Finds a TLV and reads its leading `N` bytes
///
/// A TLV shorter than `N` is treated as absent.
pub fn find_array<const N: usize>(payload: &[u8], tlv_type: TlvType) -> Option<[u8; N]> {
    let value = find(payload, tlv_type)?;
    let head = value.get(..N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Some(out)
}

/// Finds a one-byte TLV
pub fn find_u8(payload: &[u8], tlv_type: TlvType) -> Option<u8> {
    find_array::<1>(payload, tlv_type).map(|[b]| b)
}

/// Finds a big-endian `u16` TLV
pub fn find_u16(payload: &[u8], tlv_type: TlvType) -> Option<u16> {
    find_array::<2>(payload, tlv_type).map(u16::from_be_bytes)
}

/// Finds a big-endian `u32` TLV
pub fn find_u32(payload: &[u8], tlv_type: TlvType) -> Option<u32> {
    find_array::<4>(payload, tlv_type).map(u32::from_be_bytes)
}

/// Finds a 16-byte address TLV
pub fn find_address(payload: &[u8], tlv_type: TlvType) -> Option<Ipv6Addr> {
    find_array::<16>(payload, tlv_type).map(Ipv6Addr::from)
}

/// Finds an 8-byte interface identifier TLV
pub fn find_iid(payload: &[u8], tlv_type: TlvType) -> Option<InterfaceIdentifier> {
    find_array::<8>(payload, tlv_type).map(InterfaceIdentifier)
}

/// Splits an IPv6 Addresses TLV value into addresses
///
/// Trailing bytes that do not form a whole address are ignored; callers check
/// the length first.
pub fn addresses(value: &[u8]) -> impl Iterator<Item = Ipv6Addr> + '_ {
    value.chunks_exact(IPV6_ADDRESS_SIZE).map(|chunk| {
        let mut octets = [0u8; IPV6_ADDRESS_SIZE];
        octets.copy_from_slice(chunk);
        Ipv6Addr::from(octets)
    })
}

/// Writes the type and length header of a TLV
fn put_header(buf: &mut BytesMut, tlv_type: TlvType, length: usize) {
    buf.put_u8(tlv_type.to_byte());
    match u8::try_from(length) {
        Ok(length) if length != EXTENDED_LENGTH => buf.put_u8(length),
        _ => {
            debug_assert!(length <= usize::from(u16::MAX));
            buf.put_u8(EXTENDED_LENGTH);
            buf.put_u16(length as u16);
        }
    }
}

/// Appends a TLV with an arbitrary value
pub fn append(buf: &mut BytesMut, tlv_type: TlvType, value: &[u8]) {
    put_header(buf, tlv_type, value.len());
    buf.put_slice(value);
}

/// Appends a one-byte TLV
pub fn append_u8(buf: &mut BytesMut, tlv_type: TlvType, value: u8) {
    append(buf, tlv_type, &[value]);
}

/// Appends a big-endian `u16` TLV
pub fn append_u16(buf: &mut BytesMut, tlv_type: TlvType, value: u16) {
    append(buf, tlv_type, &value.to_be_bytes());
}

/// Appends a big-endian `u32` TLV
pub fn append_u32(buf: &mut BytesMut, tlv_type: TlvType, value: u32) {
    append(buf, tlv_type, &value.to_be_bytes());
}

/// Appends an IPv6 Addresses TLV
pub fn append_addresses(buf: &mut BytesMut, addresses: &[Ipv6Addr]) {
    put_header(buf, TlvType::Ipv6Addresses, addresses.len() * IPV6_ADDRESS_SIZE);
    for address in addresses {
        buf.put_slice(&address.octets());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_scalars() {
        let mut buf = BytesMut::new();
        append_u16(&mut buf, TlvType::CommissionerSessionId, 0x1234);
        append_u32(&mut buf, TlvType::Timeout, 3600);
        append_u8(&mut buf, TlvType::Status, 5);

        assert_eq!(find_u16(&buf, TlvType::CommissionerSessionId), Some(0x1234));
        assert_eq!(find_u32(&buf, TlvType::Timeout), Some(3600));
        assert_eq!(find_u8(&buf, TlvType::Status), Some(5));
        assert_eq!(find(&buf, TlvType::Target), None);
    }

    #[test]
    fn test_short_value_is_absent() {
        let mut buf = BytesMut::new();
        append(&mut buf, TlvType::Timeout, &[0, 1]);
        assert_eq!(find_u32(&buf, TlvType::Timeout), None);
        assert_eq!(find(&buf, TlvType::Timeout), Some(&[0u8, 1][..]));
    }

    #[test]
    fn test_truncated_tlv_stops_iteration() {
        // Status TLV, then a Target TLV claiming 16 bytes but carrying 3
        let payload = [4u8, 1, 0, 0, 16, 1, 2, 3];
        let tlvs: Vec<_> = TlvIter::new(&payload).collect();
        assert_eq!(tlvs.len(), 1);
        assert_eq!(find_address(&payload, TlvType::Target), None);
    }

    #[test]
    fn test_extended_length() {
        let value = vec![0xabu8; 300];
        let mut buf = BytesMut::new();
        append(&mut buf, TlvType::Ipv6Addresses, &value);
        assert_eq!(&buf[..4], &[14, 0xff, 0x01, 0x2c]);
        assert_eq!(find(&buf, TlvType::Ipv6Addresses).map(<[u8]>::len), Some(300));

        // A value of exactly 255 bytes cannot use the short form
        let mut buf = BytesMut::new();
        append(&mut buf, TlvType::Ipv6Addresses, &[0u8; 255]);
        assert_eq!(&buf[..4], &[14, 0xff, 0x00, 0xff]);
    }

    #[test]
    fn test_addresses() {
        let a: Ipv6Addr = "ff04::1".parse().unwrap();
        let b: Ipv6Addr = "ff05::2".parse().unwrap();
        let mut buf = BytesMut::new();
        append_addresses(&mut buf, &[a, b]);
        assert_eq!(buf[1], 32);

        let value = find(&buf, TlvType::Ipv6Addresses).unwrap();
        let parsed: Vec<_> = addresses(value).collect();
        assert_eq!(parsed, vec![a, b]);
    }

    #[test]
    fn test_first_tlv_wins() {
        let mut buf = BytesMut::new();
        append_u32(&mut buf, TlvType::Timeout, 1);
        append_u32(&mut buf, TlvType::Timeout, 2);
        assert_eq!(find_u32(&buf, TlvType::Timeout), Some(1));
    }
}
