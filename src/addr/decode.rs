//! Socket-address record decoding.
//!
//! Turns the raw bytes of a fixed-layout socket-address record into an
//! [`IpAddress`], given the current platform's layout table. This is the
//! only place that knows how family codes and address bytes are arranged
//! inside those records; the walk code in the binding layer hands over
//! plain byte slices.

use crate::addr::IpAddress;
use crate::base::LookupError;
use crate::native::layout::{FamilyField, PlatformLayout};

/// Outcome of decoding one socket-address record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedAddress {
    Ip(IpAddress),
    /// Link-layer or otherwise unknown family. Callers drop the record.
    Unrepresentable { family_code: u16 },
}

/// Read the raw address-family code out of a socket-address record.
///
/// Returns `None` if the slice is too short to carry one.
pub fn family_code(bytes: &[u8], layout: &PlatformLayout) -> Option<u16> {
    match layout.family_field {
        FamilyField::U8AtOffset1 => bytes.get(1).map(|b| u16::from(*b)),
        FamilyField::U16AtOffset0 => {
            let raw: [u8; 2] = bytes.get(0..2)?.try_into().ok()?;
            // The family field is stored in host byte order.
            Some(u16::from_ne_bytes(raw))
        }
    }
}

/// Number of bytes the decoder needs to see for a record of this family,
/// or `None` when the family is not an IP family.
pub fn required_len(code: u16, layout: &PlatformLayout) -> Option<usize> {
    if code == layout.af_inet {
        Some(layout.v4_addr_offset + 4)
    } else if code == layout.af_inet6 {
        Some(layout.v6_addr_offset + 16)
    } else {
        None
    }
}

/// Decode one socket-address record.
///
/// IPv4: the four address bytes sit in the record in network order, so they
/// are already in display order, most-significant first. (Platforms that
/// expose the address as a host-order 32-bit integer need it reversed; the
/// byte view used here sidesteps that, which has historically been the bug
/// farm in this code path.)
///
/// IPv6: sixteen address bytes read as eight big-endian 16-bit groups,
/// rendered in the canonical expanded form. Shortening for display happens
/// in [`IpAddress`]'s `Display` impl, never here.
pub fn decode_sockaddr(
    bytes: &[u8],
    layout: &PlatformLayout,
) -> Result<DecodedAddress, LookupError> {
    let code = family_code(bytes, layout)
        .ok_or_else(|| LookupError::malformed("socket-address record too short"))?;

    if code == layout.af_inet {
        let off = layout.v4_addr_offset;
        let raw: [u8; 4] = bytes
            .get(off..off + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| LookupError::malformed("truncated v4 socket-address record"))?;
        Ok(DecodedAddress::Ip(IpAddress::from_v4_octets(raw)))
    } else if code == layout.af_inet6 {
        let off = layout.v6_addr_offset;
        let raw = bytes
            .get(off..off + 16)
            .ok_or_else(|| LookupError::malformed("truncated v6 socket-address record"))?;
        let mut groups = [0u16; 8];
        for (i, pair) in raw.chunks_exact(2).enumerate() {
            groups[i] = u16::from_be_bytes([pair[0], pair[1]]);
        }
        Ok(DecodedAddress::Ip(IpAddress::from_v6_groups(groups)))
    } else {
        Ok(DecodedAddress::Unrepresentable { family_code: code })
    }
}
