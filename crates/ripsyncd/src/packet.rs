//! RIP-v2 response decoding
//!
//! Wire layout (RFC 2453 section 4):
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +---------------+---------------+-------------------------------+
//! |  command (2)  |  version (2)  |       must be zero (0)        |
//! +---------------+---------------+-------------------------------+
//! |     address family (2)        |           route tag           |
//! +-------------------------------+-------------------------------+
//! |                           IP address                          |
//! |                          subnet mask                          |
//! |                           next hop                            |
//! |                            metric                             |
//! +---------------------------------------------------------------+
//! ```
//!
//! The route tag and next hop are ignored; the datagram sender is used
//! as the next hop instead.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;
use tracing::debug;

use crate::types::{
    RipEntry, AFI_INET, RIP_COMMAND_RESPONSE, RIP_ENTRY_LEN, RIP_HEADER_LEN, RIP_VERSION_2,
};

/// Reasons a whole datagram is discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Shorter than a RIP header
    #[error("packet too short ({len} bytes)")]
    TooShort { len: usize },

    /// Header is not a RIP-v2 response
    #[error("not a RIP-v2 response (header {header:02x?})")]
    NotRipV2 { header: [u8; 4] },

    /// Entry section is not a whole number of entries
    #[error("invalid entry section length {len}, not a multiple of 20")]
    InvalidLength { len: usize },
}

/// Check for the exact RIP-v2 response header `02 02 00 00`
pub fn is_rip_v2_response(buf: &[u8]) -> bool {
    buf.len() >= RIP_HEADER_LEN
        && buf[0] == RIP_COMMAND_RESPONSE
        && buf[1] == RIP_VERSION_2
        && buf[2] == 0
        && buf[3] == 0
}

/// Convert a subnet mask to a prefix length.
///
/// Returns the number of leading one bits for a contiguous, non-zero mask.
/// A zero mask or one with a set bit after the first clear bit yields 32.
pub fn mask_to_prefix_len(mask: u32) -> u8 {
    let ones = mask.leading_ones();
    let rest = mask.checked_shl(ones).unwrap_or(0);
    if mask == 0 || rest != 0 {
        32
    } else {
        ones as u8
    }
}

/// Decode one received datagram into its IPv4 route entries.
///
/// Entries whose address family is not IPv4 (including authentication
/// entries) are skipped. Any header or length problem discards the whole
/// datagram.
pub fn decode(buf: &[u8]) -> Result<Vec<RipEntry>, DecodeError> {
    if buf.len() < RIP_HEADER_LEN {
        return Err(DecodeError::TooShort { len: buf.len() });
    }

    if !is_rip_v2_response(buf) {
        return Err(DecodeError::NotRipV2 {
            header: [buf[0], buf[1], buf[2], buf[3]],
        });
    }

    let body = &buf[RIP_HEADER_LEN..];
    if body.len() % RIP_ENTRY_LEN != 0 {
        return Err(DecodeError::InvalidLength { len: body.len() });
    }

    let mut entries = Vec::with_capacity(body.len() / RIP_ENTRY_LEN);
    for record in body.chunks_exact(RIP_ENTRY_LEN) {
        let family = BigEndian::read_u16(&record[0..2]);
        if family != AFI_INET {
            debug!(family, "Skipping non-IPv4 route entry");
            continue;
        }

        let destination = Ipv4Addr::from(BigEndian::read_u32(&record[4..8]));
        let mask = BigEndian::read_u32(&record[8..12]);
        let metric = BigEndian::read_u32(&record[16..20]);

        entries.push(RipEntry::new(
            destination,
            mask_to_prefix_len(mask),
            metric,
        ));
    }

    Ok(entries)
}
