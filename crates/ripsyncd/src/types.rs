//! Type definitions for ripsyncd

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use ripsync_common::RipsyncError;
use serde::Deserialize;

/// UDP port RIP speakers send from and to
pub const RIP_PORT: u16 = 520;

/// RIP-v2 multicast group (RIP2-ROUTERS.MCAST.NET)
pub const RIP_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 9);

/// RIP header length (command, version, must-be-zero)
pub const RIP_HEADER_LEN: usize = 4;

/// Size of one route entry on the wire
pub const RIP_ENTRY_LEN: usize = 20;

/// RIP command code for a response
pub const RIP_COMMAND_RESPONSE: u8 = 2;

/// RIP protocol version handled here
pub const RIP_VERSION_2: u8 = 2;

/// Address family identifier for IPv4 route entries
pub const AFI_INET: u16 = 2;

/// Receive buffer size for one datagram
pub const RECV_BUFFER_SIZE: usize = 1500;

/// Default egress interface
pub const DEFAULT_INTERFACE: &str = "eth0";

/// How often the control loop checks for a quiet network
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(3 * 60);

/// Silence after which all tracked routes are withdrawn
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Pause after a failed receive before trying again
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Capacity of the receive task -> control loop queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// One IPv4 route entry decoded from a RIP response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RipEntry {
    /// Destination network
    pub destination: Ipv4Addr,
    /// Prefix length derived from the subnet mask
    pub prefix_len: u8,
    /// Metric as carried on the wire (not range checked)
    pub metric: u32,
}

impl RipEntry {
    /// Create a new RipEntry
    pub fn new(destination: Ipv4Addr, prefix_len: u8, metric: u32) -> Self {
        Self {
            destination,
            prefix_len,
            metric,
        }
    }

    /// Attach the datagram sender, producing an advertisement
    pub fn advertised_by(self, source: Ipv4Addr) -> Advertisement {
        Advertisement {
            destination: self.destination,
            prefix_len: self.prefix_len,
            metric: self.metric,
            source,
        }
    }
}

/// A route advertised by a RIP speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Advertisement {
    /// Destination network
    pub destination: Ipv4Addr,
    /// Prefix length
    pub prefix_len: u8,
    /// Metric
    pub metric: u32,
    /// Sender of the datagram, used as the next hop
    pub source: Ipv4Addr,
}

impl Advertisement {
    /// Identity of the route this advertisement would install
    pub fn key(&self) -> RouteKey {
        RouteKey {
            destination: self.destination,
            prefix_len: self.prefix_len,
            metric: self.metric,
        }
    }
}

impl fmt::Display for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} via {} metric {}",
            self.destination, self.prefix_len, self.source, self.metric
        )
    }
}

/// Identity of an installed route.
///
/// The metric is part of the identity: the same prefix advertised with a
/// different metric is a distinct route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    /// Destination network
    pub destination: Ipv4Addr,
    /// Prefix length
    pub prefix_len: u8,
    /// Metric
    pub metric: u32,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} metric {}",
            self.destination, self.prefix_len, self.metric
        )
    }
}

/// A route this process has pushed into the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledRoute {
    /// Route identity
    pub key: RouteKey,
    /// Advertising peer at install time
    pub next_hop: Ipv4Addr,
}

impl From<&Advertisement> for InstalledRoute {
    fn from(adv: &Advertisement) -> Self {
        Self {
            key: adv.key(),
            next_hop: adv.source,
        }
    }
}

/// Operator-configured exclusion, matched exactly against advertisements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct RejectRule {
    /// Destination network
    pub destination: Ipv4Addr,
    /// Prefix length
    pub prefix_len: u8,
}

impl RejectRule {
    /// Create a new RejectRule
    pub fn new(destination: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            destination,
            prefix_len,
        }
    }

    /// Check whether this rule matches an advertisement
    pub fn matches(&self, adv: &Advertisement) -> bool {
        self.destination == adv.destination && self.prefix_len == adv.prefix_len
    }
}

impl fmt::Display for RejectRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.destination, self.prefix_len)
    }
}

impl FromStr for RejectRule {
    type Err = RipsyncError;

    /// Parse `a.b.c.d[/len]`; a missing length means a host route (/32)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, len) = match s.split_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (s, None),
        };

        let destination = addr.parse::<Ipv4Addr>().map_err(|_| {
            RipsyncError::invalid_config("reject", format!("invalid address in '{}'", s))
        })?;

        let prefix_len = match len {
            Some(len) => len
                .parse::<u8>()
                .ok()
                .filter(|len| *len <= 32)
                .ok_or_else(|| {
                    RipsyncError::invalid_config(
                        "reject",
                        format!("invalid prefix length in '{}'", s),
                    )
                })?,
            None => 32,
        };

        Ok(Self::new(destination, prefix_len))
    }
}

impl TryFrom<String> for RejectRule {
    type Error = RipsyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
