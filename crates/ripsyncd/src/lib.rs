//! Passive RIP-v2 listener for the kernel routing table
//!
//! Listens for RIP-v2 responses on the RIP multicast group, installs every
//! advertised IPv4 route through the platform route tool, and withdraws all
//! of them once the network has been quiet for a configured period. It
//! never sends RIP packets itself.
//!
//! Data flow:
//!
//! ```text
//! socket -> receiver (packet::decode) -> mpsc -> reconciler -> route tool
//!                                                   |
//!                                             InstalledRouteSet
//! ```

pub mod commands;
pub mod config;
pub mod filter;
pub mod packet;
pub mod receiver;
pub mod reconciler;
pub mod route_set;
pub mod service;
pub mod types;

pub use commands::{build_route_cmd, Platform, RouteAction, RouteCommand};
pub use config::{Args, DaemonConfig, FileConfig};
pub use filter::{FilterVerdict, RejectFilter};
pub use packet::{decode, mask_to_prefix_len, DecodeError};
pub use receiver::{run_receiver, DatagramSource, UdpDatagramSource};
pub use reconciler::{ExpiryOutcome, InstallOutcome, ReconcilerConfig, RouteReconciler};
pub use route_set::InstalledRouteSet;
pub use service::serve;
pub use types::*;
