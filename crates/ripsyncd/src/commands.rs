//! Route command builders
//!
//! Each supported kernel family gets one [`Platform`] variant; adding a
//! platform means adding a variant and its argument template.

use std::fmt;
use std::str::FromStr;

use ripsync_common::shell;
use ripsync_common::{RipsyncError, RipsyncResult};

use crate::types::InstalledRoute;

/// Route command syntax family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// iproute2 `ip route`
    Linux,
    /// BSD `route -n`
    Darwin,
}

impl Platform {
    /// Platform of the running build target
    pub fn current() -> RipsyncResult<Self> {
        std::env::consts::OS.parse()
    }

    /// Identifier accepted by [`FromStr`]
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = RipsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "darwin" | "macos" => Ok(Platform::Darwin),
            other => Err(RipsyncError::unsupported_platform(other)),
        }
    }
}

/// Kernel route mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// Install a route
    Add,
    /// Withdraw a route
    Delete,
}

impl RouteAction {
    fn verb(&self, platform: Platform) -> &'static str {
        match (platform, self) {
            (_, RouteAction::Add) => "add",
            (Platform::Linux, RouteAction::Delete) => "del",
            (Platform::Darwin, RouteAction::Delete) => "delete",
        }
    }
}

/// An external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteCommand {
    /// Program path
    pub program: &'static str,
    /// Argument vector
    pub args: Vec<String>,
}

impl fmt::Display for RouteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell::render_command(self.program, &self.args))
    }
}

/// Build a route add/delete command
///
/// The route's install-time next hop is used for both actions, so the
/// delete matches what was added.
pub fn build_route_cmd(
    platform: Platform,
    action: RouteAction,
    route: &InstalledRoute,
    interface: &str,
) -> RouteCommand {
    let prefix = format!("{}/{}", route.key.destination, route.key.prefix_len);
    let verb = action.verb(platform).to_string();

    match platform {
        Platform::Linux => RouteCommand {
            program: shell::IP_CMD,
            args: vec![
                "route".to_string(),
                verb,
                prefix,
                "via".to_string(),
                route.next_hop.to_string(),
                "dev".to_string(),
                interface.to_string(),
                "proto".to_string(),
                "rip".to_string(),
                "metric".to_string(),
                route.key.metric.to_string(),
            ],
        },
        Platform::Darwin => RouteCommand {
            program: shell::ROUTE_CMD,
            args: vec![
                "-n".to_string(),
                verb,
                "-net".to_string(),
                prefix,
                route.next_hop.to_string(),
            ],
        },
    }
}
