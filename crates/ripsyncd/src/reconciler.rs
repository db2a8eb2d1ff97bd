//! Route reconciler - mirrors accepted advertisements into the kernel
//!
//! The reconciler is the only owner of the installed-route set and the
//! last-accepted timestamp. It reacts to two event sources from a single
//! `select!`: advertisements arriving on a bounded queue and a periodic
//! expiry check. Route commands are awaited inline so kernel mutations
//! stay ordered with set mutations.

use std::time::Duration;

use ripsync_common::{CommandRunner, RipsyncResult};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::commands::{build_route_cmd, Platform, RouteAction};
use crate::filter::{FilterVerdict, RejectFilter};
use crate::route_set::InstalledRouteSet;
use crate::types::{
    Advertisement, InstalledRoute, RejectRule, DEFAULT_CHECK_INTERVAL, DEFAULT_QUIET_PERIOD,
};

/// Static reconciler settings
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Egress interface for installed routes
    pub interface: String,
    /// Route command syntax
    pub platform: Platform,
    /// Operator exclusions
    pub filter: RejectFilter,
    /// Period of the expiry check
    pub check_interval: Duration,
    /// Silence after which every tracked route is withdrawn
    pub quiet_period: Duration,
}

impl ReconcilerConfig {
    /// Create a config with default timers and no reject rules
    pub fn new(interface: impl Into<String>, platform: Platform) -> Self {
        Self {
            interface: interface.into(),
            platform,
            filter: RejectFilter::default(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }

    /// Replace the reject filter
    pub fn with_filter(mut self, filter: RejectFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Override the expiry timers
    pub fn with_timers(mut self, check_interval: Duration, quiet_period: Duration) -> Self {
        self.check_interval = check_interval;
        self.quiet_period = quiet_period;
        self
    }
}

/// What happened to one advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Dropped by a reject rule
    Rejected(RejectRule),
    /// Same identity already tracked, nothing run
    AlreadyInstalled,
    /// Route command succeeded, now tracked
    Installed,
    /// Kernel already had the route, now tracked
    AlreadyPresent,
    /// Route command failed, not tracked
    Failed,
}

impl InstallOutcome {
    /// Returns true if the advertisement refreshed the last-accepted time
    pub fn is_accepted(&self) -> bool {
        matches!(self, InstallOutcome::Installed | InstallOutcome::AlreadyPresent)
    }
}

/// What one expiry check did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// Nothing tracked
    Empty,
    /// An advertisement was accepted within the quiet period
    Fresh,
    /// Every tracked route was withdrawn and the set cleared
    Withdrawn {
        /// Delete commands issued
        attempted: usize,
        /// Delete commands that failed
        failed: usize,
    },
}

/// Single-owner route reconciliation state machine
pub struct RouteReconciler<R> {
    config: ReconcilerConfig,
    runner: R,
    routes: InstalledRouteSet,
    last_accepted: Option<Instant>,
}

impl<R: CommandRunner> RouteReconciler<R> {
    /// Create a reconciler with an empty route set
    pub fn new(config: ReconcilerConfig, runner: R) -> Self {
        info!(
            interface = %config.interface,
            platform = %config.platform,
            reject_rules = config.filter.rules().len(),
            "RouteReconciler initialized"
        );

        Self {
            config,
            runner,
            routes: InstalledRouteSet::new(),
            last_accepted: None,
        }
    }

    /// Tracked routes
    pub fn routes(&self) -> &InstalledRouteSet {
        &self.routes
    }

    /// Time of the last install or already-present result
    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }

    /// Process one advertisement received at `now`
    #[instrument(skip(self, adv, now), fields(route = %adv))]
    pub async fn handle_advertisement(&mut self, adv: Advertisement, now: Instant) -> InstallOutcome {
        if let FilterVerdict::Reject(rule) = self.config.filter.check(&adv) {
            info!(%rule, "Rejected route");
            return InstallOutcome::Rejected(rule);
        }

        if self.routes.contains(&adv.key()) {
            debug!("Route already installed");
            return InstallOutcome::AlreadyInstalled;
        }

        let route = InstalledRoute::from(&adv);
        let cmd = build_route_cmd(
            self.config.platform,
            RouteAction::Add,
            &route,
            &self.config.interface,
        );

        let outcome = match self.runner.run(cmd.program, &cmd.args).await {
            Ok(result) if result.success() => {
                info!(command = %cmd, "Installed route");
                InstallOutcome::Installed
            }
            Ok(result) if result.route_exists() => {
                info!(command = %cmd, "Route already present in kernel, tracking it");
                InstallOutcome::AlreadyPresent
            }
            Ok(result) => {
                warn!(
                    command = %cmd,
                    exit_code = result.exit_code,
                    output = %result.combined_output(),
                    "Cannot install route"
                );
                InstallOutcome::Failed
            }
            Err(e) => {
                warn!(command = %cmd, error = %e, "Cannot install route");
                InstallOutcome::Failed
            }
        };

        if outcome.is_accepted() {
            self.routes.insert(route);
            self.last_accepted = Some(now);
        }

        outcome
    }

    /// Run the expiry check at `now`
    #[instrument(skip(self, now))]
    pub async fn handle_tick(&mut self, now: Instant) -> ExpiryOutcome {
        if self.routes.is_empty() {
            return ExpiryOutcome::Empty;
        }

        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.config.quiet_period {
                debug!(tracked = self.routes.len(), "Advertisements still arriving");
                return ExpiryOutcome::Fresh;
            }
        }

        let routes = self.routes.drain();
        info!(
            count = routes.len(),
            quiet_secs = self.config.quiet_period.as_secs(),
            "Quiet period elapsed, withdrawing routes"
        );

        let mut failed = 0;
        for route in &routes {
            let cmd = build_route_cmd(
                self.config.platform,
                RouteAction::Delete,
                route,
                &self.config.interface,
            );

            match self.runner.run(cmd.program, &cmd.args).await {
                Ok(result) if result.success() => {
                    debug!(command = %cmd, "Withdrew route");
                }
                Ok(result) => {
                    failed += 1;
                    warn!(
                        command = %cmd,
                        exit_code = result.exit_code,
                        output = %result.combined_output(),
                        "Cannot remove route"
                    );
                }
                Err(e) => {
                    failed += 1;
                    warn!(command = %cmd, error = %e, "Cannot remove route");
                }
            }
        }

        ExpiryOutcome::Withdrawn {
            attempted: routes.len(),
            failed,
        }
    }

    /// Drive the reconciler until the advertisement queue closes.
    ///
    /// The first expiry check happens one check interval after start.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Advertisement>) -> RipsyncResult<()> {
        let period = self.config.check_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            check_secs = period.as_secs(),
            quiet_secs = self.config.quiet_period.as_secs(),
            "Reconciler running"
        );

        loop {
            tokio::select! {
                adv = rx.recv() => match adv {
                    Some(adv) => {
                        self.handle_advertisement(adv, Instant::now()).await;
                    }
                    None => {
                        info!(tracked = self.routes.len(), "Advertisement queue closed, stopping reconciler");
                        return Ok(());
                    }
                },
                _ = ticker.tick() => {
                    self.handle_tick(Instant::now()).await;
                }
            }
        }
    }
}
