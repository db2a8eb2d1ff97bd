//! Reject filter for operator-excluded prefixes

use ripsync_common::RipsyncResult;

use crate::types::{Advertisement, RejectRule};

/// Outcome of running an advertisement through the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Route may be installed
    Accept,
    /// Route matched this rule
    Reject(RejectRule),
}

/// Static list of reject rules.
///
/// Matching is on exact (destination, prefix length) equality; a rule for
/// 10.0.0.0/8 does not reject 10.1.0.0/16.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectFilter {
    rules: Vec<RejectRule>,
}

impl RejectFilter {
    /// Create a filter from a rule list
    pub fn new(rules: Vec<RejectRule>) -> Self {
        Self { rules }
    }

    /// Parse a `;`-separated rule list such as `10.0.0.0/8;192.168.1.1`.
    ///
    /// Blank segments are ignored.
    pub fn parse(list: &str) -> RipsyncResult<Self> {
        let rules = list
            .split(';')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::parse::<RejectRule>)
            .collect::<RipsyncResult<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    /// Configured rules
    pub fn rules(&self) -> &[RejectRule] {
        &self.rules
    }

    /// Returns true if no rules are configured
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check an advertisement against the rules
    pub fn check(&self, adv: &Advertisement) -> FilterVerdict {
        match self.rules.iter().find(|rule| rule.matches(adv)) {
            Some(rule) => FilterVerdict::Reject(*rule),
            None => FilterVerdict::Accept,
        }
    }
}
