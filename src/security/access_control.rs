//! Client address allow-list.
//!
//! # Design Decisions
//! - Exact addresses live in a hash set, ranges in declaration order
//! - Built once at startup, read concurrently without locking
//! - An empty list allows every client. This is the configured open
//!   mode, not a fallback: a deployment that forgets the list runs an
//!   open proxy, so startup logs it loudly.

use std::collections::HashSet;
use std::net::{AddrParseError, IpAddr};

use ipnet::{AddrParseError as NetParseError, IpNet};
use thiserror::Error;

/// A malformed allow-list entry.
#[derive(Debug, Error)]
pub enum AclError {
    #[error("invalid cidr: {literal}")]
    InvalidRange {
        literal: String,
        #[source]
        source: NetParseError,
    },

    #[error("invalid ip: {literal}")]
    InvalidAddress {
        literal: String,
        #[source]
        source: AddrParseError,
    },
}

/// Decides whether a client address may use the proxy.
#[derive(Debug, Clone, Default)]
pub struct AccessControlList {
    addresses: HashSet<IpAddr>,
    ranges: Vec<IpNet>,
}

impl AccessControlList {
    /// Build the list from address and range literals.
    ///
    /// Blank entries are skipped. Any malformed entry fails the whole list.
    pub fn from_rules<I, S>(rules: I) -> Result<Self, AclError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut acl = Self::default();

        for rule in rules {
            let rule = rule.as_ref().trim();
            if rule.is_empty() {
                continue;
            }

            if rule.contains('/') {
                let net: IpNet = rule.parse().map_err(|source| AclError::InvalidRange {
                    literal: rule.to_string(),
                    source,
                })?;
                acl.ranges.push(net.trunc());
                continue;
            }

            let addr: IpAddr = rule.parse().map_err(|source| AclError::InvalidAddress {
                literal: rule.to_string(),
                source,
            })?;
            acl.addresses.insert(addr.to_canonical());
        }

        Ok(acl)
    }

    /// True when no rule was configured.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.ranges.is_empty()
    }

    /// Number of configured rules (addresses plus ranges).
    pub fn len(&self) -> usize {
        self.addresses.len() + self.ranges.len()
    }

    pub fn allow(&self, addr: IpAddr) -> bool {
        if self.is_empty() {
            return true;
        }

        let addr = addr.to_canonical();
        if self.addresses.contains(&addr) {
            return true;
        }
        self.ranges.iter().any(|net| net.contains(&addr))
    }
}
