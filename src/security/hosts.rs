//! Target hostname allow-list.
//!
//! Same open-when-empty rule as the client list.

use std::collections::HashSet;

/// Decides whether a target hostname may be forwarded to.
#[derive(Debug, Clone, Default)]
pub struct HostAllowList {
    hosts: HashSet<String>,
}

impl HostAllowList {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { hosts }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Case-insensitive exact match.
    pub fn allow(&self, host: &str) -> bool {
        self.hosts.is_empty() || self.hosts.contains(&host.to_ascii_lowercase())
    }
}
