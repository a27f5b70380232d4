//! Admission filters

use std::collections::HashSet;
use std::net::IpAddr;

/// Decides whether a peer may connect at all
pub trait ConnectionFilter: Send + Sync {
    fn is_allowed(&self, addr: IpAddr) -> bool;
}

impl<F> ConnectionFilter for F
where
    F: Fn(IpAddr) -> bool + Send + Sync,
{
    fn is_allowed(&self, addr: IpAddr) -> bool {
        self(addr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Allow,
    Deny,
}

/// Filter backed by a fixed address list
#[derive(Debug, Clone)]
pub struct AddressFilter {
    mode: Mode,
    addresses: HashSet<IpAddr>,
}

impl AddressFilter {
    /// Admit only the listed addresses
    pub fn allow_only(addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            mode: Mode::Allow,
            addresses: addresses.into_iter().collect(),
        }
    }

    /// Admit everything except the listed addresses
    pub fn deny(addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            mode: Mode::Deny,
            addresses: addresses.into_iter().collect(),
        }
    }
}

impl ConnectionFilter for AddressFilter {
    fn is_allowed(&self, addr: IpAddr) -> bool {
        // IPv4-mapped IPv6 peers are matched as plain IPv4
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, IpAddr::V4),
            v4 => v4,
        };
        let listed = self.addresses.contains(&addr);
        match self.mode {
            Mode::Allow => listed,
            Mode::Deny => !listed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_allow_only() {
        let filter = AddressFilter::allow_only([ip("10.0.0.1")]);
        assert!(filter.is_allowed(ip("10.0.0.1")));
        assert!(!filter.is_allowed(ip("10.0.0.2")));
        assert!(filter.is_allowed(ip("::ffff:10.0.0.1")));
    }

    #[test]
    fn test_deny() {
        let filter = AddressFilter::deny([ip("192.168.1.9")]);
        assert!(!filter.is_allowed(ip("192.168.1.9")));
        assert!(filter.is_allowed(ip("::1")));
    }

    #[test]
    fn test_closure_filter() {
        let filter = |addr: IpAddr| addr.is_loopback();
        assert!(filter.is_allowed(ip("127.0.0.1")));
        assert!(!filter.is_allowed(ip("8.8.8.8")));
    }
}
