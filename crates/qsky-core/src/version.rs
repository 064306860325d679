//! Client version negotiation.
//!
//! Branch servers send their version on `ping`. A version is a dotted list
//! of unsigned integers; trailing zero components are insignificant, so
//! `2.1` and `2.1.0` are the same version.

use std::cmp::Ordering;
use std::str::FromStr;

use qsky_types::PingReply;

/// A version string that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed version {0:?}")]
pub struct VersionError(pub String);

/// A parsed dotted version.
#[derive(Debug, Clone)]
pub struct ClientVersion {
    raw: String,
    parts: Vec<u32>,
}

impl ClientVersion {
    /// Significant components, without trailing zeros.
    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl FromStr for ClientVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(VersionError(s.to_owned()));
        }
        let mut parts = raw
            .split('.')
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_parse| VersionError(s.to_owned()))?;
        while parts.last() == Some(&0) {
            parts.pop();
        }
        Ok(Self {
            raw: raw.to_owned(),
            parts,
        })
    }
}

impl PartialEq for ClientVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for ClientVersion {}

impl PartialOrd for ClientVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClientVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl core::fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Inclusive range of supported client versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    min: ClientVersion,
    max: ClientVersion,
}

impl VersionRange {
    /// Build a range from its bounds.
    pub const fn new(min: ClientVersion, max: ClientVersion) -> Self {
        Self { min, max }
    }

    /// Whether a raw client version lies within the range.
    ///
    /// Malformed versions are never supported.
    pub fn supports(&self, version: &str) -> bool {
        version
            .parse::<ClientVersion>()
            .is_ok_and(|v| self.min <= v && v <= self.max)
    }

    /// Answer a `ping` handshake.
    pub fn ping(&self, version: &str) -> PingReply {
        let supported = self.supports(version);
        tracing::info!(
            version,
            min = %self.min,
            max = %self.max,
            supported,
            "Ping"
        );
        PingReply { supported }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn v(s: &str) -> ClientVersion {
        s.parse().unwrap()
    }

    #[test]
    fn trailing_zeros_are_insignificant() {
        assert_eq!(v("2.1"), v("2.1.0"));
        assert_eq!(v("2.1.0").to_string(), "2.1.0");
        assert_eq!(v("3.0.0").parts(), &[3]);
    }

    #[test]
    fn ordering_is_numeric_per_component() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("1.2.1") > v("1.2"));
        assert!(v("0.9") < v("1"));
    }

    #[test]
    fn malformed_versions_fail_to_parse() {
        assert!("".parse::<ClientVersion>().is_err());
        assert!("1..2".parse::<ClientVersion>().is_err());
        assert!("1.2-beta".parse::<ClientVersion>().is_err());
    }

    #[test]
    fn range_is_inclusive() {
        let range = VersionRange::new(v("1.5"), v("2.0"));
        assert!(range.supports("1.5"));
        assert!(range.supports("1.7.3"));
        assert!(range.supports("2"));
        assert!(!range.supports("2.0.1"));
        assert!(!range.supports("1.4.9"));
        assert!(!range.supports("latest"));
    }

    #[test]
    fn ping_reports_legacy_code() {
        let range = VersionRange::new(v("1.0"), v("1.0"));
        assert_eq!(range.ping("1.0").code(), 1);
        assert_eq!(range.ping("1.1").code(), -1);
    }
}
