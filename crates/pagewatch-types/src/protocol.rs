//! Protocol generations and debugging domains.
//!
//! The automation endpoint exposes several incompatible generations of the
//! same debugging domains. Each generation we can bind against is a
//! [`ProtocolVersion`] variant; capability resolution picks the newest
//! generation for which every required [`Domain`] resolves.

/// A protocol generation with compiled-in adapters.
///
/// Ordered by generation number, so `V85 < V112 < V120`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    V85,
    V112,
    V120,
}

impl ProtocolVersion {
    /// All supported generations, oldest first.
    pub const ALL: [ProtocolVersion; 3] =
        [ProtocolVersion::V85, ProtocolVersion::V112, ProtocolVersion::V120];

    /// Parse an advertised generation tag such as `"V112"`.
    ///
    /// Returns `None` for tags that parse but have no compiled-in adapters,
    /// and for tags that are not of the `V<number>` form at all.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match parse_version_number(tag)? {
            85 => Some(ProtocolVersion::V85),
            112 => Some(ProtocolVersion::V112),
            120 => Some(ProtocolVersion::V120),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        match self {
            ProtocolVersion::V85 => 85,
            ProtocolVersion::V112 => 112,
            ProtocolVersion::V120 => 120,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ProtocolVersion::V85 => "V85",
            ProtocolVersion::V112 => "V112",
            ProtocolVersion::V120 => "V120",
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Extract the numeric part of a `V<number>` generation tag.
pub fn parse_version_number(tag: &str) -> Option<u32> {
    let digits = tag.strip_prefix('V').or_else(|| tag.strip_prefix('v'))?;
    digits.parse().ok()
}

/// A named grouping of commands and events in the remote debugging
/// interface.
///
/// Network, console, and performance are the monitoring domains; the
/// runtime domain backs page-script evaluation and must resolve for a
/// generation to be considered usable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Network,
    Console,
    Performance,
    Runtime,
}

impl Domain {
    /// Every domain a generation must resolve before it is selected.
    pub const ALL: [Domain; 4] =
        [Domain::Network, Domain::Console, Domain::Performance, Domain::Runtime];

    /// The three domains with an enable/disable lifecycle.
    pub const MONITORING: [Domain; 3] = [Domain::Network, Domain::Console, Domain::Performance];

    pub fn name(self) -> &'static str {
        match self {
            Domain::Network => "Network",
            Domain::Console => "Console",
            Domain::Performance => "Performance",
            Domain::Runtime => "Runtime",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for version in ProtocolVersion::ALL {
            assert_eq!(ProtocolVersion::from_tag(version.tag()), Some(version));
        }
    }

    #[test]
    fn lowercase_tag_accepted() {
        assert_eq!(ProtocolVersion::from_tag("v112"), Some(ProtocolVersion::V112));
    }

    #[test]
    fn unknown_generation_is_rejected() {
        assert_eq!(ProtocolVersion::from_tag("V113"), None);
        assert_eq!(ProtocolVersion::from_tag("V999"), None);
    }

    #[test]
    fn malformed_tags_are_rejected() {
        assert_eq!(parse_version_number("stable"), None);
        assert_eq!(parse_version_number("V"), None);
        assert_eq!(parse_version_number("Vx"), None);
    }

    #[test]
    fn versions_order_by_generation_number() {
        assert!(ProtocolVersion::V120 > ProtocolVersion::V112);
        assert!(ProtocolVersion::V112 > ProtocolVersion::V85);
    }
}
