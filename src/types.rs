/*!
 * Core identifiers shared across components.
 */

use std::fmt;

/// A cluster node identifier, e.g. `"WU01"` or `"CU"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node(pub String);

impl Node {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True iff this is the control unit rather than a worker node.
    pub fn is_control_unit(&self) -> bool {
        self.0 == "CU"
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node(s)
    }
}

/// A share identifier, e.g. `"E$"`. The trailing `$` is part of the share's
/// name on the wire but is stripped when forming the local mount subpath.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Share(pub String);

impl Share {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The share name with any trailing `$` stripped, for forming mount
    /// subpaths (e.g. `"E$"` -> `"E"`).
    pub fn mount_subpath(&self) -> &str {
        self.0.strip_suffix('$').unwrap_or(&self.0)
    }
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Share {
    fn from(s: &str) -> Self {
        Share(s.to_string())
    }
}

impl From<String> for Share {
    fn from(s: String) -> Self {
        Share(s)
    }
}

/// Hard invariant of the cluster: exactly 13 worker nodes contribute raw
/// fragments to each capture. Used as the completion quorum.
pub const WORKER_QUORUM: usize = 13;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_strips_trailing_dollar() {
        assert_eq!(Share::from("E$").mount_subpath(), "E");
        assert_eq!(Share::from("E").mount_subpath(), "E");
    }

    #[test]
    fn node_identifies_control_unit() {
        assert!(Node::from("CU").is_control_unit());
        assert!(!Node::from("WU01").is_control_unit());
    }
}
