use std::fmt;

use crate::ids::random_lowercase_tag;

/// A node's identity for the lifetime of the governor process: `pid:tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pid: u32,
    tag: String,
}

impl NodeIdentity {
    pub fn generate() -> Self {
        Self {
            pid: std::process::id(),
            tag: random_lowercase_tag(5),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pid, self.tag)
    }
}

/// Default `max_concurrent_tasks`: the number of usable CPUs.
pub fn default_max_concurrent_tasks() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
