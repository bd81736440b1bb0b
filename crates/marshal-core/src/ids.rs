use std::fmt;

use serde::{Deserialize, Serialize};

/// Produces `count` random lowercase ASCII letters.
///
/// Shared by node identities, pool ids and locally-generated task ids so that
/// every random short tag in the system looks the same on the wire.
pub fn random_lowercase_tag(count: usize) -> String {
    use rand::Rng as _;
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

/// Identifies a task tracked by the Governor's process table.
///
/// For locally-submitted tasks this is a freshly generated tag. For tasks
/// injected by a [`Sidecar`](crate::CompletionHandler) it is the composite
/// `"<correlation-id>::<reply-queue>"` form described in the wire protocol,
/// preserved verbatim so the sidecar can split it back apart when routing
/// the final result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generates a fresh id for a task with no externally meaningful identity.
    pub fn generate() -> Self {
        Self(format!("{}:{}", std::process::id(), random_lowercase_tag(8)))
    }

    /// Builds the `correlation-id::reply-queue` composite id used by the
    /// broker sidecar.
    pub fn composite(correlation_id: &str, reply_to: &str) -> Self {
        Self(format!("{correlation_id}::{reply_to}"))
    }

    /// Splits a composite sidecar id back into `(correlation_id, reply_to)`.
    ///
    /// Round-trips with [`TaskId::composite`]: `split_composite` undoes
    /// exactly what `composite` does, even if `reply_to` itself contains
    /// `::`, because the split only ever happens once.
    pub fn split_composite(&self) -> Option<(&str, &str)> {
        self.0.split_once("::")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
