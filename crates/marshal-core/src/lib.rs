//! The Governor: the in-process control plane described in spec.md —
//! admission against a capacity budget, a single-consumer inbox
//! multiplexing submissions/results/termination, and the process table
//! that tracks isolated worker processes.

mod capacity;
mod error;
mod governor;
mod identity;
mod ids;
mod message;
mod model;
mod table;
mod whitelist;

pub use capacity::CapacityCounter;
pub use error::GovernorError;
pub use governor::{
    CompletionHandler, Governor, GovernorHandle, ProcessorLauncher, DEFAULT_DEAD_MAN_TIMEOUT,
    DEFAULT_PREVIOUS_TASKS_CAPACITY,
};
pub use identity::{default_max_concurrent_tasks, NodeIdentity};
pub use ids::{random_lowercase_tag, TaskId};
pub use message::{CallbackTag, InboxMessage, KwArgs, ResultPayload, TaskResult, TaskSpec, TaskSubmit};
pub use model::{Model, ModelError, SubtaskDef, SubtaskFailure, SubtaskOutcome};
pub use table::{GovernorTables, ProcessEntry};
pub use whitelist::Whitelist;
