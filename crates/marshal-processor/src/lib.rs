//! The Isolated Processor (C2): spawns one OS process per admitted task by
//! re-executing the current binary as `marshald worker`, and feeds its
//! single-line JSON result back into the Governor's inbox.

mod broker_backed;
mod local;
mod process;
mod protocol;
mod worker;

pub use broker_backed::BrokerBackedLauncher;
pub use local::LocalLauncher;
pub use protocol::{BrokerConfig, WorkerRequest};
pub use worker::run_worker;
