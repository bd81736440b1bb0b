//! The Broker Sidecar (C4): bridges a shared AMQP task queue into a local
//! Governor's inbox and routes completions back to the originator's reply
//! queue, per spec.md §4.4.

mod completion;
mod error;
mod sidecar;
mod wire;

pub use completion::SidecarCompletionHandler;
pub use error::SidecarError;
pub use sidecar::BrokerSidecar;
pub use wire::{InboundTaskWire, OutboundResultInner, OutboundResultSpec, OutboundResultWire, OutboundTaskSpecStub};
