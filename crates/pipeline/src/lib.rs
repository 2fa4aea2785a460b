//! Streaming fan-out of per-object results.
//!
//! A command runs in two halves that execute concurrently:
//!
//! 1. A producer task turns its input (a list of keys, or a lazy "everything"
//!    source) into an ordered [`ResultStream`] through a bounded channel
//!    ([`per_key_action`], [`drain`], [`duplicates`], [`channel::spawn`]).
//! 2. The caller consumes that stream, either record by record through an
//!    [`Emitter`] ([`bridge`]) or as a single byte payload whose declared
//!    length decides whether its copy gets a progress view
//!    ([`bridge_payload`], [`present`]).
//!
//! Everything is cancelled through one shared
//! [`CancellationToken`](tokio_util::sync::CancellationToken); cancellation
//! ends streams early but is never reported as an error.

mod assemble;
mod bridge;
pub mod channel;
mod dispatch;
pub mod error;
mod present;

pub use crate::assemble::{Payload, assemble};
pub use crate::bridge::{Emitter, Entry, PARTIAL_FAILURE, Report, bridge, bridge_payload};
pub use crate::channel::{ResultSender, ResultStream};
pub use crate::dispatch::{CHANNEL_CAPACITY, FromInvalidKey, drain, duplicates, per_key_action};
pub use crate::present::{EmissionPlan, PROGRESS_BAR_MIN_SIZE, present};
