//! # hv-comm
//!
//! Point-to-point and collective communication between worker ranks.
//!
//! The [`Communicator`] trait captures the small, closed message surface the
//! search coordinator needs: fire-and-forget sends to every peer, a
//! termination sentinel, a non-blocking drain of pending messages, and an
//! all-gather collective. [`ChannelCommunicator`] implements it over a fixed
//! mesh of crossbeam channels.

mod channel;
mod communicator;
mod message;

pub use channel::ChannelCommunicator;
pub use communicator::Communicator;
pub use message::{Drained, Message, RecordBatch};
