//! [`FailureSink`](kite_core::FailureSink) implementations.

mod channel;
mod log;

pub use channel::ChannelSink;
pub use log::LogSink;
