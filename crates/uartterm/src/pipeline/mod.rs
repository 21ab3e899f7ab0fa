//! Receive pipeline: device notifications push chunks into the inbound queue,
//! the batching pump drains it on its own thread and forwards text to the
//! view through the sink dispatcher.

pub mod cancel;
pub mod pump;
pub mod queue;
pub mod sink;
pub mod text;

pub use pump::{BatchingPump, PumpSettings, PumpState, StopOutcome};
pub use queue::{Chunk, InboundQueue};
pub use sink::{Pending, SinkError, SinkHandle, SinkHost, TextView};
