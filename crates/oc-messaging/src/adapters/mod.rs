//! # Adapters
//!
//! In-process implementations of the outbound ports.

pub mod clock;
pub mod event_log;
pub mod receiver;

pub use clock::{ManualClock, SystemClock};
pub use event_log::{InMemoryEventLog, TracingEventSink};
pub use receiver::{Delivery, FnReceiver, RecordingReceiver};
