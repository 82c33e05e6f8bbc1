//! Tracker change events
//!
//! - `TrackerEvent`: emitted after every successful tracker write
//! - `EventBus`: broadcast channel feeding the SSE endpoint

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{EventEmitter, TrackerAction, TrackerEvent};
