//! Visa tracker domain
//!
//! A tracker is the per-client aggregate of eight stage sub-documents plus
//! a derived progress summary and overall status.
//!
//! - `models`: stage, tracker and request/response types
//! - `stages`: stage dispatch table, merge and completion rules
//! - `progress`: roll-up over the seven counted stages
//! - `manager`: operations over the store, blob store and event bus

pub mod dates;
mod error;
pub mod manager;
pub mod models;
pub mod progress;
pub mod stages;

pub use error::{TrackerError, TrackerResult};
pub use manager::TrackerManager;
pub use models::*;
pub use stages::StageKind;
