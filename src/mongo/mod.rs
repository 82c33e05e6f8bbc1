//! MongoDB store for clients, branches, trackers and shadow agreements

pub mod client;
mod impl_tracker_store;
pub mod schemas;
pub mod traits;

pub use client::MongoStore;
pub use traits::TrackerStore;

#[cfg(test)]
pub(crate) mod mock;
