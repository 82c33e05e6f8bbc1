//! HTTP API for the visa tracker

pub mod event_handlers;
pub mod file_handlers;
pub mod handlers;
pub mod routes;
pub mod stage_handlers;
pub mod upload;

pub use routes::create_router;
