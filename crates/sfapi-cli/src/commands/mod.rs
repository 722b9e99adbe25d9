//! CLI command implementations.

pub mod auth;
pub mod batch;
pub mod cancel;
pub mod common;
pub mod status;
pub mod wait;
