//! Shared numeric helpers.

pub mod decimal;
pub mod stats;
