//! Sandbox module containing all execution-related components.

pub mod callbacks;
pub mod config;
pub mod executor;
pub mod limits;
pub mod memory;
pub mod module;
pub mod session;
