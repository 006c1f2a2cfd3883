//! Tree backend contracts, node types and an in-memory backend.

pub mod memory;
pub mod service;
pub mod types;
