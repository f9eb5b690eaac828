//! Core domain types
//!
//! These types describe what a single optimization job produces. They are
//! shared between the storage layer, the script runner and the pipeline.

pub mod execution;
pub mod pipeline;
pub mod storage;
