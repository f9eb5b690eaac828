//! Data Transfer Objects for the HTTP boundaries
//!
//! JSON bodies exchanged between the uploading client, the gateway and the
//! worker. Field names match the wire format exactly.

pub mod common;
pub mod optimization;
pub mod upload;
