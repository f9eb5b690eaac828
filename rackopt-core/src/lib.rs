//! Rackopt Core
//!
//! Core types shared by the rackopt worker and gateway.
//!
//! This crate contains:
//! - Domain types: storage results, script executions, pipeline outcomes
//! - DTOs: JSON bodies exchanged over the HTTP boundaries

pub mod domain;
pub mod dto;
