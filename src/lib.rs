//! Storage gateway retrieval service
//!
//! Reconstructs files from erasure-coded fragments held by storage miners and
//! keeps durable records of asynchronous file operations.

pub mod app_state;
pub mod chain;
pub mod config;
pub mod error;
pub mod peer;
pub mod retrieve;
pub mod service;
pub mod track;
pub mod types;

pub use error::{GatewayError, Result};
