//! Application initialization and resource setup.
//!
//! This module provides functions to initialize shared resources:
//! - The logger (plain or JSON, stderr or file)
//! - The Vidar HTTP client
//!
//! All initialization functions return proper error types for error handling.

mod client;
mod logger;

// Re-export public API
pub use client::init_vidar_client;
pub use logger::init_logger_with;
