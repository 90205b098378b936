//! Common types shared across the conference controller crates.

#![warn(clippy::pedantic)]

/// Module for common error types
pub mod error;

/// Module for telephony resource keys
pub mod types;

/// Module for channel origination descriptors
pub mod origination;
