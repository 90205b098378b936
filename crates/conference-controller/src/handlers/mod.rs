//! HTTP request handlers for the Conference Controller.

pub mod caller;

pub use caller::{echo_caller, Caller};
