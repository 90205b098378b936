//! # CC Test Utilities
//!
//! Mocks and fixtures for testing the Conference Controller without a
//! telephony backend.
//!
//! - `mock_driver` - `MockDriver`: call recording, failure injection and an
//!   in-memory event bus
//! - `fixtures` - Resource keys, typed events and raw ARI bodies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cc_test_utils::{fixtures, MockDriver, Operation};
//! use conference_controller::driver::Driver;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let mock = MockDriver::builder().with_bridge_id("B-auto").build();
//!     let driver: Arc<dyn Driver> = mock.clone();
//!
//!     // start a Dispatcher on `driver`, then
//!     mock.emit(fixtures::call_started("C1"));
//!     assert!(mock.wait_for_calls(Operation::AddChannel, 1, Duration::from_secs(1)).await);
//! }
//! ```

pub mod fixtures;
pub mod mock_driver;

pub use mock_driver::{DriverCall, MockDriver, MockDriverBuilder, Operation};
