//! Task hierarchy of the conference core.
//!
//! ```text
//! Dispatcher (one per process)
//! ├── owns BridgeRegistry
//! │   └── BridgeManager (at most one, for the shared bridge)
//! │       └── announcement playbacks (detached)
//! └── call sessions (one per new call leg)
//! ```
//!
//! Every task observes the same `CancellationToken`.

pub mod bridge;
pub mod dispatcher;
pub mod session;

pub use bridge::{BridgeHandle, BridgeRegistry, BridgeSettings, BridgeState};
pub use dispatcher::Dispatcher;
pub use session::{handle_new_call, CallLeg, CallPhase, CallSettings, DialTarget, SessionOutcome};
