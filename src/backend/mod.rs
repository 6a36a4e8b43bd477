//! Backend abstraction layer
//!
//! Provides the hook traits the frame graph drives and a dummy backend for testing.

pub mod dummy;
pub mod traits;
pub mod types;

pub use dummy::{BackendCommand, DummyBackend};
pub use traits::*;
pub use types::*;
