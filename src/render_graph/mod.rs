//! Frame Graph System
//!
//! Passes declare the resources they read and write; the graph culls passes
//! with no observable effect, decides where each transient resource is created
//! and released, and inserts the minimal waits between the graphics and async
//! compute pipes before running the surviving passes in declaration order.

pub mod compiled;
mod compiler;
pub mod error;
mod executor;
pub mod graph;
pub mod pass;
pub mod resource;
pub mod sampler;

pub use compiled::*;
pub use error::*;
pub use graph::*;
pub use pass::*;
pub use resource::*;
pub use sampler::*;
