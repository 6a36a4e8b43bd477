//! Frame graph error types.

use thiserror::Error;

use crate::backend::traits::BackendError;
use crate::render_graph::resource::ResourceHandle;

/// Lifecycle phase of the frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Passes are being declared.
    Setup,
    /// Culling, lifetimes and synchronization have been computed.
    Compiled,
    /// Every surviving pass callback has run.
    Executed,
    /// Per-frame state discarded, storage retained for the next frame.
    Cleared,
}

/// Errors raised while compiling or executing a frame graph.
///
/// All of them are fatal for the current frame: the graph aborts the
/// remaining work and must be cleared before the next frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameGraphError {
    #[error("Pass '{pass}' was not provided with an execute function")]
    MissingExecuteFunction { pass: String },
    #[error("Pass '{pass}' binds {color_count} color attachments without a depth attachment")]
    MissingDepthAttachment { pass: String, color_count: usize },
    #[error("Asynchronous pass '{pass}' releases {resource:?} but is never synchronized on the graphics pipe")]
    UnsynchronizedAsyncPass { pass: String, resource: ResourceHandle },
    #[error("Pass '{pass}' references undeclared resource {resource:?}")]
    InvalidResource { pass: String, resource: ResourceHandle },
    #[error("Pass '{pass}' waits on pass {producer} which never signaled a fence")]
    MissingFence { pass: String, producer: usize },
    #[error("Cannot {operation} while the frame graph is in the {state:?} state")]
    InvalidState {
        operation: &'static str,
        state: FrameState,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type FrameGraphResult<T> = Result<T, FrameGraphError>;
