//! Core backend abstraction traits
//!
//! The frame graph never touches GPU objects itself. Physical resources live
//! behind a [`ResourceProvider`], while stream switching, fences and attachment
//! binding go through a [`Backend`].

use crate::backend::types::*;
use crate::render_graph::pass::{ColorAttachment, DepthAttachment};
use crate::render_graph::resource::{ResourceHandle, ResourceTrack};
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create resource {0:?}: {1}")]
    ResourceCreationFailed(ResourceHandle, String),
    #[error("Resource {0:?} is not alive")]
    ResourceNotAlive(ResourceHandle),
    #[error("Unknown resource {0:?}")]
    UnknownResource(ResourceHandle),
    #[error("Failed to create sampler: {0}")]
    SamplerCreationFailed(String),
    #[error("Failed to bind attachments for pass '{0}': {1}")]
    AttachmentBindFailed(String, String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Owner of every resource the graph references.
///
/// The graph only reads usage metadata through this trait and asks the
/// provider to materialize and release transient resources at the points the
/// compiler decided. Imported resources are never created or released by the
/// graph.
pub trait ResourceProvider {
    /// Register an externally owned object. Passes writing it become side-effecting.
    fn import_external(&mut self, track: ResourceTrack, external: ExternalHandle) -> ResourceHandle;

    /// Materialize a transient resource before its first producer runs.
    fn create(&mut self, handle: ResourceHandle) -> BackendResult<()>;

    /// Release a transient resource after its last use.
    fn release(&mut self, handle: ResourceHandle) -> BackendResult<()>;

    /// Number of resources declared on a track; handles index below this.
    fn resource_count(&self, track: ResourceTrack) -> usize;

    fn is_imported(&self, handle: ResourceHandle) -> bool;

    /// Temporal resources persist beyond the passes that use them.
    fn is_temporal(&self, handle: ResourceHandle) -> bool;

    fn descriptor_of(&self, handle: ResourceHandle) -> Option<&ResourceDescriptor>;
}

/// Attachments a graphics pass renders into.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentBinding<'a> {
    pub pass_name: &'a str,
    pub colors: &'a [ColorAttachment],
    pub depth: Option<&'a DepthAttachment>,
}

/// Host rendering API hooks used by the execution driver.
pub trait Backend {
    /// Backend name, for logging
    fn name(&self) -> &str;

    /// Stream used for graphics work this frame.
    fn primary_stream(&mut self) -> CommandStream;

    /// Begin a secondary stream tagged for the compute queue.
    fn begin_async_stream(&mut self) -> CommandStream;

    /// Bind output attachments on the given stream.
    fn bind_attachments(
        &mut self,
        stream: CommandStream,
        binding: &AttachmentBinding<'_>,
    ) -> BackendResult<()>;

    /// Record a wait on a fence signaled by the other pipe.
    fn wait_fence(&mut self, stream: CommandStream, fence: FenceHandle);

    /// Record a cross-queue fence after the work recorded so far.
    fn signal_fence(&mut self, stream: CommandStream) -> FenceHandle;

    /// Submit a secondary stream to the background compute queue.
    fn submit_async(&mut self, stream: CommandStream);

    /// Drop a secondary stream that will never be submitted.
    fn abandon_stream(&mut self, stream: CommandStream);

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;
}
