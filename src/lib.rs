//! # Frame Graph
//!
//! A per-frame render graph compiler and scheduler.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`FrameGraph`] - Pass declaration, compilation and execution for one frame at a time
//! - [`ResourceProvider`] - Trait for the owner of textures and buffers
//! - [`Backend`] - Trait for stream, fence and attachment hooks of the host API
//! - [`DummyBackend`] and [`ResourceRegistry`] - Recording implementations for testing
//!
//! Compilation culls passes whose outputs are never used, assigns every
//! transient resource a creation and release pass, and computes the minimal
//! set of fences between the graphics pipe and the async compute pipe.
//!
//! ## Example
//!
//! ```
//! use frame_graph::{
//!     DummyBackend, ExternalHandle, FrameGraph, ResourceProvider, ResourceRegistry,
//!     ResourceTrack, TextureDescriptor, TextureFormat, TextureUsage,
//! };
//!
//! let mut graph = FrameGraph::new();
//! let mut resources = ResourceRegistry::new();
//! let mut backend = DummyBackend::new();
//!
//! let hdr = resources.create_texture(TextureDescriptor::new_2d(
//!     1280,
//!     720,
//!     TextureFormat::Rgba16Float,
//!     TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
//! ));
//! let backbuffer = resources.import_external(ResourceTrack::Texture, ExternalHandle(0));
//!
//! let mut lighting = graph.add_pass("lighting", ()).unwrap();
//! lighting.write(hdr);
//! lighting.set_execute(|_, _ctx| {});
//!
//! let mut tonemap = graph.add_pass("tonemap", ()).unwrap();
//! tonemap.read(hdr);
//! tonemap.write(backbuffer);
//! tonemap.set_execute(|_, _ctx| {});
//!
//! graph.render_frame(&mut (), &mut resources, &mut backend).unwrap();
//! assert_eq!(resources.created_total(), 1);
//! assert_eq!(resources.live_count(), 0);
//! ```

pub mod backend;
pub mod pool;
pub mod render_graph;

// Re-export main types for convenience
pub use backend::{
    AttachmentBinding, Backend, BackendCommand, BackendError, BackendResult, BufferDescriptor,
    BufferUsage, CommandStream, DummyBackend, ExternalHandle, FenceHandle, LoadOp, Pipe,
    ResourceProvider, SamplerDescriptor, SamplerHandle, StoreOp, TextureDescriptor,
    TextureFormat, TextureUsage,
};
pub use render_graph::{
    ColorAttachment, CompiledGraph, CompiledPassInfo, CompiledResourceInfo, DepthAttachment,
    FrameGraph, FrameGraphError, FrameGraphResult, FrameState, PassBuilder, PassContext,
    PassFlags, RenderPass, ResourceHandle, ResourceRegistry, ResourceTrack,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the frame graph library.
pub fn init() {
    log::info!("Frame Graph v{} initialized", VERSION);
}

/// Configuration for a [`FrameGraph`]
#[derive(Debug, Clone)]
pub struct FrameGraphConfig {
    /// Name used in log output
    pub name: String,
    /// Allow passes to run on the async compute pipe. When disabled every
    /// pass is routed to the graphics pipe.
    pub enable_async_compute: bool,
    /// Keep every declared pass, even ones with unused outputs
    pub disable_pass_culling: bool,
    /// Log the per-pass schedule after every compile
    pub log_frame_information: bool,
}

impl Default for FrameGraphConfig {
    fn default() -> Self {
        Self {
            name: "FrameGraph".to_string(),
            enable_async_compute: true,
            disable_pass_culling: false,
            log_frame_information: false,
        }
    }
}

impl FrameGraphConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_async_compute(mut self, enable: bool) -> Self {
        self.enable_async_compute = enable;
        self
    }

    pub fn with_pass_culling_disabled(mut self, disable: bool) -> Self {
        self.disable_pass_culling = disable;
        self
    }

    pub fn with_frame_information_logging(mut self, enable: bool) -> Self {
        self.log_frame_information = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_config_builders() {
        let config = FrameGraphConfig::default()
            .with_name("main")
            .with_async_compute(false)
            .with_pass_culling_disabled(true)
            .with_frame_information_logging(true);

        assert_eq!(config.name, "main");
        assert!(!config.enable_async_compute);
        assert!(config.disable_pass_culling);
        assert!(config.log_frame_information);
    }

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert!(backend.name() == "Dummy");
    }
}
