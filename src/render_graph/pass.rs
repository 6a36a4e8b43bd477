//! Render pass declarations for the frame graph

use std::any::Any;

use bitflags::bitflags;
use glam::Vec4;

use crate::backend::traits::{Backend, BackendResult};
use crate::backend::types::*;
use crate::pool::ScratchPool;
use crate::render_graph::resource::{PerTrack, ResourceHandle};
use crate::render_graph::sampler::SamplerCache;

bitflags! {
    /// Scheduling flags of a pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PassFlags: u32 {
        /// Record on the secondary stream and submit to the compute queue.
        const ASYNC_COMPUTE = 1 << 0;
        /// Eligible for dead-code elimination.
        const ALLOW_CULLING = 1 << 1;
    }
}

impl Default for PassFlags {
    fn default() -> Self {
        PassFlags::ALLOW_CULLING
    }
}

/// Color output of a graphics pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    pub slot: u32,
    pub handle: ResourceHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

impl ColorAttachment {
    pub fn new(slot: u32, handle: ResourceHandle) -> Self {
        Self {
            slot,
            handle,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
        }
    }

    pub fn with_clear_color(mut self, r: f32, g: f32, b: f32, a: f32) -> Self {
        self.load_op = LoadOp::Clear(Vec4::new(r, g, b, a));
        self
    }
}

/// Depth output of a graphics pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachment {
    pub handle: ResourceHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

impl DepthAttachment {
    pub fn new(handle: ResourceHandle) -> Self {
        Self {
            handle,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
        }
    }

    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.load_op = LoadOp::Clear(Vec4::splat(depth));
        self
    }
}

/// Callback invoked when a pass executes. The typed pass data is captured inside.
pub type ExecuteFn = Box<dyn FnMut(&mut PassContext<'_>)>;

/// A pass as declared for the current frame.
///
/// The pass index is its declaration order and doubles as its topological
/// index: passes are never reordered.
pub struct RenderPass {
    pub(crate) name: String,
    pub(crate) index: usize,
    pub(crate) flags: PassFlags,
    pub(crate) reads: PerTrack<Vec<ResourceHandle>>,
    pub(crate) writes: PerTrack<Vec<ResourceHandle>>,
    /// Writes declared through `write`/`read_write` rather than an attachment.
    pub(crate) explicit_writes: PerTrack<Vec<ResourceHandle>>,
    pub(crate) temporal: PerTrack<Vec<ResourceHandle>>,
    pub(crate) color_attachments: Vec<ColorAttachment>,
    pub(crate) depth_attachment: Option<DepthAttachment>,
    pub(crate) execute: Option<ExecuteFn>,
}

impl RenderPass {
    pub(crate) fn new(name: String, index: usize) -> Self {
        Self {
            name,
            index,
            flags: PassFlags::default(),
            reads: Default::default(),
            writes: Default::default(),
            explicit_writes: Default::default(),
            temporal: Default::default(),
            color_attachments: Vec::new(),
            depth_attachment: None,
            execute: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn flags(&self) -> PassFlags {
        self.flags
    }

    pub fn is_async_compute(&self) -> bool {
        self.flags.contains(PassFlags::ASYNC_COMPUTE)
    }

    pub fn allows_culling(&self) -> bool {
        self.flags.contains(PassFlags::ALLOW_CULLING)
    }

    pub fn has_execute(&self) -> bool {
        self.execute.is_some()
    }

    pub fn reads(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.reads.iter().flatten().copied()
    }

    pub fn writes(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.writes.iter().flatten().copied()
    }

    /// Resources carried across frames by this pass.
    pub fn temporal(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.temporal.iter().flatten().copied()
    }

    pub fn reads_resource(&self, resource: ResourceHandle) -> bool {
        self.reads[resource.track().index()].contains(&resource)
    }

    pub fn writes_resource(&self, resource: ResourceHandle) -> bool {
        self.writes[resource.track().index()].contains(&resource)
    }

    pub fn color_attachments(&self) -> &[ColorAttachment] {
        &self.color_attachments
    }

    pub fn depth_attachment(&self) -> Option<&DepthAttachment> {
        self.depth_attachment.as_ref()
    }

    fn add_read(&mut self, resource: ResourceHandle) {
        let list = &mut self.reads[resource.track().index()];
        if !list.contains(&resource) {
            list.push(resource);
        }
    }

    fn add_write(&mut self, resource: ResourceHandle) {
        let list = &mut self.writes[resource.track().index()];
        if !list.contains(&resource) {
            list.push(resource);
        }
    }

    fn add_explicit_write(&mut self, resource: ResourceHandle) {
        self.add_write(resource);
        let list = &mut self.explicit_writes[resource.track().index()];
        if !list.contains(&resource) {
            list.push(resource);
        }
    }

    /// Drop the write implied by a replaced attachment, unless something else
    /// still declares it.
    fn drop_attachment_write(&mut self, resource: ResourceHandle) {
        let track = resource.track().index();
        let still_written = self.explicit_writes[track].contains(&resource)
            || self.color_attachments.iter().any(|c| c.handle == resource)
            || self
                .depth_attachment
                .as_ref()
                .is_some_and(|depth| depth.handle == resource);
        if !still_written {
            self.writes[track].retain(|&written| written != resource);
        }
    }

    fn add_temporal(&mut self, resource: ResourceHandle) {
        let list = &mut self.temporal[resource.track().index()];
        if !list.contains(&resource) {
            list.push(resource);
        }
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("flags", &self.flags)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .field("temporal", &self.temporal)
            .field("color_attachments", &self.color_attachments)
            .field("depth_attachment", &self.depth_attachment)
            .field("has_execute", &self.execute.is_some())
            .finish()
    }
}

/// Declares the resource usage of one pass.
///
/// Returned by [`FrameGraph::add_pass`](crate::FrameGraph::add_pass). The pass
/// data `D` is moved into the execute callback by [`set_execute`](Self::set_execute);
/// a builder dropped without it leaves the pass without a callback, which
/// fails at execution time.
pub struct PassBuilder<'a, D> {
    pass: &'a mut RenderPass,
    data: D,
    async_compute_enabled: bool,
}

impl<'a, D: 'static> PassBuilder<'a, D> {
    pub(crate) fn new(pass: &'a mut RenderPass, data: D, async_compute_enabled: bool) -> Self {
        Self {
            pass,
            data,
            async_compute_enabled,
        }
    }

    pub fn index(&self) -> usize {
        self.pass.index
    }

    /// Mutable access to the pass data before the callback is bound.
    pub fn data(&mut self) -> &mut D {
        &mut self.data
    }

    /// Declare that this pass reads a resource.
    pub fn read(&mut self, resource: ResourceHandle) -> ResourceHandle {
        self.pass.add_read(resource);
        resource
    }

    /// Declare that this pass writes a resource.
    pub fn write(&mut self, resource: ResourceHandle) -> ResourceHandle {
        self.pass.add_explicit_write(resource);
        resource
    }

    /// Declare a read-modify-write.
    pub fn read_write(&mut self, resource: ResourceHandle) -> ResourceHandle {
        self.pass.add_read(resource);
        self.pass.add_explicit_write(resource);
        resource
    }

    /// Keep a resource alive across frames. It is never culled and pins this pass.
    pub fn use_temporal(&mut self, resource: ResourceHandle) -> ResourceHandle {
        self.pass.add_temporal(resource);
        resource
    }

    /// Bind a color output. Implies a write.
    ///
    /// Replacing a slot also drops the write implied by the previous attachment.
    pub fn set_color_attachment(&mut self, attachment: ColorAttachment) -> ResourceHandle {
        self.pass.add_write(attachment.handle);
        let colors = &mut self.pass.color_attachments;
        let replaced = match colors.iter().position(|c| c.slot == attachment.slot) {
            Some(position) => Some(std::mem::replace(&mut colors[position], attachment).handle),
            None => {
                colors.push(attachment);
                colors.sort_by_key(|c| c.slot);
                None
            }
        };
        if let Some(old) = replaced.filter(|&old| old != attachment.handle) {
            self.pass.drop_attachment_write(old);
        }
        attachment.handle
    }

    /// Bind the depth output. Implies a write.
    pub fn set_depth_attachment(&mut self, attachment: DepthAttachment) -> ResourceHandle {
        self.pass.add_write(attachment.handle);
        let replaced = self.pass.depth_attachment.replace(attachment);
        if let Some(old) = replaced.map(|depth| depth.handle).filter(|&old| old != attachment.handle) {
            self.pass.drop_attachment_write(old);
        }
        attachment.handle
    }

    /// Route this pass to the async compute pipe.
    ///
    /// Ignored when the graph was configured with async compute disabled.
    pub fn enable_async_compute(&mut self, enable: bool) -> &mut Self {
        self.pass
            .flags
            .set(PassFlags::ASYNC_COMPUTE, enable && self.async_compute_enabled);
        self
    }

    /// Allow or forbid culling this pass when its outputs are unused.
    pub fn allow_pass_culling(&mut self, allow: bool) -> &mut Self {
        self.pass.flags.set(PassFlags::ALLOW_CULLING, allow);
        self
    }

    /// Bind the execute callback, moving the pass data into it.
    pub fn set_execute<F>(self, mut execute: F)
    where
        F: FnMut(&mut D, &mut PassContext<'_>) + 'static,
    {
        let mut data = self.data;
        self.pass.execute = Some(Box::new(move |ctx: &mut PassContext<'_>| {
            execute(&mut data, ctx)
        }));
    }
}

/// Per-frame state handed to an executing pass.
pub struct PassContext<'a> {
    pub(crate) world: &'a mut dyn Any,
    pub(crate) scratch: &'a mut ScratchPool,
    pub(crate) backend: &'a mut dyn Backend,
    pub(crate) samplers: &'a mut SamplerCache,
    pub(crate) stream: CommandStream,
    pub(crate) frame_index: u64,
    pub(crate) pass_name: &'a str,
}

impl<'a> PassContext<'a> {
    /// Get the frame world as its concrete type.
    pub fn world<W: Any>(&mut self) -> Option<&mut W> {
        self.world.downcast_mut::<W>()
    }

    /// Scratch allocations, reclaimed when the pass finishes.
    pub fn scratch(&mut self) -> &mut ScratchPool {
        &mut *self.scratch
    }

    pub fn backend(&mut self) -> &mut dyn Backend {
        &mut *self.backend
    }

    /// Stream commands of this pass are recorded on.
    pub fn stream(&self) -> CommandStream {
        self.stream
    }

    pub fn pipe(&self) -> Pipe {
        self.stream.pipe
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    /// Shared sampler for a descriptor, created on first request this frame.
    pub fn default_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        self.samplers.get_or_create(desc, &mut *self.backend)
    }
}
