//! Frame graph executor
//!
//! Walks the compiled pass list in order and drives the resource provider and
//! backend hooks around every surviving pass callback.

use std::any::Any;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pool::ScratchPool;
use crate::render_graph::compiled::CompiledGraph;
use crate::render_graph::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::pass::{ColorAttachment, DepthAttachment, PassContext, RenderPass};
use crate::render_graph::resource::{ResourceHandle, ResourceTrack};
use crate::render_graph::sampler::SamplerCache;

/// Everything a frame's execution borrows from outside the compiled graph.
pub(crate) struct ExecutionFrame<'a> {
    pub world: &'a mut dyn Any,
    pub resources: &'a mut dyn ResourceProvider,
    pub backend: &'a mut dyn Backend,
    pub scratch: &'a mut ScratchPool,
    pub samplers: &'a mut SamplerCache,
    pub frame_index: u64,
}

/// Execute every surviving pass in declaration order.
///
/// Stops at the first failure. Resources created up to that point stay marked
/// in `compiled`; see [`release_created`].
pub(crate) fn execute(
    passes: &mut [RenderPass],
    compiled: &mut CompiledGraph,
    frame: &mut ExecutionFrame<'_>,
) -> FrameGraphResult<()> {
    let primary = frame.backend.primary_stream();

    for pass in passes.iter_mut() {
        if compiled.pass(pass.index).culled {
            continue;
        }
        execute_pass(pass, compiled, frame, primary)?;
    }

    Ok(())
}

fn execute_pass(
    pass: &mut RenderPass,
    compiled: &mut CompiledGraph,
    frame: &mut ExecutionFrame<'_>,
    primary: CommandStream,
) -> FrameGraphResult<()> {
    let index = pass.index;
    let RenderPass {
        name,
        execute,
        color_attachments,
        depth_attachment,
        ..
    } = pass;

    let Some(execute) = execute.as_deref_mut() else {
        return Err(FrameGraphError::MissingExecuteFunction { pass: name.clone() });
    };

    for track in ResourceTrack::ALL {
        for i in 0..compiled.pass(index).create[track.index()].len() {
            let resource = compiled.pass(index).create[track.index()][i];
            frame.resources.create(resource)?;
            compiled.resource_mut(resource).created = true;
        }
    }

    if color_attachments.len() > 1 && depth_attachment.is_none() {
        return Err(FrameGraphError::MissingDepthAttachment {
            pass: name.clone(),
            color_count: color_attachments.len(),
        });
    }

    let async_compute = compiled.pass(index).async_compute;
    let stream = if async_compute {
        frame.backend.begin_async_stream()
    } else {
        primary
    };

    if let Err(err) = prepare_stream(
        compiled,
        index,
        name.as_str(),
        color_attachments.as_slice(),
        depth_attachment.as_ref(),
        &mut *frame.backend,
        stream,
    ) {
        if async_compute {
            frame.backend.abandon_stream(stream);
        }
        return Err(err);
    }

    log::trace!("FrameGraph: executing pass {} '{}' on {:?}", index, name, stream.pipe);
    {
        let mut ctx = PassContext {
            world: &mut *frame.world,
            scratch: &mut *frame.scratch,
            backend: &mut *frame.backend,
            samplers: &mut *frame.samplers,
            stream,
            frame_index: frame.frame_index,
            pass_name: name.as_str(),
        };
        execute(&mut ctx);
    }

    if compiled.pass(index).needs_graphics_fence {
        let fence = frame.backend.signal_fence(stream);
        compiled.pass_mut(index).fence = Some(fence);
    }

    if async_compute {
        frame.backend.submit_async(stream);
    }

    frame.scratch.release_pass_allocations();

    for track in ResourceTrack::ALL {
        for i in 0..compiled.pass(index).release[track.index()].len() {
            let resource = compiled.pass(index).release[track.index()][i];
            frame.resources.release(resource)?;
            compiled.resource_mut(resource).created = false;
        }
    }

    Ok(())
}

/// Bind the pass's attachments and record its cross-pipe wait on `stream`.
fn prepare_stream(
    compiled: &CompiledGraph,
    index: usize,
    name: &str,
    colors: &[ColorAttachment],
    depth: Option<&DepthAttachment>,
    backend: &mut dyn Backend,
    stream: CommandStream,
) -> FrameGraphResult<()> {
    if !colors.is_empty() || depth.is_some() {
        backend.bind_attachments(
            stream,
            &AttachmentBinding {
                pass_name: name,
                colors,
                depth,
            },
        )?;
    }

    if let Some(producer) = compiled.pass(index).sync_to_pass_index {
        let fence = compiled
            .pass(producer)
            .fence
            .ok_or_else(|| FrameGraphError::MissingFence {
                pass: name.to_string(),
                producer,
            })?;
        backend.wait_fence(stream, fence);
    }

    Ok(())
}

/// Release every resource still marked created after an aborted frame.
///
/// Returns how many resources were released.
pub(crate) fn release_created(
    compiled: &mut CompiledGraph,
    resources: &mut dyn ResourceProvider,
) -> usize {
    let mut released = 0;
    for track in ResourceTrack::ALL {
        for index in 0..compiled.resource_count(track) {
            let resource = ResourceHandle::new(track, index as u32);
            if !compiled.resource(resource).created {
                continue;
            }
            if let Err(err) = resources.release(resource) {
                log::warn!("FrameGraph: failed to release {:?} after abort: {}", resource, err);
            }
            compiled.resource_mut(resource).created = false;
            released += 1;
        }
    }
    released
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCommand, DummyBackend};
    use crate::render_graph::compiler;
    use crate::render_graph::pass::PassBuilder;
    use crate::render_graph::resource::ResourceRegistry;

    struct Fixture {
        registry: ResourceRegistry,
        backend: DummyBackend,
        scratch: ScratchPool,
        samplers: SamplerCache,
        passes: Vec<RenderPass>,
        compiled: CompiledGraph,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: ResourceRegistry::new(),
                backend: DummyBackend::new(),
                scratch: ScratchPool::new(),
                samplers: SamplerCache::new(),
                passes: Vec::new(),
                compiled: CompiledGraph::default(),
            }
        }

        fn texture(&mut self) -> ResourceHandle {
            self.registry.create_texture(TextureDescriptor::new_2d(
                32,
                32,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT,
            ))
        }

        fn add_pass(&mut self, name: &str) -> PassBuilder<'_, ()> {
            let index = self.passes.len();
            self.passes.push(RenderPass::new(name.to_string(), index));
            PassBuilder::new(&mut self.passes[index], (), true)
        }

        fn run(&mut self, world: &mut Vec<String>) -> FrameGraphResult<()> {
            compiler::compile(&self.passes, &self.registry, true, &mut self.compiled)?;
            let mut frame = ExecutionFrame {
                world,
                resources: &mut self.registry,
                backend: &mut self.backend,
                scratch: &mut self.scratch,
                samplers: &mut self.samplers,
                frame_index: 3,
            };
            execute(&mut self.passes, &mut self.compiled, &mut frame)
        }
    }

    fn log_name(_: &mut (), ctx: &mut PassContext<'_>) {
        let name = ctx.pass_name().to_string();
        if let Some(log) = ctx.world::<Vec<String>>() {
            log.push(name);
        }
    }

    #[test]
    fn test_passes_run_in_order_with_lifetimes() {
        let mut fixture = Fixture::new();
        let x = fixture.texture();
        let bb = fixture
            .registry
            .import_external(ResourceTrack::Texture, ExternalHandle(0));

        let mut a = fixture.add_pass("a");
        a.write(x);
        a.set_execute(log_name);
        let mut b = fixture.add_pass("b");
        b.read(x);
        b.write(bb);
        b.set_execute(log_name);

        let mut world = Vec::new();
        fixture.run(&mut world).unwrap();

        assert_eq!(world, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(fixture.registry.created_total(), 1);
        assert_eq!(fixture.registry.released_total(), 1);
        assert_eq!(fixture.registry.live_count(), 0);
        assert_eq!(fixture.compiled.created_resources().count(), 0);
    }

    #[test]
    fn test_missing_execute_function() {
        let mut fixture = Fixture::new();
        let bb = fixture
            .registry
            .import_external(ResourceTrack::Texture, ExternalHandle(0));
        fixture.add_pass("forgotten").write(bb);

        let result = fixture.run(&mut Vec::new());
        assert_eq!(
            result,
            Err(FrameGraphError::MissingExecuteFunction {
                pass: "forgotten".to_string()
            })
        );
    }

    #[test]
    fn test_multiple_colors_need_depth() {
        let mut fixture = Fixture::new();
        let albedo = fixture.texture();
        let normal = fixture.texture();

        let mut gbuffer = fixture.add_pass("gbuffer");
        gbuffer.set_color_attachment(ColorAttachment::new(0, albedo));
        gbuffer.set_color_attachment(ColorAttachment::new(1, normal));
        gbuffer.allow_pass_culling(false);
        gbuffer.set_execute(|_, _| {});

        let result = fixture.run(&mut Vec::new());
        assert_eq!(
            result,
            Err(FrameGraphError::MissingDepthAttachment {
                pass: "gbuffer".to_string(),
                color_count: 2,
            })
        );

        // Created before the check, so the caller has to clean up.
        assert_eq!(fixture.compiled.created_resources().count(), 2);
        assert_eq!(release_created(&mut fixture.compiled, &mut fixture.registry), 2);
        assert_eq!(fixture.registry.live_count(), 0);
    }

    #[test]
    fn test_attachments_are_bound() {
        let mut fixture = Fixture::new();
        let albedo = fixture.texture();
        let normal = fixture.texture();
        let depth = fixture.texture();

        let mut gbuffer = fixture.add_pass("gbuffer");
        gbuffer.set_color_attachment(ColorAttachment::new(0, albedo));
        gbuffer.set_color_attachment(ColorAttachment::new(1, normal));
        gbuffer.set_depth_attachment(DepthAttachment::new(depth).with_clear_depth(1.0));
        gbuffer.allow_pass_culling(false);
        gbuffer.set_execute(|_, _| {});

        fixture.run(&mut Vec::new()).unwrap();

        let primary = fixture.backend.primary_stream();
        assert_eq!(
            fixture.backend.commands(),
            &[BackendCommand::BindAttachments {
                stream: primary,
                pass: "gbuffer".to_string(),
                colors: vec![albedo, normal],
                depth: Some(depth),
            }]
        );
    }

    #[test]
    fn test_async_pass_signals_and_graphics_waits() {
        let mut fixture = Fixture::new();
        let z = fixture.registry.create_buffer(BufferDescriptor::new(64, BufferUsage::STORAGE));
        let bb = fixture
            .registry
            .import_external(ResourceTrack::Texture, ExternalHandle(0));

        let mut compute = fixture.add_pass("compute");
        compute.write(z);
        compute.enable_async_compute(true);
        compute.set_execute(|_, ctx| assert_eq!(ctx.pipe(), Pipe::AsyncCompute));
        let mut present = fixture.add_pass("present");
        present.read(z);
        present.write(bb);
        present.set_execute(|_, ctx| assert_eq!(ctx.pipe(), Pipe::Graphics));

        fixture.run(&mut Vec::new()).unwrap();

        let signaled = fixture.backend.signaled_fences();
        assert_eq!(signaled.len(), 1);
        assert_eq!(fixture.backend.waited_fences(), signaled);
        assert_eq!(fixture.compiled.pass(0).fence(), Some(signaled[0]));

        let commands = fixture.backend.commands();
        assert!(matches!(commands[0], BackendCommand::BeginAsyncStream { .. }));
        assert!(matches!(commands[1], BackendCommand::SignalFence { .. }));
        assert!(matches!(commands[2], BackendCommand::SubmitAsync { .. }));
        assert!(matches!(commands[3], BackendCommand::WaitFence { .. }));
    }

    #[test]
    fn test_failed_async_pass_abandons_its_stream() {
        let mut fixture = Fixture::new();
        fixture.backend = DummyBackend::new().with_failing_attachments();
        let target = fixture.texture();

        let mut compute = fixture.add_pass("compute");
        compute.set_color_attachment(ColorAttachment::new(0, target));
        compute.enable_async_compute(true);
        compute.allow_pass_culling(false);
        compute.set_execute(|_, _| {});

        let result = fixture.run(&mut Vec::new());
        assert!(matches!(result, Err(FrameGraphError::Backend(_))));

        let commands = fixture.backend.commands();
        let BackendCommand::BeginAsyncStream(stream) = commands[0] else {
            panic!("expected an async stream, got {:?}", commands);
        };
        assert_eq!(commands, &[
            BackendCommand::BeginAsyncStream(stream),
            BackendCommand::AbandonStream(stream),
        ]);
    }

    #[test]
    fn test_scratch_is_released_after_each_pass() {
        let mut fixture = Fixture::new();
        let bb = fixture
            .registry
            .import_external(ResourceTrack::Texture, ExternalHandle(0));

        let mut pass = fixture.add_pass("scratchy");
        pass.write(bb);
        pass.set_execute(|_, ctx| {
            ctx.scratch().alloc::<Vec<u32>>().push(1);
            assert_eq!(ctx.scratch().in_use_count(), 1);
        });

        fixture.run(&mut Vec::new()).unwrap();
        assert_eq!(fixture.scratch.in_use_count(), 0);
        assert_eq!(fixture.scratch.free_count(), 1);
    }
}
