//! Frame graph: per-frame pass list, compilation and execution.

use std::any::Any;

use crate::backend::traits::{Backend, ResourceProvider};
use crate::pool::{Pooled, ScratchPool};
use crate::render_graph::compiled::CompiledGraph;
use crate::render_graph::compiler;
use crate::render_graph::error::{FrameGraphError, FrameGraphResult, FrameState};
use crate::render_graph::executor::{self, ExecutionFrame};
use crate::render_graph::pass::{PassBuilder, RenderPass};
use crate::render_graph::sampler::SamplerCache;
use crate::FrameGraphConfig;

/// A frame graph, rebuilt every frame and reused across frames.
///
/// Each frame goes through [`add_pass`](Self::add_pass) declarations,
/// [`compile`](Self::compile), [`execute`](Self::execute) and
/// [`clear`](Self::clear). Clearing drops the pass list and compiled metadata
/// but keeps their allocations for the next frame.
pub struct FrameGraph {
    config: FrameGraphConfig,
    passes: Vec<RenderPass>,
    compiled: Pooled<CompiledGraph>,
    scratch: ScratchPool,
    samplers: SamplerCache,
    state: FrameState,
    frame_index: u64,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self::with_config(FrameGraphConfig::default())
    }

    pub fn with_config(config: FrameGraphConfig) -> Self {
        log::info!(
            "FrameGraph '{}': created (async compute: {}, pass culling: {})",
            config.name,
            config.enable_async_compute,
            !config.disable_pass_culling
        );
        Self {
            config,
            passes: Vec::new(),
            compiled: Pooled::default(),
            scratch: ScratchPool::new(),
            samplers: SamplerCache::new(),
            state: FrameState::Setup,
            frame_index: 0,
        }
    }

    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Number of frames cleared so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Compiled metadata of the current frame, between compile and clear.
    pub fn compiled(&self) -> Option<&CompiledGraph> {
        self.compiled.get()
    }

    /// Declare a pass carrying typed data for its execute callback.
    ///
    /// Passes execute in declaration order. Declaring a pass on a cleared
    /// graph starts a new frame.
    pub fn add_pass<D: 'static>(
        &mut self,
        name: impl Into<String>,
        data: D,
    ) -> FrameGraphResult<PassBuilder<'_, D>> {
        match self.state {
            FrameState::Setup => {}
            FrameState::Cleared => self.state = FrameState::Setup,
            state => {
                return Err(FrameGraphError::InvalidState {
                    operation: "declare a pass",
                    state,
                })
            }
        }

        let index = self.passes.len();
        self.passes.push(RenderPass::new(name.into(), index));
        Ok(PassBuilder::new(
            &mut self.passes[index],
            data,
            self.config.enable_async_compute,
        ))
    }

    /// Cull dead passes, then compute resource lifetimes and cross-pipe sync points.
    ///
    /// A failed compile clears the frame.
    pub fn compile(&mut self, resources: &dyn ResourceProvider) -> FrameGraphResult<()> {
        match self.state {
            FrameState::Setup | FrameState::Cleared => {}
            state => {
                return Err(FrameGraphError::InvalidState {
                    operation: "compile",
                    state,
                })
            }
        }

        let cull_passes = !self.config.disable_pass_culling;
        let compiled = self.compiled.activate();
        if let Err(err) = compiler::compile(&self.passes, resources, cull_passes, compiled) {
            log::error!("FrameGraph '{}': compile failed: {}", self.config.name, err);
            self.clear();
            return Err(err);
        }

        log::debug!(
            "FrameGraph '{}': compiled {} passes ({} culled, {} sync points)",
            self.config.name,
            compiled.pass_count(),
            compiled.culled_count(),
            compiled.sync_point_count()
        );
        self.state = FrameState::Compiled;

        if self.config.log_frame_information {
            self.log_frame_information();
        }
        Ok(())
    }

    /// Run every surviving pass.
    ///
    /// On failure, resources created this frame are released through
    /// `resources` and the frame is cleared before the error is returned.
    pub fn execute(
        &mut self,
        world: &mut dyn Any,
        resources: &mut dyn ResourceProvider,
        backend: &mut dyn Backend,
    ) -> FrameGraphResult<()> {
        if self.state != FrameState::Compiled {
            return Err(FrameGraphError::InvalidState {
                operation: "execute",
                state: self.state,
            });
        }
        let Some(compiled) = self.compiled.get_mut() else {
            return Err(FrameGraphError::InvalidState {
                operation: "execute",
                state: self.state,
            });
        };

        log::trace!(
            "FrameGraph '{}': executing frame {} on {}",
            self.config.name,
            self.frame_index,
            backend.name()
        );

        let mut frame = ExecutionFrame {
            world,
            resources: &mut *resources,
            backend,
            scratch: &mut self.scratch,
            samplers: &mut self.samplers,
            frame_index: self.frame_index,
        };
        let result = executor::execute(&mut self.passes, compiled, &mut frame);

        match result {
            Ok(()) => {
                self.state = FrameState::Executed;
                Ok(())
            }
            Err(err) => {
                log::error!(
                    "FrameGraph '{}': frame {} failed: {}",
                    self.config.name,
                    self.frame_index,
                    err
                );
                let released = executor::release_created(compiled, resources);
                log::warn!(
                    "FrameGraph '{}': force clearing after failure ({} resources released)",
                    self.config.name,
                    released
                );
                self.clear();
                Err(err)
            }
        }
    }

    /// Discard the frame's passes and compiled metadata, keeping allocations.
    pub fn clear(&mut self) {
        self.passes.clear();
        self.compiled.release();
        self.samplers.clear();
        self.scratch.release_pass_allocations();
        if self.state != FrameState::Cleared {
            self.frame_index += 1;
        }
        self.state = FrameState::Cleared;
    }

    /// Compile, execute and clear. The frame is cleared even if a step fails.
    pub fn render_frame(
        &mut self,
        world: &mut dyn Any,
        resources: &mut dyn ResourceProvider,
        backend: &mut dyn Backend,
    ) -> FrameGraphResult<()> {
        let result = match self.compile(&*resources) {
            Ok(()) => self.execute(world, resources, backend),
            Err(err) => Err(err),
        };
        self.clear();
        result
    }

    /// Log the compiled frame: culling, lifetimes and sync points of every pass.
    pub fn log_frame_information(&self) {
        let Some(compiled) = self.compiled.get() else {
            log::info!("FrameGraph '{}': nothing compiled", self.config.name);
            return;
        };

        log::info!(
            "FrameGraph '{}': frame {} ({} passes, {} culled)",
            self.config.name,
            self.frame_index,
            compiled.pass_count(),
            compiled.culled_count()
        );
        for (pass, info) in self.passes.iter().zip(compiled.passes()) {
            if info.is_culled() {
                log::info!("  [{}] {} (culled)", pass.index, pass.name);
                continue;
            }
            let pipe = if info.is_async_compute() { " (async compute)" } else { "" };
            log::info!("  [{}] {}{}", pass.index, pass.name, pipe);

            if info.creates().next().is_some() {
                log::info!("      create: {:?}", info.creates().collect::<Vec<_>>());
            }
            if info.releases().next().is_some() {
                log::info!("      release: {:?}", info.releases().collect::<Vec<_>>());
            }
            if let Some(producer) = info.sync_to_pass_index() {
                log::info!("      waits on: [{}] {}", producer, self.passes[producer].name);
            }
            if info.needs_graphics_fence() {
                log::info!("      signals fence");
            }
        }
    }
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGraph")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("frame_index", &self.frame_index)
            .field("passes", &self.passes.len())
            .finish()
    }
}
