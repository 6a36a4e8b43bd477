//! Shared fixtures for the frame graph integration tests.

use frame_graph::{
    BufferDescriptor, BufferUsage, DummyBackend, ExternalHandle, FrameGraph, FrameGraphConfig,
    FrameGraphResult, PassContext, Pipe, ResourceHandle, ResourceProvider, ResourceRegistry,
    ResourceTrack, TextureDescriptor, TextureFormat, TextureUsage,
};

/// Enable log output for a test run. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// World handed to every pass: records what ran, where and when.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    pub passes: Vec<String>,
    pub pipes: Vec<Pipe>,
    pub frames: Vec<u64>,
}

impl ExecutionLog {
    pub fn clear(&mut self) {
        self.passes.clear();
        self.pipes.clear();
        self.frames.clear();
    }
}

/// Execute callback recording the pass into the [`ExecutionLog`] world.
pub fn record_pass<D>(_data: &mut D, ctx: &mut PassContext<'_>) {
    let name = ctx.pass_name().to_string();
    let pipe = ctx.pipe();
    let frame = ctx.frame_index();
    if let Some(log) = ctx.world::<ExecutionLog>() {
        log.passes.push(name);
        log.pipes.push(pipe);
        log.frames.push(frame);
    }
}

/// Graph, provider, backend and world for one test.
pub struct TestContext {
    pub graph: FrameGraph,
    pub resources: ResourceRegistry,
    pub backend: DummyBackend,
    pub log: ExecutionLog,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(FrameGraphConfig::default().with_name("test"))
    }

    pub fn with_config(config: FrameGraphConfig) -> Self {
        init_logging();
        Self {
            graph: FrameGraph::with_config(config),
            resources: ResourceRegistry::new(),
            backend: DummyBackend::new(),
            log: ExecutionLog::default(),
        }
    }

    pub fn texture(&mut self, label: &str) -> ResourceHandle {
        self.resources.create_texture(
            TextureDescriptor::new_2d(
                1280,
                720,
                TextureFormat::Rgba16Float,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            )
            .with_label(label),
        )
    }

    pub fn depth(&mut self, label: &str) -> ResourceHandle {
        self.resources.create_texture(
            TextureDescriptor::new_2d(
                1280,
                720,
                TextureFormat::Depth32Float,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            )
            .with_label(label),
        )
    }

    pub fn buffer(&mut self, label: &str) -> ResourceHandle {
        self.resources
            .create_buffer(BufferDescriptor::new(4096, BufferUsage::STORAGE).with_label(label))
    }

    pub fn backbuffer(&mut self) -> ResourceHandle {
        self.resources
            .import_external(ResourceTrack::Texture, ExternalHandle(0xB0B))
    }

    pub fn compile(&mut self) -> FrameGraphResult<()> {
        self.graph.compile(&self.resources)
    }

    pub fn execute(&mut self) -> FrameGraphResult<()> {
        self.graph
            .execute(&mut self.log, &mut self.resources, &mut self.backend)
    }

    pub fn render(&mut self) -> FrameGraphResult<()> {
        self.graph
            .render_frame(&mut self.log, &mut self.resources, &mut self.backend)
    }
}
