//! Dummy backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. Every hook invocation
//! is appended to a command log so tests can assert on the exact sequence of
//! stream switches, fences and attachment bindings the graph produced.

use crate::backend::traits::{AttachmentBinding, Backend, BackendError, BackendResult};
use crate::backend::types::*;
use crate::render_graph::resource::ResourceHandle;

/// A single recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    BeginAsyncStream(CommandStream),
    BindAttachments {
        stream: CommandStream,
        pass: String,
        colors: Vec<ResourceHandle>,
        depth: Option<ResourceHandle>,
    },
    WaitFence {
        stream: CommandStream,
        fence: FenceHandle,
    },
    SignalFence {
        stream: CommandStream,
        fence: FenceHandle,
    },
    SubmitAsync(CommandStream),
    AbandonStream(CommandStream),
    CreateSampler(SamplerHandle),
}

/// Dummy backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    commands: Vec<BackendCommand>,
    next_stream: u64,
    next_fence: u64,
    next_sampler: u64,
    primary: Option<CommandStream>,
    fail_attachment_binding: bool,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `bind_attachments` call fail.
    pub fn with_failing_attachments(mut self) -> Self {
        self.fail_attachment_binding = true;
        self
    }

    /// Recorded commands, in call order.
    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    /// Fences recorded as waits, in call order.
    pub fn waited_fences(&self) -> Vec<FenceHandle> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                BackendCommand::WaitFence { fence, .. } => Some(*fence),
                _ => None,
            })
            .collect()
    }

    /// Fences recorded as signals, in call order.
    pub fn signaled_fences(&self) -> Vec<FenceHandle> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                BackendCommand::SignalFence { fence, .. } => Some(*fence),
                _ => None,
            })
            .collect()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    fn allocate_stream(&mut self, pipe: Pipe) -> CommandStream {
        let stream = CommandStream {
            id: self.next_stream,
            pipe,
        };
        self.next_stream += 1;
        stream
    }
}

impl Backend for DummyBackend {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn primary_stream(&mut self) -> CommandStream {
        if let Some(stream) = self.primary {
            return stream;
        }
        let stream = self.allocate_stream(Pipe::Graphics);
        self.primary = Some(stream);
        stream
    }

    fn begin_async_stream(&mut self) -> CommandStream {
        let stream = self.allocate_stream(Pipe::AsyncCompute);
        log::trace!("DummyBackend: begin async stream {}", stream.id);
        self.commands.push(BackendCommand::BeginAsyncStream(stream));
        stream
    }

    fn bind_attachments(
        &mut self,
        stream: CommandStream,
        binding: &AttachmentBinding<'_>,
    ) -> BackendResult<()> {
        if self.fail_attachment_binding {
            return Err(BackendError::AttachmentBindFailed(
                binding.pass_name.to_string(),
                "dummy backend configured to fail".to_string(),
            ));
        }
        self.commands.push(BackendCommand::BindAttachments {
            stream,
            pass: binding.pass_name.to_string(),
            colors: binding.colors.iter().map(|color| color.handle).collect(),
            depth: binding.depth.map(|depth| depth.handle),
        });
        Ok(())
    }

    fn wait_fence(&mut self, stream: CommandStream, fence: FenceHandle) {
        log::trace!("DummyBackend: stream {} waits on fence {}", stream.id, fence.0);
        self.commands.push(BackendCommand::WaitFence { stream, fence });
    }

    fn signal_fence(&mut self, stream: CommandStream) -> FenceHandle {
        let fence = FenceHandle(self.next_fence);
        self.next_fence += 1;
        log::trace!("DummyBackend: stream {} signals fence {}", stream.id, fence.0);
        self.commands.push(BackendCommand::SignalFence { stream, fence });
        fence
    }

    fn submit_async(&mut self, stream: CommandStream) {
        log::trace!("DummyBackend: submit async stream {}", stream.id);
        self.commands.push(BackendCommand::SubmitAsync(stream));
    }

    fn abandon_stream(&mut self, stream: CommandStream) {
        log::trace!("DummyBackend: abandon async stream {}", stream.id);
        self.commands.push(BackendCommand::AbandonStream(stream));
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("DummyBackend: creating sampler {:?}", desc.label);
        let sampler = SamplerHandle(self.next_sampler);
        self.next_sampler += 1;
        self.commands.push(BackendCommand::CreateSampler(sampler));
        Ok(sampler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_stream_is_stable() {
        let mut backend = DummyBackend::new();
        let a = backend.primary_stream();
        let b = backend.primary_stream();
        assert_eq!(a, b);
        assert_eq!(a.pipe, Pipe::Graphics);
    }

    #[test]
    fn test_async_streams_are_distinct() {
        let mut backend = DummyBackend::new();
        let primary = backend.primary_stream();
        let secondary = backend.begin_async_stream();
        assert_ne!(primary.id, secondary.id);
        assert_eq!(secondary.pipe, Pipe::AsyncCompute);
    }

    #[test]
    fn test_fence_log() {
        let mut backend = DummyBackend::new();
        let stream = backend.begin_async_stream();
        let fence = backend.signal_fence(stream);
        let primary = backend.primary_stream();
        backend.wait_fence(primary, fence);

        assert_eq!(backend.signaled_fences(), vec![fence]);
        assert_eq!(backend.waited_fences(), vec![fence]);
    }

    #[test]
    fn test_failing_attachments() {
        let mut backend = DummyBackend::new().with_failing_attachments();
        let stream = backend.primary_stream();
        let binding = AttachmentBinding {
            pass_name: "gbuffer",
            colors: &[],
            depth: None,
        };
        assert!(backend.bind_attachments(stream, &binding).is_err());
    }

    #[test]
    fn test_abandon_stream_is_recorded() {
        let mut backend = DummyBackend::new();
        let stream = backend.begin_async_stream();
        backend.abandon_stream(stream);
        assert_eq!(
            backend.commands(),
            &[
                BackendCommand::BeginAsyncStream(stream),
                BackendCommand::AbandonStream(stream),
            ]
        );
    }
}
