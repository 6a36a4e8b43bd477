//! Resources tracked by the frame graph
//!
//! Resources are addressed by `(track, index)` handles. The graph itself only
//! keeps usage metadata; [`ResourceRegistry`] is the bundled
//! [`ResourceProvider`] that owns declarations and live state.

use std::fmt;

use crate::backend::traits::{BackendError, BackendResult, ResourceProvider};
use crate::backend::types::*;

/// Category of resource with its own parallel bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceTrack {
    Texture,
    Buffer,
}

impl ResourceTrack {
    pub const COUNT: usize = 2;
    pub const ALL: [ResourceTrack; Self::COUNT] = [ResourceTrack::Texture, ResourceTrack::Buffer];

    pub fn index(self) -> usize {
        match self {
            ResourceTrack::Texture => 0,
            ResourceTrack::Buffer => 1,
        }
    }
}

/// Handle to a resource, valid for the frame it was declared in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle {
    track: ResourceTrack,
    index: u32,
}

impl ResourceHandle {
    pub fn new(track: ResourceTrack, index: u32) -> Self {
        Self { track, index }
    }

    pub fn texture(index: u32) -> Self {
        Self::new(ResourceTrack::Texture, index)
    }

    pub fn buffer(index: u32) -> Self {
        Self::new(ResourceTrack::Buffer, index)
    }

    pub fn track(self) -> ResourceTrack {
        self.track
    }

    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.track, self.index)
    }
}

/// Per-track arrays indexed by [`ResourceTrack::index`].
pub type PerTrack<T> = [T; ResourceTrack::COUNT];

#[derive(Debug, Clone)]
struct ResourceEntry {
    descriptor: Option<ResourceDescriptor>,
    external: Option<ExternalHandle>,
    temporal: bool,
    alive: bool,
}

/// Default resource provider: declarations plus live-state bookkeeping.
///
/// Transient resources are declared with [`create_texture`](Self::create_texture)
/// or [`create_buffer`](Self::create_buffer) and become alive only when the
/// execution driver asks for them. Declarations are per frame and dropped by
/// [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: PerTrack<Vec<ResourceEntry>>,
    created_total: usize,
    released_total: usize,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&mut self, track: ResourceTrack, entry: ResourceEntry) -> ResourceHandle {
        let list = &mut self.entries[track.index()];
        let handle = ResourceHandle::new(track, list.len() as u32);
        list.push(entry);
        handle
    }

    /// Declare a transient texture.
    pub fn create_texture(&mut self, desc: TextureDescriptor) -> ResourceHandle {
        self.declare(
            ResourceTrack::Texture,
            ResourceEntry {
                descriptor: Some(ResourceDescriptor::Texture(desc)),
                external: None,
                temporal: false,
                alive: false,
            },
        )
    }

    /// Declare a transient buffer.
    pub fn create_buffer(&mut self, desc: BufferDescriptor) -> ResourceHandle {
        self.declare(
            ResourceTrack::Buffer,
            ResourceEntry {
                descriptor: Some(ResourceDescriptor::Buffer(desc)),
                external: None,
                temporal: false,
                alive: false,
            },
        )
    }

    /// Import an external texture along with its descriptor.
    pub fn import_texture(&mut self, external: ExternalHandle, desc: TextureDescriptor) -> ResourceHandle {
        self.declare(
            ResourceTrack::Texture,
            ResourceEntry {
                descriptor: Some(ResourceDescriptor::Texture(desc)),
                external: Some(external),
                temporal: false,
                alive: false,
            },
        )
    }

    /// Mark a resource as temporal so no compile ever eliminates it.
    pub fn set_temporal(&mut self, handle: ResourceHandle, temporal: bool) {
        if let Some(entry) = self.entry_mut(handle) {
            entry.temporal = temporal;
        }
    }

    pub fn external_of(&self, handle: ResourceHandle) -> Option<ExternalHandle> {
        self.entry(handle).and_then(|entry| entry.external)
    }

    pub fn is_alive(&self, handle: ResourceHandle) -> bool {
        self.entry(handle).is_some_and(|entry| entry.alive)
    }

    /// Transient resources currently materialized.
    pub fn live_count(&self) -> usize {
        self.entries
            .iter()
            .flatten()
            .filter(|entry| entry.alive)
            .count()
    }

    pub fn created_total(&self) -> usize {
        self.created_total
    }

    pub fn released_total(&self) -> usize {
        self.released_total
    }

    /// Drop every declaration made this frame.
    pub fn clear(&mut self) {
        let leaked = self.live_count();
        if leaked > 0 {
            log::warn!("ResourceRegistry: clearing with {} resources still alive", leaked);
        }
        for list in &mut self.entries {
            list.clear();
        }
    }

    fn entry(&self, handle: ResourceHandle) -> Option<&ResourceEntry> {
        self.entries[handle.track().index()].get(handle.index())
    }

    fn entry_mut(&mut self, handle: ResourceHandle) -> Option<&mut ResourceEntry> {
        self.entries[handle.track().index()].get_mut(handle.index())
    }
}

impl ResourceProvider for ResourceRegistry {
    fn import_external(&mut self, track: ResourceTrack, external: ExternalHandle) -> ResourceHandle {
        self.declare(
            track,
            ResourceEntry {
                descriptor: None,
                external: Some(external),
                temporal: false,
                alive: false,
            },
        )
    }

    fn create(&mut self, handle: ResourceHandle) -> BackendResult<()> {
        let entry = self
            .entry_mut(handle)
            .ok_or(BackendError::UnknownResource(handle))?;
        if entry.external.is_some() {
            return Err(BackendError::ResourceCreationFailed(
                handle,
                "imported resources are owned externally".to_string(),
            ));
        }
        if entry.alive {
            return Err(BackendError::ResourceCreationFailed(
                handle,
                "resource is already alive".to_string(),
            ));
        }
        entry.alive = true;
        self.created_total += 1;
        log::trace!("ResourceRegistry: created {:?}", handle);
        Ok(())
    }

    fn release(&mut self, handle: ResourceHandle) -> BackendResult<()> {
        let entry = self
            .entry_mut(handle)
            .ok_or(BackendError::UnknownResource(handle))?;
        if !entry.alive {
            return Err(BackendError::ResourceNotAlive(handle));
        }
        entry.alive = false;
        self.released_total += 1;
        log::trace!("ResourceRegistry: released {:?}", handle);
        Ok(())
    }

    fn resource_count(&self, track: ResourceTrack) -> usize {
        self.entries[track.index()].len()
    }

    fn is_imported(&self, handle: ResourceHandle) -> bool {
        self.entry(handle).is_some_and(|entry| entry.external.is_some())
    }

    fn is_temporal(&self, handle: ResourceHandle) -> bool {
        self.entry(handle).is_some_and(|entry| entry.temporal)
    }

    fn descriptor_of(&self, handle: ResourceHandle) -> Option<&ResourceDescriptor> {
        self.entry(handle).and_then(|entry| entry.descriptor.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_desc() -> TextureDescriptor {
        TextureDescriptor::new_2d(
            1920,
            1080,
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }

    #[test]
    fn test_tracks_are_indexed_independently() {
        let mut registry = ResourceRegistry::new();
        let tex0 = registry.create_texture(color_desc());
        let buf0 = registry.create_buffer(BufferDescriptor::new(64, BufferUsage::STORAGE));
        let tex1 = registry.create_texture(color_desc());

        assert_eq!(tex0, ResourceHandle::texture(0));
        assert_eq!(buf0, ResourceHandle::buffer(0));
        assert_eq!(tex1, ResourceHandle::texture(1));
        assert_eq!(registry.resource_count(ResourceTrack::Texture), 2);
        assert_eq!(registry.resource_count(ResourceTrack::Buffer), 1);
    }

    #[test]
    fn test_import_marks_imported() {
        let mut registry = ResourceRegistry::new();
        let backbuffer = registry.import_external(ResourceTrack::Texture, ExternalHandle(7));
        let local = registry.create_texture(color_desc());

        assert!(registry.is_imported(backbuffer));
        assert!(!registry.is_imported(local));
        assert_eq!(registry.external_of(backbuffer), Some(ExternalHandle(7)));
        assert!(registry.descriptor_of(backbuffer).is_none());
    }

    #[test]
    fn test_create_release_cycle() {
        let mut registry = ResourceRegistry::new();
        let handle = registry.create_texture(color_desc());

        registry.create(handle).unwrap();
        assert!(registry.is_alive(handle));
        assert!(registry.create(handle).is_err());

        registry.release(handle).unwrap();
        assert!(!registry.is_alive(handle));
        assert_eq!(
            registry.release(handle),
            Err(BackendError::ResourceNotAlive(handle))
        );
        assert_eq!(registry.created_total(), 1);
        assert_eq!(registry.released_total(), 1);
    }

    #[test]
    fn test_imported_resources_cannot_be_created() {
        let mut registry = ResourceRegistry::new();
        let handle = registry.import_texture(ExternalHandle(1), color_desc());
        assert!(registry.create(handle).is_err());
    }

    #[test]
    fn test_unknown_handle() {
        let mut registry = ResourceRegistry::new();
        let handle = ResourceHandle::buffer(3);
        assert_eq!(
            registry.create(handle),
            Err(BackendError::UnknownResource(handle))
        );
    }

    #[test]
    fn test_temporal_flag() {
        let mut registry = ResourceRegistry::new();
        let history = registry.create_texture(color_desc());
        registry.set_temporal(history, true);
        assert!(registry.is_temporal(history));
    }

    #[test]
    fn test_clear_drops_declarations() {
        let mut registry = ResourceRegistry::new();
        registry.create_texture(color_desc());
        registry.create_buffer(BufferDescriptor::new(16, BufferUsage::UNIFORM));
        registry.clear();
        assert_eq!(registry.resource_count(ResourceTrack::Texture), 0);
        assert_eq!(registry.resource_count(ResourceTrack::Buffer), 0);
    }

    #[test]
    fn test_handle_debug_format() {
        assert_eq!(format!("{:?}", ResourceHandle::texture(4)), "Texture#4");
    }
}
