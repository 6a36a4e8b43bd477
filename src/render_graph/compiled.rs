//! Per-frame compiled metadata.
//!
//! [`CompiledGraph`] holds one [`CompiledPassInfo`] per declared pass and one
//! [`CompiledResourceInfo`] per declared resource and track. The arenas are
//! rebuilt on every compile: elements from earlier frames are reset in place
//! rather than reallocated, so a steady-state frame performs no allocation
//! for its bookkeeping.

use crate::backend::types::FenceHandle;
use crate::pool::Poolable;
use crate::render_graph::resource::{PerTrack, ResourceHandle, ResourceTrack};

/// Usage of one resource across the frame.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompiledResourceInfo {
    /// Passes writing the resource, strictly ascending.
    pub(crate) producers: Vec<usize>,
    /// Passes reading the resource, strictly ascending.
    pub(crate) consumers: Vec<usize>,
    pub(crate) ref_count: u32,
    pub(crate) imported: bool,
    pub(crate) temporal: bool,
    /// Last pass that pinned the resource as temporal.
    pub(crate) pinned_by: Option<usize>,
    pub(crate) created: bool,
}

impl CompiledResourceInfo {
    fn reset(&mut self) {
        self.producers.clear();
        self.consumers.clear();
        self.ref_count = 0;
        self.imported = false;
        self.temporal = false;
        self.pinned_by = None;
        self.created = false;
    }

    pub fn producers(&self) -> &[usize] {
        &self.producers
    }

    pub fn consumers(&self) -> &[usize] {
        &self.consumers
    }

    /// Consumers still alive after culling.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn is_imported(&self) -> bool {
        self.imported
    }

    pub fn is_temporal(&self) -> bool {
        self.temporal
    }

    /// Whether the provider currently holds the resource alive for this frame.
    pub fn is_created(&self) -> bool {
        self.created
    }
}

/// Scheduling decisions for one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompiledPassInfo {
    pub(crate) ref_count: u32,
    pub(crate) culled: bool,
    pub(crate) has_side_effect: bool,
    pub(crate) async_compute: bool,
    pub(crate) allow_culling: bool,
    pub(crate) create: PerTrack<Vec<ResourceHandle>>,
    pub(crate) release: PerTrack<Vec<ResourceHandle>>,
    pub(crate) sync_to_pass_index: Option<usize>,
    pub(crate) sync_from_pass_index: Option<usize>,
    pub(crate) needs_graphics_fence: bool,
    pub(crate) fence: Option<FenceHandle>,
}

impl CompiledPassInfo {
    fn reset(&mut self) {
        self.ref_count = 0;
        self.culled = false;
        self.has_side_effect = false;
        self.async_compute = false;
        self.allow_culling = false;
        for list in self.create.iter_mut().chain(self.release.iter_mut()) {
            list.clear();
        }
        self.sync_to_pass_index = None;
        self.sync_from_pass_index = None;
        self.needs_graphics_fence = false;
        self.fence = None;
    }

    /// Written resources that are still needed.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn is_culled(&self) -> bool {
        self.culled
    }

    /// Set when the pass writes an imported resource.
    pub fn has_side_effect(&self) -> bool {
        self.has_side_effect
    }

    pub fn is_async_compute(&self) -> bool {
        self.async_compute
    }

    pub fn create_list(&self, track: ResourceTrack) -> &[ResourceHandle] {
        &self.create[track.index()]
    }

    pub fn release_list(&self, track: ResourceTrack) -> &[ResourceHandle] {
        &self.release[track.index()]
    }

    /// Resources created before the pass runs, textures first.
    pub fn creates(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.create.iter().flatten().copied()
    }

    /// Resources released after the pass runs, textures first.
    pub fn releases(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.release.iter().flatten().copied()
    }

    /// Pass on the other pipe this one waits for.
    pub fn sync_to_pass_index(&self) -> Option<usize> {
        self.sync_to_pass_index
    }

    /// Earliest pass on the other pipe waiting for this one.
    pub fn sync_from_pass_index(&self) -> Option<usize> {
        self.sync_from_pass_index
    }

    pub fn needs_graphics_fence(&self) -> bool {
        self.needs_graphics_fence
    }

    /// Fence recorded after the pass executed, if it needed one.
    pub fn fence(&self) -> Option<FenceHandle> {
        self.fence
    }
}

/// Compiled metadata for one frame.
#[derive(Debug, Default)]
pub struct CompiledGraph {
    pub(crate) passes: Vec<CompiledPassInfo>,
    pub(crate) pass_len: usize,
    pub(crate) resources: PerTrack<Vec<CompiledResourceInfo>>,
    pub(crate) resource_len: PerTrack<usize>,
    /// Worklist storage for culling, kept across frames.
    pub(crate) cull_stack: Vec<ResourceHandle>,
}

impl CompiledGraph {
    /// Size the arenas for this frame, resetting every reused element.
    pub(crate) fn resize(&mut self, pass_count: usize, resource_counts: PerTrack<usize>) {
        resize_arena(&mut self.passes, pass_count, CompiledPassInfo::reset);
        self.pass_len = pass_count;
        for track in ResourceTrack::ALL {
            let count = resource_counts[track.index()];
            resize_arena(
                &mut self.resources[track.index()],
                count,
                CompiledResourceInfo::reset,
            );
            self.resource_len[track.index()] = count;
        }
        self.cull_stack.clear();
    }

    pub fn pass_count(&self) -> usize {
        self.pass_len
    }

    pub fn resource_count(&self, track: ResourceTrack) -> usize {
        self.resource_len[track.index()]
    }

    pub fn passes(&self) -> &[CompiledPassInfo] {
        &self.passes[..self.pass_len]
    }

    pub fn pass(&self, index: usize) -> &CompiledPassInfo {
        &self.passes()[index]
    }

    pub fn resources(&self, track: ResourceTrack) -> &[CompiledResourceInfo] {
        &self.resources[track.index()][..self.resource_len[track.index()]]
    }

    pub fn resource(&self, handle: ResourceHandle) -> &CompiledResourceInfo {
        &self.resources(handle.track())[handle.index()]
    }

    pub(crate) fn pass_mut(&mut self, index: usize) -> &mut CompiledPassInfo {
        &mut self.passes[..self.pass_len][index]
    }

    pub(crate) fn resource_mut(&mut self, handle: ResourceHandle) -> &mut CompiledResourceInfo {
        let track = handle.track().index();
        &mut self.resources[track][..self.resource_len[track]][handle.index()]
    }

    /// Indices of passes that survived culling, in execution order.
    pub fn surviving_passes(&self) -> impl Iterator<Item = usize> + '_ {
        self.passes()
            .iter()
            .enumerate()
            .filter(|(_, info)| !info.culled)
            .map(|(index, _)| index)
    }

    pub fn culled_count(&self) -> usize {
        self.passes().iter().filter(|info| info.culled).count()
    }

    /// Number of cross-pipe waits scheduled for the frame.
    pub fn sync_point_count(&self) -> usize {
        self.passes()
            .iter()
            .filter(|info| info.sync_to_pass_index.is_some())
            .count()
    }

    /// Resources currently marked as created.
    pub fn created_resources(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        ResourceTrack::ALL.into_iter().flat_map(move |track| {
            self.resources(track)
                .iter()
                .enumerate()
                .filter(|(_, info)| info.created)
                .map(move |(index, _)| ResourceHandle::new(track, index as u32))
        })
    }
}

fn resize_arena<T: Default>(arena: &mut Vec<T>, len: usize, reset: fn(&mut T)) {
    let reused = arena.len().min(len);
    for element in &mut arena[..reused] {
        reset(element);
    }
    if arena.len() < len {
        arena.resize_with(len, T::default);
    }
}

/// Compares the logical contents only; parked elements beyond the frame's
/// length are ignored.
impl PartialEq for CompiledGraph {
    fn eq(&self, other: &Self) -> bool {
        self.passes() == other.passes()
            && ResourceTrack::ALL
                .into_iter()
                .all(|track| self.resources(track) == other.resources(track))
    }
}

impl Poolable for CompiledGraph {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.pass_len = 0;
        self.resource_len = [0; ResourceTrack::COUNT];
        self.cull_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_resets_reused_elements() {
        let mut compiled = CompiledGraph::default();
        compiled.resize(2, [1, 0]);
        compiled.pass_mut(1).culled = true;
        compiled.pass_mut(1).create[0].push(ResourceHandle::texture(0));
        compiled.resource_mut(ResourceHandle::texture(0)).producers.push(1);

        compiled.resize(3, [1, 1]);

        assert_eq!(compiled.pass_count(), 3);
        assert!(!compiled.pass(1).is_culled());
        assert!(compiled.pass(1).create_list(ResourceTrack::Texture).is_empty());
        assert!(compiled.resource(ResourceHandle::texture(0)).producers().is_empty());
        assert_eq!(compiled.resource_count(ResourceTrack::Buffer), 1);
    }

    #[test]
    fn test_shrinking_keeps_storage() {
        let mut compiled = CompiledGraph::default();
        compiled.resize(8, [4, 4]);
        compiled.resize(2, [1, 0]);

        assert_eq!(compiled.passes().len(), 2);
        assert_eq!(compiled.resources(ResourceTrack::Buffer).len(), 0);
        assert_eq!(compiled.passes.len(), 8);
    }

    #[test]
    fn test_reset_hides_contents() {
        let mut compiled = CompiledGraph::default();
        compiled.resize(4, [2, 2]);
        Poolable::reset(&mut compiled);
        assert_eq!(compiled.pass_count(), 0);
        assert!(compiled.passes().is_empty());
        assert!(compiled.resources(ResourceTrack::Texture).is_empty());
    }

    #[test]
    fn test_created_resources() {
        let mut compiled = CompiledGraph::default();
        compiled.resize(1, [2, 1]);
        compiled.resource_mut(ResourceHandle::texture(1)).created = true;
        compiled.resource_mut(ResourceHandle::buffer(0)).created = true;

        let created: Vec<_> = compiled.created_resources().collect();
        assert_eq!(
            created,
            vec![ResourceHandle::texture(1), ResourceHandle::buffer(0)]
        );
    }
}
