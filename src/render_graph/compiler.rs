//! Frame graph compilation.
//!
//! Compilation turns the declared pass list into per-pass scheduling
//! decisions, stored in a [`CompiledGraph`]:
//!
//! 1. **Dependency tracking** - producer/consumer lists and reference counts
//! 2. **Culling** - worklist elimination of passes with no observable effect
//! 3. **Synchronization** - minimal waits between the graphics and async compute pipes
//! 4. **Lifetimes** - where each transient resource is created and released
//!
//! Passes are never reordered. A pass index is its declaration order, which is
//! also its execution order.

use crate::backend::traits::ResourceProvider;
use crate::render_graph::compiled::CompiledGraph;
use crate::render_graph::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::pass::RenderPass;
use crate::render_graph::resource::{ResourceHandle, ResourceTrack};

/// Compile `passes` into `compiled`, reusing its storage.
pub(crate) fn compile(
    passes: &[RenderPass],
    resources: &dyn ResourceProvider,
    cull_passes: bool,
    compiled: &mut CompiledGraph,
) -> FrameGraphResult<()> {
    let resource_counts = ResourceTrack::ALL.map(|track| resources.resource_count(track));
    compiled.resize(passes.len(), resource_counts);

    build_dependencies(passes, resources, compiled)?;
    if cull_passes {
        cull_unused_passes(passes, compiled);
    }
    synchronize_pipes(passes, compiled);
    allocate_lifetimes(passes, compiled)
}

fn push_unique(list: &mut Vec<usize>, index: usize) {
    if list.last() != Some(&index) {
        list.push(index);
    }
}

fn validate(
    pass: &RenderPass,
    resource: ResourceHandle,
    compiled: &CompiledGraph,
) -> FrameGraphResult<()> {
    if resource.index() >= compiled.resource_count(resource.track()) {
        return Err(FrameGraphError::InvalidResource {
            pass: pass.name.clone(),
            resource,
        });
    }
    Ok(())
}

fn build_dependencies(
    passes: &[RenderPass],
    resources: &dyn ResourceProvider,
    compiled: &mut CompiledGraph,
) -> FrameGraphResult<()> {
    for track in ResourceTrack::ALL {
        for index in 0..compiled.resource_count(track) {
            let resource = ResourceHandle::new(track, index as u32);
            compiled.resource_mut(resource).imported = resources.is_imported(resource);
        }
    }

    for pass in passes {
        let index = pass.index;
        {
            let info = compiled.pass_mut(index);
            info.async_compute = pass.is_async_compute();
            info.allow_culling = pass.allows_culling();
        }

        for track in ResourceTrack::ALL {
            let t = track.index();

            for &resource in &pass.reads[t] {
                validate(pass, resource, compiled)?;
                let info = compiled.resource_mut(resource);
                push_unique(&mut info.consumers, index);
                info.ref_count += 1;
            }

            for &resource in &pass.writes[t] {
                validate(pass, resource, compiled)?;
                let imported = {
                    let info = compiled.resource_mut(resource);
                    push_unique(&mut info.producers, index);
                    info.imported
                };
                let info = compiled.pass_mut(index);
                info.ref_count += 1;
                if imported {
                    info.has_side_effect = true;
                }
            }

            // Temporal resources hold a synthetic producer and consumer entry
            // for every pass touching them, so their count never reaches zero.
            let flagged = pass.reads[t]
                .iter()
                .chain(&pass.writes[t])
                .copied()
                .filter(|&resource| resources.is_temporal(resource));
            for resource in pass.temporal[t].iter().copied().chain(flagged) {
                validate(pass, resource, compiled)?;
                let info = compiled.resource_mut(resource);
                if info.pinned_by == Some(index) {
                    continue;
                }
                info.pinned_by = Some(index);
                info.temporal = true;
                push_unique(&mut info.producers, index);
                push_unique(&mut info.consumers, index);
                info.ref_count += 1;
                compiled.pass_mut(index).ref_count += 1;
            }
        }
    }

    Ok(())
}

fn cull_unused_passes(passes: &[RenderPass], compiled: &mut CompiledGraph) {
    let mut stack = std::mem::take(&mut compiled.cull_stack);

    for track in ResourceTrack::ALL {
        for index in 0..compiled.resource_count(track) {
            let resource = ResourceHandle::new(track, index as u32);
            if compiled.resource(resource).ref_count == 0 {
                stack.push(resource);
            }
        }
    }

    // Passes writing nothing are never reached through a producer list.
    for pass in passes {
        let info = compiled.pass(pass.index);
        if info.ref_count == 0 && !info.has_side_effect && info.allow_culling {
            cull_pass(pass, compiled, &mut stack);
        }
    }

    while let Some(resource) = stack.pop() {
        for i in 0..compiled.resource(resource).producers.len() {
            let producer = compiled.resource(resource).producers[i];
            let info = compiled.pass_mut(producer);
            if info.culled {
                continue;
            }
            info.ref_count = info.ref_count.saturating_sub(1);
            if info.ref_count == 0 && !info.has_side_effect && info.allow_culling {
                cull_pass(&passes[producer], compiled, &mut stack);
            }
        }
    }

    compiled.cull_stack = stack;
}

fn cull_pass(pass: &RenderPass, compiled: &mut CompiledGraph, stack: &mut Vec<ResourceHandle>) {
    compiled.pass_mut(pass.index).culled = true;
    log::trace!("FrameGraph: culled pass '{}'", pass.name);

    for resource in pass.reads() {
        let info = compiled.resource_mut(resource);
        if info.ref_count == 0 {
            continue;
        }
        info.ref_count -= 1;
        if info.ref_count == 0 {
            stack.push(resource);
        }
    }
}

/// Latest surviving producer strictly before `index`.
fn latest_producer(
    compiled: &CompiledGraph,
    resource: ResourceHandle,
    index: usize,
) -> Option<usize> {
    compiled
        .resource(resource)
        .producers
        .iter()
        .copied()
        .take_while(|&producer| producer < index)
        .filter(|&producer| !compiled.pass(producer).culled)
        .last()
}

fn synchronize_pipes(passes: &[RenderPass], compiled: &mut CompiledGraph) {
    let mut last_graphics_sync: Option<usize> = None;
    let mut last_compute_sync: Option<usize> = None;

    for pass in passes {
        let index = pass.index;
        if compiled.pass(index).culled {
            continue;
        }
        let is_async = compiled.pass(index).async_compute;

        for resource in pass.reads().chain(pass.writes()) {
            let Some(producer) = latest_producer(compiled, resource, index) else {
                continue;
            };
            if compiled.pass(producer).async_compute == is_async {
                continue;
            }

            // Cursor of the producer's pipe.
            let cursor = if is_async {
                &mut last_graphics_sync
            } else {
                &mut last_compute_sync
            };
            if cursor.is_some_and(|synced| producer <= synced) {
                continue;
            }
            *cursor = Some(producer);

            compiled.pass_mut(index).sync_to_pass_index = Some(producer);
            let info = compiled.pass_mut(producer);
            info.needs_graphics_fence = true;
            if info.sync_from_pass_index.is_none() {
                info.sync_from_pass_index = Some(index);
            }
        }
    }
}

fn first_surviving(compiled: &CompiledGraph, list: &[usize]) -> Option<usize> {
    list.iter().copied().find(|&pass| !compiled.pass(pass).culled)
}

fn last_surviving(compiled: &CompiledGraph, list: &[usize]) -> Option<usize> {
    list.iter().rev().copied().find(|&pass| !compiled.pass(pass).culled)
}

fn allocate_lifetimes(passes: &[RenderPass], compiled: &mut CompiledGraph) -> FrameGraphResult<()> {
    for track in ResourceTrack::ALL {
        for index in 0..compiled.resource_count(track) {
            let resource = ResourceHandle::new(track, index as u32);
            let info = compiled.resource(resource);
            if info.imported {
                continue;
            }

            let Some(first_producer) = first_surviving(compiled, &info.producers) else {
                if first_surviving(compiled, &info.consumers).is_some() {
                    log::warn!("FrameGraph: {:?} is read but never written", resource);
                }
                continue;
            };
            let first_consumer = first_surviving(compiled, &info.consumers);
            let last_consumer = last_surviving(compiled, &info.consumers);
            let last_producer = last_surviving(compiled, &info.producers).unwrap_or(first_producer);

            // A read ahead of the first write still needs the resource alive.
            let create_at = first_consumer.map_or(first_producer, |c| c.min(first_producer));
            let last_use = last_consumer.map_or(last_producer, |c| c.max(last_producer));

            let release_at = if compiled.pass(last_use).async_compute {
                async_release_point(passes, compiled, last_use, resource)?
            } else {
                last_use
            };

            compiled.pass_mut(create_at).create[track.index()].push(resource);
            compiled.pass_mut(release_at).release[track.index()].push(resource);
        }
    }
    Ok(())
}

/// Release point of a resource last used on the async pipe.
///
/// The resource must outlive the async work, so it is released right before
/// the first graphics pass that waits on the async pipe at or after `last_use`.
fn async_release_point(
    passes: &[RenderPass],
    compiled: &CompiledGraph,
    last_use: usize,
    resource: ResourceHandle,
) -> FrameGraphResult<usize> {
    let mut waiter = compiled.pass(last_use).sync_from_pass_index;
    let mut current = last_use + 1;
    while waiter.is_none() && current < compiled.pass_count() {
        let info = compiled.pass(current);
        if info.async_compute && !info.culled {
            waiter = info.sync_from_pass_index;
        }
        current += 1;
    }

    let waiter = waiter.ok_or_else(|| FrameGraphError::UnsynchronizedAsyncPass {
        pass: passes[last_use].name.clone(),
        resource,
    })?;

    let mut release = waiter.saturating_sub(1).max(last_use);
    while release > last_use && compiled.pass(release).culled {
        release -= 1;
    }
    Ok(release)
}
