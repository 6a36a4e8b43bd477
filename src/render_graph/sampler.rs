//! Default-sampler lookup table owned by the frame graph.
//!
//! Samplers are created lazily the first time a pass asks for a descriptor
//! and reused by every later pass of the same frame. The table is emptied
//! together with the rest of the per-frame state.

use std::collections::HashMap;

use crate::backend::traits::{Backend, BackendResult};
use crate::backend::types::{SamplerDescriptor, SamplerHandle};

#[derive(Debug, Default)]
pub struct SamplerCache {
    samplers: HashMap<SamplerDescriptor, SamplerHandle>,
}

impl SamplerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a sampler, creating it through the backend on first use.
    pub fn get_or_create(
        &mut self,
        desc: &SamplerDescriptor,
        backend: &mut dyn Backend,
    ) -> BackendResult<SamplerHandle> {
        if let Some(&sampler) = self.samplers.get(desc) {
            return Ok(sampler);
        }
        let sampler = backend.create_sampler(desc)?;
        self.samplers.insert(desc.clone(), sampler);
        Ok(sampler)
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }

    pub fn clear(&mut self) {
        self.samplers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_sampler_created_once_per_descriptor() {
        let mut backend = DummyBackend::new();
        let mut cache = SamplerCache::new();

        let linear = cache
            .get_or_create(&SamplerDescriptor::default(), &mut backend)
            .unwrap();
        let again = cache
            .get_or_create(&SamplerDescriptor::default(), &mut backend)
            .unwrap();
        let nearest = cache
            .get_or_create(&SamplerDescriptor::nearest(), &mut backend)
            .unwrap();

        assert_eq!(linear, again);
        assert_ne!(linear, nearest);
        assert_eq!(cache.len(), 2);
        assert_eq!(backend.commands().len(), 2);
    }

    #[test]
    fn test_clear_forgets_samplers() {
        let mut backend = DummyBackend::new();
        let mut cache = SamplerCache::new();
        cache
            .get_or_create(&SamplerDescriptor::default(), &mut backend)
            .unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
