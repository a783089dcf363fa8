//! Generator registry.
//!
//! Registration order is the dispatch order for project generation, so the
//! registry keeps generators in a list rather than a map.

use anyhow::{bail, Result};

use crate::core::platform::CanonicalPlatform;
use crate::generator::makefile::MakefileGenerator;
use crate::generator::trait_def::Generator;
use crate::generator::vstudio::VisualStudioGenerator;

/// Registry of available generators.
pub struct GeneratorRegistry {
    generators: Vec<Box<dyn Generator>>,
}

impl GeneratorRegistry {
    /// Create a registry with all built-in generators.
    pub fn new() -> Self {
        let mut registry = GeneratorRegistry::empty();
        registry.register(Box::new(MakefileGenerator::new()));
        registry.register(Box::new(VisualStudioGenerator::new()));
        registry
    }

    /// Create a registry without any generators.
    pub fn empty() -> Self {
        GeneratorRegistry {
            generators: Vec::new(),
        }
    }

    /// Register a generator. A generator with the same id is replaced in place.
    pub fn register(&mut self, generator: Box<dyn Generator>) {
        match self
            .generators
            .iter()
            .position(|g| g.id() == generator.id())
        {
            Some(idx) => self.generators[idx] = generator,
            None => self.generators.push(generator),
        }
    }

    /// Keep only the generators named in `ids`. An empty list keeps all.
    pub fn retain_enabled<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        for id in ids {
            if self.get(id.as_ref()).is_none() {
                bail!(
                    "unknown generator `{}`\navailable generators: {}",
                    id.as_ref(),
                    self.ids().collect::<Vec<_>>().join(", ")
                );
            }
        }
        self.generators
            .retain(|g| ids.iter().any(|id| id.as_ref() == g.id()));
        Ok(())
    }

    /// Get a generator by id.
    pub fn get(&self, id: &str) -> Option<&dyn Generator> {
        self.generators
            .iter()
            .find(|g| g.id() == id)
            .map(|g| g.as_ref())
    }

    /// All generator ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.generators.iter().map(|g| g.id())
    }

    /// All generators in registration order.
    pub fn all(&self) -> impl Iterator<Item = &dyn Generator> + '_ {
        self.generators.iter().map(|g| g.as_ref())
    }

    /// Generators supporting at least one of `platforms`, in registration order.
    ///
    /// Matching intersects each generator's supported aliases with the alias
    /// set of each canonical platform.
    pub fn select_for(&self, platforms: &[CanonicalPlatform]) -> Vec<&dyn Generator> {
        self.all().filter(|g| g.supports_any(platforms)).collect()
    }

    /// Generators supporting `platform`, in registration order.
    pub fn select_for_single(&self, platform: &CanonicalPlatform) -> Vec<&dyn Generator> {
        self.all().filter(|g| g.supports(platform)).collect()
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
