//! Name → descriptor lookup, built once at startup

use super::Ecosystem;
use crate::error::ConfigError;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// Read-only map from ecosystem name to its descriptor.
///
/// Built explicitly from a list of descriptors and handed to pipelines;
/// there is no global instance.
#[derive(Debug, Clone, Default)]
pub struct EcosystemRegistry {
    ecosystems: IndexMap<String, Arc<Ecosystem>>,
}

impl EcosystemRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry holding every descriptor in `descriptors`
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Arc<Ecosystem>>,
    {
        descriptors
            .into_iter()
            .try_fold(Self::builder(), RegistryBuilder::register)
            .map(RegistryBuilder::build)
    }

    /// Descriptor for `name`; unknown names are a configuration error
    pub fn get(&self, name: &str) -> Result<Arc<Ecosystem>, ConfigError> {
        self.ecosystems
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::unknown_ecosystem(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ecosystems.contains_key(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ecosystems.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ecosystem> {
        self.ecosystems.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.ecosystems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ecosystems.is_empty()
    }
}

/// Collects descriptors; each key may be written once
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    ecosystems: IndexMap<String, Arc<Ecosystem>>,
}

impl RegistryBuilder {
    /// Add a descriptor. Registering the same implementation twice is
    /// accepted; a different one under an existing name is rejected.
    pub fn register(mut self, ecosystem: Arc<Ecosystem>) -> Result<Self, ConfigError> {
        let name = ecosystem.name().to_string();
        if let Some(existing) = self.ecosystems.get(&name) {
            if Arc::ptr_eq(existing, &ecosystem) || existing.same_implementation(&ecosystem) {
                return Ok(self);
            }
            return Err(ConfigError::DuplicateEcosystem { name });
        }

        debug!("Registered ecosystem {}", name);
        self.ecosystems.insert(name, ecosystem);
        Ok(self)
    }

    pub fn build(self) -> EcosystemRegistry {
        EcosystemRegistry {
            ecosystems: self.ecosystems,
        }
    }
}
