//! Hit type to digitizer factory table.

use std::collections::BTreeMap;

use stripsim_core::error::{Error, Result};

use crate::bst::BstDigitizer;
use crate::digitizer::{Digitizer, DigitizerConfig};
use crate::ftm::FtmDigitizer;

/// Digitizer constructor.
pub type DigitizerFactory = fn(DigitizerConfig) -> Box<dyn Digitizer>;

/// Lookup table of digitizer factories keyed by hit type.
#[derive(Debug, Clone, Default)]
pub struct DigitizerRegistry {
    factories: BTreeMap<String, DigitizerFactory>,
}

impl DigitizerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in detector families.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("bst", |config| Box::new(BstDigitizer::with_config(config)));
        registry.register("ftm", |config| Box::new(FtmDigitizer::with_config(config)));
        registry
    }

    /// Registers `factory` under `hit_type`, returning the factory it replaces.
    pub fn register(
        &mut self,
        hit_type: impl Into<String>,
        factory: DigitizerFactory,
    ) -> Option<DigitizerFactory> {
        self.factories.insert(hit_type.into(), factory)
    }

    /// Constructs a new digitizer for `hit_type` with default settings.
    pub fn create(&self, hit_type: &str) -> Result<Box<dyn Digitizer>> {
        self.create_with(hit_type, DigitizerConfig::default())
    }

    /// Constructs a new digitizer for `hit_type` with `config`.
    pub fn create_with(&self, hit_type: &str, config: DigitizerConfig) -> Result<Box<dyn Digitizer>> {
        self.factories
            .get(hit_type)
            .map(|factory| factory(config))
            .ok_or_else(|| Error::UnknownHitType(hit_type.to_string()))
    }

    /// Registered hit types, in lexical order.
    pub fn hit_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Returns true if `hit_type` is registered.
    #[must_use]
    pub fn contains(&self, hit_type: &str) -> bool {
        self.factories.contains_key(hit_type)
    }
}
