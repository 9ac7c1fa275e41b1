//! Title-keyed mode registry.
//!
//! Built once at startup with a fluent builder; titles must be unique. The
//! registry stores [`ModeSpec`]s, so every transition gets a fresh instance.

use crate::config::{ModeParams, ProfileParams};
use crate::error::BuildError;
use crate::modes::ModeSpec;
use crate::profile::Profile;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ModeRegistry {
    specs: Vec<ModeSpec>,
}

impl ModeRegistry {
    pub fn builder() -> ModeRegistryBuilder {
        ModeRegistryBuilder::default()
    }

    pub fn get(&self, title: &str) -> Option<&ModeSpec> {
        self.specs.iter().find(|s| s.title() == title)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.get(title).is_some()
    }

    /// Titles in registration order.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(ModeSpec::title)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ModeRegistryBuilder {
    specs: Vec<ModeSpec>,
}

impl ModeRegistryBuilder {
    pub fn with(mut self, spec: ModeSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Idle, Preheat, Flush, Manual, Steam and the nine-bar shot.
    pub fn with_standard_modes(self, p: &ModeParams) -> Self {
        self.with(ModeSpec::Idle)
            .with(ModeSpec::Preheat(p.preheat))
            .with(ModeSpec::Flush(p.flush))
            .with(ModeSpec::Manual)
            .with(ModeSpec::Steam(p.steam))
            .with(ModeSpec::Shot(p.shot))
    }

    /// One mode per profile, titled by the profile name.
    pub fn with_profiles<I>(mut self, profiles: I, params: ProfileParams) -> Self
    where
        I: IntoIterator<Item = Arc<Profile>>,
    {
        for profile in profiles {
            self = self.with(ModeSpec::Profile { profile, params });
        }
        self
    }

    pub fn build(self) -> Result<ModeRegistry, BuildError> {
        for (i, spec) in self.specs.iter().enumerate() {
            if self.specs[..i].iter().any(|s| s.title() == spec.title()) {
                return Err(BuildError::DuplicateMode(spec.title().to_string()));
            }
        }
        Ok(ModeRegistry { specs: self.specs })
    }
}
