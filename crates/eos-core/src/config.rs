//! Registry sizing.
//!
//! Defaults match the historical table size (1024 slots, grown 1024 at a
//! time). Both values can be overridden with `EOS_REGISTRY_CAPACITY` and
//! `EOS_REGISTRY_STEP`.

use crate::{EosError, EosResult};

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_STEP: usize = 1024;

pub const CAPACITY_ENV: &str = "EOS_REGISTRY_CAPACITY";
pub const STEP_ENV: &str = "EOS_REGISTRY_STEP";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistryConfig {
    /// Slots allocated when the registry is created or reset.
    pub initial_capacity: usize,
    /// Slots added each time the table is exhausted.
    pub growth_step: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            growth_step: DEFAULT_STEP,
        }
    }
}

impl RegistryConfig {
    /// Defaults, overridden by whichever environment variables are set.
    pub fn from_env() -> EosResult<Self> {
        let mut config = Self::default();
        if let Some(capacity) = read_env(CAPACITY_ENV)? {
            config.initial_capacity = capacity;
        }
        if let Some(step) = read_env(STEP_ENV)? {
            config.growth_step = step;
        }
        config.validate()
    }

    pub fn validate(self) -> EosResult<Self> {
        if self.growth_step == 0 {
            return Err(EosError::InvalidArg {
                what: "registry growth step must be positive",
            });
        }
        Ok(self)
    }
}

fn read_env(name: &'static str) -> EosResult<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| EosError::Parse {
                what: name,
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
