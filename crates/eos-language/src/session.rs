//! Top-level owner of a registry.
//!
//! Everything that needs an identity is created through a [`Session`];
//! there is no process-wide registry. Dropping the session resets its
//! registry, so handles still held elsewhere become inert.

use std::sync::Arc;

use eos_core::{EosResult, ObjectKey, RegistryConfig, Scalar};
use tracing::debug;

use crate::array::Array;
use crate::handle::Handle;
use crate::object::{DoubleArray, IntArray, RegisteredArray, RegisteredObject, SharedObject};
use crate::object_set::ObjectSet;
use crate::registry::HandleRegistry;
use crate::strings::Strings;

#[derive(Debug)]
pub struct Session {
    registry: Arc<HandleRegistry>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(HandleRegistry::new()),
        }
    }

    pub fn with_config(config: RegistryConfig) -> EosResult<Self> {
        let config = config.validate()?;
        Ok(Self {
            registry: Arc::new(HandleRegistry::with_config(config)),
        })
    }

    /// Session sized from `EOS_REGISTRY_CAPACITY` / `EOS_REGISTRY_STEP`.
    pub fn from_env() -> EosResult<Self> {
        Self::with_config(RegistryConfig::from_env()?)
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Register any object built around its handle.
    pub fn register<T, F>(&self, build: F) -> EosResult<Arc<T>>
    where
        T: RegisteredObject,
        F: FnOnce(Handle) -> T,
    {
        self.registry.register(build)
    }

    pub fn register_array<T: Scalar>(&self, values: Array<T>) -> EosResult<Arc<RegisteredArray<T>>> {
        self.register(|handle| RegisteredArray::new(handle, values))
    }

    pub fn new_double_array(&self, len: usize, fill: f64) -> EosResult<Arc<DoubleArray>> {
        self.register_array(Array::filled(len, fill))
    }

    pub fn new_int_array(&self, len: usize, fill: i32) -> EosResult<Arc<IntArray>> {
        self.register_array(Array::filled(len, fill))
    }

    /// `len` empty strings.
    pub fn new_strings(&self, len: usize) -> EosResult<Arc<Strings>> {
        self.register_strings(vec![String::new(); len])
    }

    pub fn register_strings(&self, values: Vec<String>) -> EosResult<Arc<Strings>> {
        self.register(|handle| Strings::new(handle, values))
    }

    pub fn object(&self, key: ObjectKey) -> EosResult<SharedObject> {
        self.registry.get_object(key)
    }

    pub fn object_as<T: RegisteredObject>(&self, key: ObjectKey) -> EosResult<Arc<T>> {
        self.registry.get_object_as(key)
    }

    /// Empty key collection resolving through this session's registry.
    pub fn object_set(&self) -> ObjectSet {
        ObjectSet::new(Arc::clone(&self.registry))
    }

    pub fn live_objects(&self) -> usize {
        self.registry.len()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(live = self.registry.len(), "closing session");
        self.registry.stats().log_summary();
        self.registry.destroy_all();
    }
}
