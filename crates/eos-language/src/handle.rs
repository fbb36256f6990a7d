//! RAII identity tokens.

use std::fmt;
use std::sync::{Arc, Weak};

use eos_core::{EosResult, ObjectKey, UNBOUND_KEY};
use tracing::warn;

use crate::object::RegisteredObject;
use crate::registry::{HandleRegistry, Registration};

/// Identity of one registered object.
///
/// A bound handle owns its registry slot and frees it when dropped. Handles
/// are move-only: duplicating an identity is not expressible.
pub struct Handle {
    bound: Option<Bound>,
}

struct Bound {
    reg: Registration,
    registry: Weak<HandleRegistry>,
}

impl Handle {
    /// A handle that names no slot; converts to `UNBOUND_KEY`.
    pub const fn unbound() -> Self {
        Self { bound: None }
    }

    /// Register `obj` and bind the new handle to its slot.
    pub(crate) fn bind(
        registry: &Arc<HandleRegistry>,
        obj: Weak<dyn RegisteredObject>,
    ) -> EosResult<Self> {
        let reg = registry.insert(obj)?;
        Ok(Self {
            bound: Some(Bound {
                reg,
                registry: Arc::downgrade(registry),
            }),
        })
    }

    pub fn key(&self) -> Option<ObjectKey> {
        self.bound.as_ref().map(|b| b.reg.key)
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Plain integer form for foreign-function boundaries.
    pub fn as_raw(&self) -> i32 {
        self.key().map_or(UNBOUND_KEY, ObjectKey::as_raw)
    }

    /// Give the slot back now instead of at drop.
    ///
    /// Returns whether a slot was actually freed; the handle is unbound
    /// afterwards either way.
    pub fn release(&mut self) -> EosResult<bool> {
        let Some(bound) = self.bound.take() else {
            return Ok(false);
        };
        match bound.registry.upgrade() {
            Some(registry) => registry.release(bound.reg),
            None => Ok(false),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let key = self.key();
        if let Err(err) = self.release() {
            warn!(key = ?key, error = %err, "failed to release handle");
        }
    }
}

impl From<&Handle> for i32 {
    fn from(handle: &Handle) -> Self {
        handle.as_raw()
    }
}

impl PartialEq<ObjectKey> for Handle {
    fn eq(&self, key: &ObjectKey) -> bool {
        self.key() == Some(*key)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bound {
            Some(bound) => f
                .debug_struct("Handle")
                .field("key", &bound.reg.key)
                .field("epoch", &bound.reg.epoch)
                .finish(),
            None => f.write_str("Handle(unbound)"),
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}
