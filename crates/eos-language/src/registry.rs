//! Handle registry: small integer identities for shared objects.
//!
//! Slots live in one table. A free slot stores the index of the next free
//! slot, so the unused slots form an intrusive free list headed by `free`.
//! Deleting pushes the slot back on the head of that list, which makes the
//! next registration reuse it first.
//!
//! Every access goes through one `RwLock`: structural changes (add, delete,
//! reset) take it for writing, lookups for reading. The registry only keeps
//! weak references; objects own their [`Handle`] and leave the table when
//! they are dropped.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use eos_core::{EosError, EosResult, ObjectKey, RegistryConfig};
use tracing::{debug, trace, warn};

use crate::handle::Handle;
use crate::object::{RegisteredObject, SharedObject, downcast_object, object_to_string};
use crate::stats::RegistryStats;

enum Entry {
    Free { next: usize },
    Occupied(Weak<dyn RegisteredObject>),
}

struct Table {
    entries: Vec<Entry>,
    free: usize,
    live: usize,
    /// Bumped by `destroy_all`; handles from an older epoch are inert.
    epoch: u64,
}

impl Table {
    fn with_capacity(capacity: usize, epoch: u64) -> Self {
        let mut table = Self {
            entries: Vec::new(),
            free: 0,
            live: 0,
            epoch,
        };
        table.grow(capacity);
        table
    }

    /// Append `step` free slots chained onto the end of the free list.
    fn grow(&mut self, step: usize) {
        let start = self.entries.len();
        debug_assert_eq!(self.free, start, "grow only when the free list is empty");
        self.entries
            .extend((start..start + step).map(|i| Entry::Free { next: i + 1 }));
    }

    fn occupied(&self, slot: usize) -> Option<&Weak<dyn RegisteredObject>> {
        match self.entries.get(slot)? {
            Entry::Occupied(obj) => Some(obj),
            Entry::Free { .. } => None,
        }
    }
}

/// Where an object was registered; what a [`Handle`] needs to release it.
pub(crate) struct Registration {
    pub(crate) key: ObjectKey,
    pub(crate) epoch: u64,
    /// The registered object, to recognise the slot if it was reissued.
    pub(crate) obj: Weak<dyn RegisteredObject>,
}

pub struct HandleRegistry {
    config: RegistryConfig,
    table: RwLock<Table>,
    stats: RegistryStats,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            table: RwLock::new(Table::with_capacity(config.initial_capacity, 0)),
            config,
            stats: RegistryStats::new(),
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build an object around a freshly registered handle.
    ///
    /// The registry stores a weak pointer to the object before `build` runs,
    /// so the object's handle resolves to the object itself once this returns.
    pub fn register<T, F>(self: &Arc<Self>, build: F) -> EosResult<Arc<T>>
    where
        T: RegisteredObject,
        F: FnOnce(Handle) -> T,
    {
        let mut failure = None;
        let obj = Arc::new_cyclic(|weak: &Weak<T>| {
            let weak: Weak<dyn RegisteredObject> = weak.clone();
            let handle = match Handle::bind(self, weak) {
                Ok(handle) => handle,
                Err(err) => {
                    failure = Some(err);
                    Handle::unbound()
                }
            };
            build(handle)
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(obj),
        }
    }

    /// Store `obj` in the first free slot and return that slot's key.
    ///
    /// The slot is not tied to any handle: the caller must `delete_object`
    /// it. Objects built through [`HandleRegistry::register`] manage this
    /// themselves.
    pub fn add_object(&self, obj: Weak<dyn RegisteredObject>) -> EosResult<ObjectKey> {
        self.insert(obj).map(|reg| reg.key)
    }

    pub(crate) fn insert(&self, obj: Weak<dyn RegisteredObject>) -> EosResult<Registration> {
        let mut table = self.write();
        if table.free == table.entries.len() {
            let step = self.config.growth_step.max(1);
            table.grow(step);
            self.stats.record_grow();
            debug!(
                capacity = table.entries.len(),
                live = table.live,
                "registry table grown"
            );
        }

        let slot = table.free;
        let key = ObjectKey::try_from_index(slot).ok_or(EosError::InvalidArg {
            what: "registry exhausted the key space",
        })?;
        let next = match table.entries[slot] {
            Entry::Free { next } => next,
            Entry::Occupied(_) => {
                return Err(EosError::InvalidHandle {
                    key: slot as i64,
                    capacity: table.entries.len(),
                });
            }
        };
        table.entries[slot] = Entry::Occupied(obj.clone());
        table.free = next;
        table.live += 1;
        self.stats.record_add();
        trace!(key = %key, live = table.live, "object registered");

        Ok(Registration {
            key,
            epoch: table.epoch,
            obj,
        })
    }

    /// Return the slot of `key` to the head of the free list.
    pub fn delete_object(&self, key: ObjectKey) -> EosResult<()> {
        let mut table = self.write();
        Self::remove(&mut table, key)?;
        self.stats.record_delete();
        trace!(key = %key, live = table.live, "object deleted");
        Ok(())
    }

    /// Release a handle's slot unless the table was reset since it was taken
    /// or the slot has been deleted and reissued to another object.
    pub(crate) fn release(&self, reg: Registration) -> EosResult<bool> {
        let mut table = self.write();
        if table.epoch != reg.epoch {
            self.stats.record_stale_release();
            warn!(
                key = %reg.key,
                handle_epoch = reg.epoch,
                epoch = table.epoch,
                "ignoring release of a handle from before destroy_all"
            );
            return Ok(false);
        }
        let owned = table
            .occupied(reg.key.slot())
            .is_some_and(|current| Weak::ptr_eq(current, &reg.obj));
        if !owned {
            self.stats.record_stale_release();
            warn!(
                key = %reg.key,
                "ignoring release of a slot deleted out from under its handle"
            );
            return Ok(false);
        }
        Self::remove(&mut table, reg.key)?;
        self.stats.record_delete();
        trace!(key = %reg.key, live = table.live, "handle released");
        Ok(true)
    }

    fn remove(table: &mut Table, key: ObjectKey) -> EosResult<()> {
        let slot = key.slot();
        if table.occupied(slot).is_none() {
            return Err(EosError::InvalidHandle {
                key: i64::from(key.index()),
                capacity: table.entries.len(),
            });
        }
        table.entries[slot] = Entry::Free { next: table.free };
        table.free = slot;
        table.live -= 1;
        Ok(())
    }

    /// Resolve `key` to its object.
    ///
    /// Fails with `InvalidHandle` for free or out-of-range slots and with
    /// `StaleHandle` when the slot's object is being dropped or reports a
    /// different key.
    pub fn get_object(&self, key: ObjectKey) -> EosResult<SharedObject> {
        // the upgraded Arc must not be dropped while the lock is held: the
        // last drop releases the handle, which takes the write lock
        let upgraded = {
            let table = self.read();
            match table.occupied(key.slot()) {
                Some(weak) => weak.upgrade(),
                None => {
                    return Err(EosError::InvalidHandle {
                        key: i64::from(key.index()),
                        capacity: table.entries.len(),
                    });
                }
            }
        };

        match upgraded {
            Some(obj) if obj.key() == Some(key) => Ok(obj),
            Some(obj) => {
                self.stats.record_stale_lookup();
                let found = obj.key();
                drop(obj);
                Err(EosError::StaleHandle { key, found })
            }
            None => {
                self.stats.record_stale_lookup();
                Err(EosError::StaleHandle { key, found: None })
            }
        }
    }

    /// Resolve `key` to an object of concrete type `T`.
    pub fn set_object<T: RegisteredObject>(&self, key: ObjectKey) -> EosResult<Arc<T>> {
        self.get_object_as(key)
    }

    pub fn get_object_as<T: RegisteredObject>(&self, key: ObjectKey) -> EosResult<Arc<T>> {
        downcast_object(self.get_object(key)?)
    }

    /// Whether `key` names a live object.
    pub fn is_object(&self, key: ObjectKey) -> bool {
        self.read()
            .occupied(key.slot())
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.read().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, free or occupied.
    pub fn capacity(&self) -> usize {
        self.read().entries.len()
    }

    /// Keys of all occupied slots, ascending.
    pub fn keys(&self) -> Vec<ObjectKey> {
        let table = self.read();
        table
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| matches!(entry, Entry::Occupied(_)))
            .filter_map(|(slot, _)| ObjectKey::try_from_index(slot))
            .collect()
    }

    /// Live objects with their keys, ascending.
    pub fn objects(&self) -> Vec<(ObjectKey, SharedObject)> {
        let upgraded: Vec<_> = {
            let table = self.read();
            table
                .entries
                .iter()
                .enumerate()
                .filter_map(|(slot, entry)| match entry {
                    Entry::Occupied(weak) => Some((slot, weak.upgrade()?)),
                    Entry::Free { .. } => None,
                })
                .collect()
        };
        upgraded
            .into_iter()
            .filter_map(|(slot, obj)| Some((ObjectKey::try_from_index(slot)?, obj)))
            .collect()
    }

    /// Forget every entry and start over with an empty table.
    ///
    /// Objects still alive keep their handles, but those handles belong to
    /// the previous epoch: dropping them later leaves the new table alone.
    pub fn destroy_all(&self) {
        let mut table = self.write();
        let released = table.live;
        let epoch = table.epoch + 1;
        *table = Table::with_capacity(self.config.initial_capacity, epoch);
        debug!(released, epoch, "registry reset");
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.read();
        f.debug_struct("HandleRegistry")
            .field("capacity", &table.entries.len())
            .field("live", &table.live)
            .field("free", &table.free)
            .field("epoch", &table.epoch)
            .finish()
    }
}

/// Listing of every live object: type, value and key.
impl fmt::Display for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let objects = self.objects();
        writeln!(f, "List of all the {} objects in this registry:", objects.len())?;
        for (key, obj) in &objects {
            writeln!(f, "------------- object -------------")?;
            writeln!(f, "  type : {}", obj.type_name())?;
            write!(f, "  value = {}", object_to_string(&**obj))?;
            writeln!(f, "  id : {key}")?;
        }
        writeln!(f, "----------------------------------")
    }
}
