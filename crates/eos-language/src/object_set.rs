//! Ordered collections of object keys.

use std::fmt;
use std::sync::{Arc, Weak};

use eos_core::{EosError, EosResult, ObjectKey};

use crate::object::{RegisteredObject, SharedObject, object_to_string};
use crate::registry::HandleRegistry;

/// Keys of registered objects, resolved through a registry on access.
///
/// The set does not keep its members alive. Each member remembers the object
/// it was added with, so once that object is gone its position fails with
/// `StaleHandle`, even after the key has been reissued to another object.
#[derive(Clone)]
pub struct ObjectSet {
    registry: Arc<HandleRegistry>,
    members: Vec<Member>,
}

#[derive(Clone)]
struct Member {
    key: ObjectKey,
    obj: Weak<dyn RegisteredObject>,
}

impl ObjectSet {
    pub fn new(registry: Arc<HandleRegistry>) -> Self {
        Self {
            registry,
            members: Vec::new(),
        }
    }

    /// Append `obj`'s key and return its position.
    pub fn add(&mut self, obj: SharedObject) -> EosResult<usize> {
        let key = obj.key().ok_or(EosError::InvalidArg {
            what: "unbound object cannot join a set",
        })?;
        self.members.push(Member {
            key,
            obj: Arc::downgrade(&obj),
        });
        Ok(self.members.len() - 1)
    }

    /// Remove the first occurrence of `key`.
    pub fn remove(&mut self, key: ObjectKey) -> bool {
        match self.members.iter().position(|m| m.key == key) {
            Some(pos) => {
                self.members.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.members.iter().any(|m| m.key == key)
    }

    pub fn get(&self, pos: usize) -> EosResult<SharedObject> {
        let member = self.members.get(pos).ok_or(EosError::IndexOob {
            what: "object set",
            index: pos,
            len: self.members.len(),
        })?;
        self.resolve(member)
    }

    fn resolve(&self, member: &Member) -> EosResult<SharedObject> {
        let found = self.registry.get_object(member.key)?;
        if Weak::ptr_eq(&Arc::downgrade(&found), &member.obj) {
            Ok(found)
        } else {
            Err(EosError::StaleHandle {
                key: member.key,
                found: found.key(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn keys(&self) -> Vec<ObjectKey> {
        self.members.iter().map(|m| m.key).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = EosResult<SharedObject>> + '_ {
        self.members.iter().map(|m| self.resolve(m))
    }
}

/// Same members, in the same order.
impl PartialEq for ObjectSet {
    fn eq(&self, other: &Self) -> bool {
        self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .zip(&other.members)
                .all(|(a, b)| a.key == b.key && Weak::ptr_eq(&a.obj, &b.obj))
    }
}

impl fmt::Debug for ObjectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSet").field("keys", &self.keys()).finish()
    }
}

/// Text form of each member, one after the other.
impl fmt::Display for ObjectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for member in &self.members {
            match self.resolve(member) {
                Ok(obj) => write!(f, "{}", object_to_string(&*obj))?,
                Err(_) => writeln!(f, "<stale object {}>", member.key)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{RegisteredObject, Session};
    use eos_core::EosError;

    #[test]
    fn members_resolve_in_insertion_order() {
        let session = Session::new();
        let a = session.new_double_array(1, 1.0).unwrap();
        let b = session.new_int_array(2, 2).unwrap();

        let mut set = session.object_set();
        assert_eq!(set.add(b.clone()).unwrap(), 0);
        assert_eq!(set.add(a.clone()).unwrap(), 1);
        assert_eq!(set.get(0).unwrap().type_name(), "IntArray");
        assert_eq!(set.get(1).unwrap().type_name(), "DoubleArray");
        assert!(set.get(2).is_err());

        assert!(set.remove(b.key().unwrap()));
        assert!(!set.remove(b.key().unwrap()));
        assert_eq!(set.len(), 1);
        assert!(set.contains(a.key().unwrap()));
    }

    #[test]
    fn dropped_member_shows_as_stale() {
        let session = Session::new();
        let a = session.new_double_array(1, 1.0).unwrap();
        let mut set = session.object_set();
        set.add(a.clone()).unwrap();
        let key = a.key().unwrap();
        drop(a);

        assert!(set.get(0).is_err());
        assert_eq!(set.to_string(), format!("<stale object {key}>\n"));
    }

    #[test]
    fn reissued_key_does_not_resolve_to_newcomer() {
        let session = Session::new();
        let a = session.new_double_array(1, 1.0).unwrap();
        let key = a.key().unwrap();
        let mut set = session.object_set();
        set.add(a.clone()).unwrap();
        drop(a);

        let newcomer = session.new_int_array(1, 5).unwrap();
        assert_eq!(newcomer.key(), Some(key));
        assert_eq!(
            set.get(0).unwrap_err(),
            EosError::StaleHandle {
                key,
                found: Some(key)
            }
        );
        assert_eq!(set.to_string(), format!("<stale object {key}>\n"));
    }

    #[test]
    fn sets_compare_by_members() {
        let session = Session::new();
        let a = session.new_int_array(1, 0).unwrap();
        let mut left = session.object_set();
        let mut right = session.object_set();
        left.add(a.clone()).unwrap();
        assert_ne!(left, right);
        right.add(a.clone()).unwrap();
        assert_eq!(left, right);
    }
}
