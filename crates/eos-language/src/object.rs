//! Objects that live in a [`HandleRegistry`](crate::HandleRegistry).

use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use eos_core::{EosError, EosResult, ObjectKey, Scalar};

use crate::array::Array;
use crate::handle::Handle;

/// Capability required to be stored in a registry.
///
/// Implementors own the [`Handle`] that binds them to their slot, so
/// `key()` must report that handle's key. Mutation goes through interior
/// mutability: the registry only ever hands out shared references.
pub trait RegisteredObject: Any + Send + Sync + fmt::Debug {
    fn key(&self) -> Option<ObjectKey>;

    /// Name of the concrete kind of object, e.g. `"DoubleArray"`.
    fn type_name(&self) -> &'static str;

    /// Write the object's text form.
    fn print_on(&self, out: &mut dyn fmt::Write) -> fmt::Result;

    /// Replace the object's value from its text form.
    fn read_on(&self, input: &str) -> EosResult<()>;
}

/// Shared reference to any registered object.
pub type SharedObject = Arc<dyn RegisteredObject>;

/// Downcast a shared object to its concrete type.
pub fn downcast_object<T: RegisteredObject>(obj: SharedObject) -> EosResult<Arc<T>> {
    let key = obj.key();
    let found = obj.type_name();
    let any: Arc<dyn Any + Send + Sync> = obj;
    any.downcast::<T>().map_err(|_| EosError::TypeMismatch {
        key,
        expected: std::any::type_name::<T>(),
        found,
    })
}

/// An [`Array`] registered as an object.
///
/// The registry and every [`ObjectSet`](crate::ObjectSet) holding this key
/// see the same values; [`RegisteredArray::snapshot`] attaches a plain array
/// to the current buffer.
#[derive(Debug)]
pub struct RegisteredArray<T: Scalar> {
    handle: Handle,
    values: RwLock<Array<T>>,
}

pub type DoubleArray = RegisteredArray<f64>;
pub type IntArray = RegisteredArray<i32>;

const VALUES_PER_LINE: usize = 4;

impl<T: Scalar> RegisteredArray<T> {
    pub(crate) fn new(handle: Handle, values: Array<T>) -> Self {
        Self {
            handle,
            values: RwLock::new(values),
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn values(&self) -> RwLockReadGuard<'_, Array<T>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn values_mut(&self) -> RwLockWriteGuard<'_, Array<T>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Array attached to the current values.
    pub fn snapshot(&self) -> Array<T> {
        self.values().clone()
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    pub fn get(&self, index: usize) -> EosResult<T> {
        self.values().get(index)
    }

    pub fn set(&self, index: usize, value: T) -> EosResult<()> {
        self.values_mut().set(index, value)
    }
}

fn array_type_name(element: &'static str) -> &'static str {
    match element {
        "f64" => "DoubleArray",
        "f32" => "FloatArray",
        "i32" => "IntArray",
        "i64" => "LongArray",
        _ => "Array",
    }
}

impl<T: Scalar> RegisteredObject for RegisteredArray<T> {
    fn key(&self) -> Option<ObjectKey> {
        self.handle.key()
    }

    fn type_name(&self) -> &'static str {
        array_type_name(T::TYPE_NAME)
    }

    fn print_on(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let values = self.values();
        writeln!(out, "num. elts = {}", values.len())?;
        values.with_slice(|values| {
            for line in values.chunks(VALUES_PER_LINE) {
                let mut sep = "";
                for value in line {
                    write!(out, "{sep}{value:e}")?;
                    sep = " ";
                }
                writeln!(out)?;
            }
            Ok(())
        })
    }

    /// Accepts `N v0 v1 ... vN-1`, whitespace separated.
    fn read_on(&self, input: &str) -> EosResult<()> {
        let mut tokens = input.split_whitespace();
        let count = tokens
            .next()
            .ok_or(EosError::Parse {
                what: "array length",
                message: "empty input".into(),
            })?
            .parse::<usize>()
            .map_err(|e| EosError::Parse {
                what: "array length",
                message: e.to_string(),
            })?;

        // the count is untrusted: grow as values actually parse
        let mut parsed = Vec::new();
        for index in 0..count {
            let token = tokens.next().ok_or_else(|| EosError::Parse {
                what: "array values",
                message: format!("expected {count} values, found {index}"),
            })?;
            let value = token.parse::<T>().map_err(|_| EosError::Parse {
                what: "array values",
                message: format!("invalid {} '{token}'", T::TYPE_NAME),
            })?;
            parsed.push(value);
        }

        let mut values = self.values_mut();
        values.detach();
        *values = Array::from_vec(parsed);
        Ok(())
    }
}

/// Text form of any registered object.
pub fn object_to_string(obj: &dyn RegisteredObject) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = obj.print_on(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unbound(values: Vec<f64>) -> DoubleArray {
        RegisteredArray::new(Handle::unbound(), Array::from_vec(values))
    }

    #[test]
    fn print_groups_four_values_per_line() {
        let arr = unbound(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let text = object_to_string(&arr);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "num. elts = 5");
        assert_eq!(lines[1], "1e0 2e0 3e0 4e0");
        assert_eq!(lines[2], "5e0");
    }

    #[test]
    fn read_replaces_values_and_breaks_snapshots() {
        let arr = unbound(vec![1.0, 2.0]);
        let before = arr.snapshot();
        arr.read_on("3 0.5 1.5 2.5").unwrap();
        assert_eq!(arr.snapshot().to_vec(), vec![0.5, 1.5, 2.5]);
        assert_eq!(before.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn read_rejects_short_or_bad_input() {
        let arr = unbound(vec![]);
        assert!(matches!(arr.read_on(""), Err(EosError::Parse { .. })));
        assert!(matches!(arr.read_on("3 1.0"), Err(EosError::Parse { .. })));
        assert!(matches!(arr.read_on("1 abc"), Err(EosError::Parse { .. })));
    }

    #[test]
    fn read_with_huge_count_fails_cleanly() {
        let arr = unbound(vec![2.0]);
        let err = arr.read_on("1000000000000000000 1.0").unwrap_err();
        assert!(matches!(err, EosError::Parse { what: "array values", .. }));
        assert_eq!(arr.snapshot().to_vec(), vec![2.0]);
    }

    #[test]
    fn downcast_checks_concrete_type() {
        let shared: SharedObject = Arc::new(unbound(vec![1.0]));
        let err = downcast_object::<IntArray>(shared.clone()).unwrap_err();
        assert!(matches!(err, EosError::TypeMismatch { found: "DoubleArray", .. }));
        let back = downcast_object::<DoubleArray>(shared).unwrap();
        assert_eq!(back.get(0).unwrap(), 1.0);
    }

    #[test]
    fn type_names_follow_element_type() {
        assert_eq!(unbound(vec![]).type_name(), "DoubleArray");
        let ints: IntArray = RegisteredArray::new(Handle::unbound(), Array::new(0));
        assert_eq!(ints.type_name(), "IntArray");
        assert_eq!(ints.key(), None);
    }
}
