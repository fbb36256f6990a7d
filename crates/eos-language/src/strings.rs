//! Registered collections of strings.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use eos_core::{EosError, EosResult, ObjectKey};

use crate::handle::Handle;
use crate::object::RegisteredObject;

/// Value given to slots added by [`Strings::resize`].
pub const RESIZE_FILL: &str = "empty";

/// Integer form of a failed [`Strings::search`].
pub const NOT_FOUND: i32 = -1;

/// An ordered, resizable list of strings living in a registry.
///
/// Text form: the element count on one line, then every element followed by
/// a space, then a newline. Elements are read back as whitespace-separated
/// words, so elements holding whitespace do not round-trip.
#[derive(Debug)]
pub struct Strings {
    handle: Handle,
    values: RwLock<Vec<String>>,
}

impl Strings {
    pub(crate) fn new(handle: Handle, values: Vec<String>) -> Self {
        Self {
            handle,
            values: RwLock::new(values),
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<String>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn size(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Keep the first `len` elements; new slots hold [`RESIZE_FILL`].
    pub fn resize(&self, len: usize) {
        self.write().resize(len, RESIZE_FILL.to_owned());
    }

    pub fn value_at(&self, index: usize) -> EosResult<String> {
        let values = self.read();
        values.get(index).cloned().ok_or(EosError::IndexOob {
            what: "strings value_at",
            index,
            len: values.len(),
        })
    }

    pub fn set_value_at(&self, index: usize, value: impl Into<String>) -> EosResult<()> {
        let mut values = self.write();
        let len = values.len();
        let slot = values.get_mut(index).ok_or(EosError::IndexOob {
            what: "strings set_value_at",
            index,
            len,
        })?;
        *slot = value.into();
        Ok(())
    }

    /// Position of the first element equal to `needle`.
    pub fn search(&self, needle: &str) -> Option<usize> {
        self.read().iter().position(|s| s == needle)
    }

    /// [`Strings::search`] for integer boundaries: [`NOT_FOUND`] when absent.
    pub fn search_raw(&self, needle: &str) -> i32 {
        self.search(needle)
            .and_then(|i| i32::try_from(i).ok())
            .unwrap_or(NOT_FOUND)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.read().clone()
    }
}

impl RegisteredObject for Strings {
    fn key(&self) -> Option<ObjectKey> {
        self.handle.key()
    }

    fn type_name(&self) -> &'static str {
        "Strings"
    }

    fn print_on(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let values = self.read();
        writeln!(out, "{}", values.len())?;
        for value in values.iter() {
            write!(out, "{value} ")?;
        }
        writeln!(out)
    }

    /// Accepts `N s0 s1 ... sN-1`, whitespace separated.
    fn read_on(&self, input: &str) -> EosResult<()> {
        let mut tokens = input.split_whitespace();
        let count = tokens
            .next()
            .ok_or(EosError::Parse {
                what: "strings length",
                message: "empty input".into(),
            })?
            .parse::<usize>()
            .map_err(|e| EosError::Parse {
                what: "strings length",
                message: e.to_string(),
            })?;

        let parsed: Vec<String> = tokens.take(count).map(str::to_owned).collect();
        if parsed.len() < count {
            return Err(EosError::Parse {
                what: "strings values",
                message: format!("expected {count} values, found {}", parsed.len()),
            });
        }
        *self.write() = parsed;
        Ok(())
    }
}
