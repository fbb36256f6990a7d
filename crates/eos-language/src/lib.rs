//! eos-language: memory substrate for the eos property objects.
//!
//! Provides:
//! - `RefCountedBuffer` / `Array<T>`: shared, copy-on-write numeric storage
//! - `HandleRegistry` / `Handle`: integer identities with slot reuse
//! - `RegisteredObject` and the registered array and string types built on it
//! - `Session`: the explicit owner of a registry
//!
//! # Example
//!
//! ```
//! use eos_language::{Array, RegisteredObject, Session};
//!
//! let session = Session::new();
//! let temps = session.new_double_array(3, 300.0).unwrap();
//! let key = temps.key().unwrap();
//! assert!(session.registry().is_object(key));
//!
//! let mut a = Array::filled(5, 0.0_f64);
//! let b = a.clone(); // attached: shares storage
//! let c = a.copy(); // duplicated: independent storage
//! a.set(2, 1.5).unwrap();
//! assert_eq!(b.get(2).unwrap(), 1.5);
//! assert_eq!(c.get(2).unwrap(), 0.0);
//! ```

pub mod array;
pub mod buffer;
pub mod handle;
pub mod object;
pub mod object_set;
pub mod registry;
pub mod session;
pub mod stats;
pub mod strings;

// Re-exports for ergonomics
pub use array::Array;
pub use buffer::RefCountedBuffer;
pub use handle::Handle;
pub use object::{
    DoubleArray, IntArray, RegisteredArray, RegisteredObject, SharedObject, downcast_object,
    object_to_string,
};
pub use object_set::ObjectSet;
pub use registry::HandleRegistry;
pub use session::Session;
pub use stats::{RegistryStats, StatsSnapshot};
pub use strings::Strings;
