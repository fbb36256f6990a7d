use thiserror::Error;

use crate::ObjectKey;

pub type EosResult<T> = Result<T, EosError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EosError {
    #[error("Invalid handle: {key} (capacity={capacity})")]
    InvalidHandle { key: i64, capacity: usize },

    #[error("Stale handle: slot {key} now belongs to {found:?}")]
    StaleHandle {
        key: ObjectKey,
        found: Option<ObjectKey>,
    },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Shape mismatch in {what}: {left} vs {right}")]
    ShapeMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("Type mismatch for object {key:?}: expected {expected}, found {found}")]
    TypeMismatch {
        key: Option<ObjectKey>,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Parse error in {what}: {message}")]
    Parse { what: &'static str, message: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EosError::IndexOob {
            what: "array get",
            index: 7,
            len: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("index=7"));
        assert!(msg.contains("len=5"));

        let err = EosError::StaleHandle {
            key: ObjectKey::from_index(3).unwrap(),
            found: None,
        };
        assert!(err.to_string().contains("slot 3"));
    }
}
