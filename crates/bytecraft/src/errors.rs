//! Error types for schema registration and record reading/writing.

use std::io;

use thiserror::Error;

/// Errors produced when registering a [crate::field::RecordSchema] with a [crate::schema::Registry].
///
/// All of these are detected before any stream I/O takes place.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The field type has no codec (e.g. fixed-point decimals or nested sequences).
    #[error("{record}.{field}: unsupported type `{type_name}`")]
    UnsupportedType {
        record: String,
        field: String,
        type_name: String,
    },
    /// Field name is empty.
    #[error("{record}: field name must not be empty")]
    InvalidFieldName { record: String },
    /// Two fields of the same record share a name.
    #[error("{record}.{field}: duplicate field name")]
    DuplicateField { record: String, field: String },
    /// A record with this name is already registered.
    #[error("record `{0}` is already registered")]
    DuplicateRecord(String),
    /// The directive list breaks one of the per-field rules.
    #[error("{record}.{field}: {reason}")]
    InvalidDirectives {
        record: String,
        field: String,
        reason: &'static str,
    },
    /// An explicit length on a fixed-width type differs from its width.
    #[error("{record}.{field}: explicit length must equal the {width}-byte width of the type")]
    InvalidLength {
        record: String,
        field: String,
        width: usize,
    },
    /// Length was left to inference on a type without a fixed width.
    #[error("{record}.{field}: length of a variable-width type cannot be inferred")]
    AmbiguousLength { record: String, field: String },
    /// A policy names a sibling, computation or record type that is not available.
    #[error("{record}.{field}: unresolved reference to `{name}`")]
    UnresolvedReference {
        record: String,
        field: String,
        name: String,
    },
    /// The declared default does not have the shape of the field type.
    #[error("{record}.{field}: default value is {found}, expected {expected}")]
    InvalidDefault {
        record: String,
        field: String,
        expected: String,
        found: &'static str,
    },
    /// A sibling reference names a field of the wrong type.
    #[error("{record}.{field}: `{name}` must be {expected}")]
    InvalidReference {
        record: String,
        field: String,
        name: String,
        expected: &'static str,
    },
    /// A schema definition could not be parsed.
    #[cfg(feature = "serde")]
    #[error("invalid schema definition: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error raised while reading or writing a record, tagged with the record type and field.
///
/// Nested records report the innermost record and field that failed.
#[derive(Debug, Error)]
#[error("{record}{}: {kind}", field_suffix(.field))]
pub struct LayoutError {
    pub record: String,
    pub field: Option<String>,
    #[source]
    pub kind: ErrorKind,
}

fn field_suffix(field: &Option<String>) -> String {
    field.as_deref().map(|f| format!(".{f}")).unwrap_or_default()
}

impl LayoutError {
    pub(crate) fn at(record: &str, field: &str, kind: ErrorKind) -> Self {
        LayoutError {
            record: record.to_string(),
            field: Some(field.to_string()),
            kind,
        }
    }

    pub(crate) fn record(record: &str, kind: ErrorKind) -> Self {
        LayoutError {
            record: record.to_string(),
            field: None,
            kind,
        }
    }
}

/// What went wrong during a read or write.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A sibling field or named computation is missing or not yet populated.
    #[error("unresolved reference to `{0}`")]
    UnresolvedReference(String),
    /// Inferred length requested for a type without a fixed width.
    #[error("length of a variable-width type cannot be inferred")]
    AmbiguousLength,
    /// The stream ended before the requested number of bytes.
    #[error("stream truncated: needed {needed} bytes, got {available}")]
    TruncatedStream { needed: usize, available: usize },
    /// A nested record used more bytes than its slot allows.
    #[error("nested record used {used} bytes of a {slot}-byte slot")]
    LayoutOverflow { slot: usize, used: usize },
    /// A field the schema writes is absent from the supplied record.
    #[error("no value supplied")]
    MissingValue,
    /// A value does not have the shape its field type requires.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A sequence does not hold the number of elements its count resolves to.
    #[error("sequence holds {actual} elements but its count resolves to {expected}")]
    CountMismatch { expected: usize, actual: usize },
    /// A value cannot be represented in its wire form.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// A position-bounded repeat read an element that consumed no bytes.
    #[error("repeat made no progress at stream position {0}")]
    StalledRepeat(u64),
    /// No record type with this name is registered.
    #[error("unknown record type")]
    UnknownRecord,
    /// The underlying stream failed for a reason other than running out of data.
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_field() {
        let err = LayoutError::at("Header", "len", ErrorKind::UnresolvedReference("n".into()));
        assert_eq!(err.to_string(), "Header.len: unresolved reference to `n`");
    }

    #[test]
    fn test_display_without_field() {
        let err = LayoutError::record("Header", ErrorKind::UnknownRecord);
        assert_eq!(err.to_string(), "Header: unknown record type");
    }

    #[test]
    fn test_truncated_display() {
        let err = ErrorKind::TruncatedStream {
            needed: 8,
            available: 3,
        };
        assert_eq!(err.to_string(), "stream truncated: needed 8 bytes, got 3");
    }
}
