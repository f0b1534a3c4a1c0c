//! Turns length, count, position and predicate policies into concrete values,
//! using the fields of the record being processed.

use crate::{
    errors::ErrorKind,
    field::{FieldType, Length, Predicate},
    schema::Registry,
    value::{Record, Value},
};

pub(crate) struct Resolver<'a> {
    registry: &'a Registry,
    /// Fields populated so far (read) or the supplied record (write).
    record: &'a Record,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry, record: &'a Record) -> Self {
        Self { registry, record }
    }

    /// Byte length of one occurrence of `ty`.
    pub fn length(&self, policy: &Length, ty: &FieldType) -> Result<usize, ErrorKind> {
        match self.explicit(policy)? {
            Some(n) => to_usize(n),
            None => ty.width().ok_or(ErrorKind::AmbiguousLength),
        }
    }

    pub fn count(&self, policy: &Length) -> Result<usize, ErrorKind> {
        let n = self.explicit(policy)?.ok_or(ErrorKind::AmbiguousLength)?;
        to_usize(n)
    }

    /// Absolute stream position.
    pub fn position(&self, policy: &Length) -> Result<u64, ErrorKind> {
        self.explicit(policy)?.ok_or(ErrorKind::AmbiguousLength)
    }

    pub fn predicate(&self, predicate: &Predicate) -> Result<bool, ErrorKind> {
        match predicate {
            Predicate::Field(name) => {
                let value = self.sibling(name)?;
                match (value.as_bool(), value.as_integer()) {
                    (Some(b), _) => Ok(b),
                    (None, Some(n)) => Ok(n != 0),
                    (None, None) => Err(ErrorKind::TypeMismatch {
                        expected: "bool or integer",
                        found: value.kind(),
                    }),
                }
            }
            Predicate::Computed(name) => {
                let f = self
                    .registry
                    .predicate_fn(name)
                    .ok_or_else(|| ErrorKind::UnresolvedReference(name.clone()))?;
                Ok(f(self.record))
            }
        }
    }

    /// `None` for [Length::Inferred].
    fn explicit(&self, policy: &Length) -> Result<Option<u64>, ErrorKind> {
        let n = match policy {
            Length::Fixed(n) => *n as u64,
            Length::Field(name) => {
                let value = self.sibling(name)?;
                value.as_u64().ok_or_else(|| ErrorKind::TypeMismatch {
                    expected: "non-negative integer",
                    found: value.kind(),
                })?
            }
            Length::Computed(name) => {
                let f = self
                    .registry
                    .length_fn(name)
                    .ok_or_else(|| ErrorKind::UnresolvedReference(name.clone()))?;
                f(self.record).ok_or_else(|| ErrorKind::UnresolvedReference(name.clone()))?
            }
            Length::Inferred => return Ok(None),
        };
        Ok(Some(n))
    }

    fn sibling(&self, name: &str) -> Result<&'a Value, ErrorKind> {
        self.record
            .get(name)
            .ok_or_else(|| ErrorKind::UnresolvedReference(name.to_string()))
    }
}

fn to_usize(n: u64) -> Result<usize, ErrorKind> {
    usize::try_from(n).map_err(|_| ErrorKind::InvalidValue(format!("length {n} exceeds usize")))
}
