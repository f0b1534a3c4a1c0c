//! Registry of compiled record types, and the entry points for reading and writing them.

use std::{
    collections::HashMap,
    fmt,
    io::{Read, Write},
};

use crate::{
    compiled::{CompiledField, CompiledRecord},
    engine::{ReadSession, WriteSession},
    errors::{CompileError, ErrorKind, LayoutError},
    field::{FieldType, RecordSchema},
    stream::{ByteReader, ByteWriter},
    value::{Record, Value},
};

/// Upper bound on the buffer `write_vec` reserves up front.
const PREALLOC_LIMIT: usize = 64 * 1024;

/// Length function: computes a length, count or position from the record being processed.
/// Returns `None` when the inputs it needs are not available.
pub type LengthFn = dyn Fn(&Record) -> Option<u64> + Send + Sync;

/// Predicate function: decides whether a conditional span is active.
pub type PredicateFn = dyn Fn(&Record) -> bool + Send + Sync;

/// A set of record types and the named functions their policies refer to.
///
/// Build it once, then share it by reference: reading and writing never mutate
/// the registry, so any number of threads can use it at once on separate streams.
///
/// Functions must be registered before the records that name them, and nested
/// record types before the records that contain them.
#[derive(Default)]
pub struct Registry {
    records: HashMap<String, CompiledRecord>,
    lengths: HashMap<String, Box<LengthFn>>,
    predicates: HashMap<String, Box<PredicateFn>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.records.keys().collect::<Vec<_>>())
            .field("lengths", &self.lengths.keys().collect::<Vec<_>>())
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a length function under `name`, for [crate::field::Length::Computed].
    pub fn register_length<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Record) -> Option<u64> + Send + Sync + 'static,
    {
        self.lengths.insert(name.into(), Box::new(f));
        self
    }

    /// Registers a predicate function under `name`, for [crate::field::Predicate::Computed].
    pub fn register_predicate<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Box::new(f));
        self
    }

    /// Validates and adds a record type.
    pub fn register(&mut self, schema: RecordSchema) -> Result<&CompiledRecord, CompileError> {
        if self.records.contains_key(&schema.name) {
            return Err(CompileError::DuplicateRecord(schema.name));
        }

        let compiled = CompiledRecord::compile(&schema, self)?;
        log::debug!(
            "registered record {} with {} fields",
            compiled.name,
            compiled.fields.len()
        );

        Ok(self.records.entry(schema.name).or_insert(compiled))
    }

    pub fn record(&self, name: &str) -> Option<&CompiledRecord> {
        self.records.get(name)
    }

    /// Size in bytes of a record type whose layout does not depend on field values.
    pub fn fixed_size(&self, name: &str) -> Option<usize> {
        self.record(name)?.fixed_size(self)
    }

    /// Reads one record of type `name` from `reader`.
    pub fn read<R: Read>(
        &self,
        name: &str,
        reader: &mut ByteReader<R>,
    ) -> Result<Record, LayoutError> {
        let schema = self.lookup(name)?;
        ReadSession::new(self, reader).read_record(schema)
    }

    /// Writes `record` as type `name`. Returns the number of bytes written.
    pub fn write<W: Write>(
        &self,
        name: &str,
        record: &Record,
        writer: &mut ByteWriter<W>,
    ) -> Result<usize, LayoutError> {
        let schema = self.lookup(name)?;
        WriteSession::new(self, writer).write_record(schema, record)
    }

    /// Reads one record from the start of `data`. Trailing bytes are ignored.
    pub fn read_slice(&self, name: &str, data: &[u8]) -> Result<Record, LayoutError> {
        self.read(name, &mut ByteReader::new(data))
    }

    pub fn write_vec(&self, name: &str, record: &Record) -> Result<Vec<u8>, LayoutError> {
        let capacity = self
            .fixed_size(name)
            .map_or(0, |size| size.min(PREALLOC_LIMIT));
        let mut writer = ByteWriter::new(Vec::with_capacity(capacity));
        self.write(name, record, &mut writer)?;
        Ok(writer.into_inner())
    }

    fn lookup(&self, name: &str) -> Result<&CompiledRecord, LayoutError> {
        self.record(name)
            .ok_or_else(|| LayoutError::record(name, ErrorKind::UnknownRecord))
    }

    pub(crate) fn length_fn(&self, name: &str) -> Option<&LengthFn> {
        self.lengths.get(name).map(|f| &**f)
    }

    pub(crate) fn predicate_fn(&self, name: &str) -> Option<&PredicateFn> {
        self.predicates.get(name).map(|f| &**f)
    }

    pub(crate) fn has_length_fn(&self, name: &str) -> bool {
        self.lengths.contains_key(name)
    }

    pub(crate) fn has_predicate_fn(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Value a field holds when it is not read: its declared default, else the zero value of its type.
    pub(crate) fn zero_value(&self, field: &CompiledField) -> Value {
        match &field.default {
            Some(value) => value.clone(),
            None => self.zero_of(&field.ty),
        }
    }

    fn zero_of(&self, ty: &FieldType) -> Value {
        match ty {
            FieldType::Record(name) => {
                let mut record = Record::new();
                if let Some(schema) = self.record(name) {
                    for field in &schema.fields {
                        record.insert(field.name.clone(), self.zero_value(field));
                    }
                }
                Value::Record(record)
            }
            other => other.zero_scalar(),
        }
    }
}
