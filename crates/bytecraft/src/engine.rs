//! Record-level read and write loops.
//!
//! A session lives for one top-level call. It walks the fields of a record in
//! wire order, hands each to the directive executor (see `exec.rs`) and keeps
//! the running byte count. Nested records re-enter the same session.

use std::io::{Read, Write};

use crate::{
    compiled::CompiledRecord,
    errors::{ErrorKind, LayoutError},
    schema::Registry,
    stream::{ByteReader, ByteWriter},
    value::Record,
};

pub(crate) struct ReadSession<'a, R> {
    pub(crate) registry: &'a Registry,
    pub(crate) reader: &'a mut ByteReader<R>,
    /// Reused for every slot read during this call.
    scratch: Vec<u8>,
}

impl<'a, R: Read> ReadSession<'a, R> {
    pub fn new(registry: &'a Registry, reader: &'a mut ByteReader<R>) -> Self {
        Self {
            registry,
            reader,
            scratch: Vec::new(),
        }
    }

    pub fn read_record(&mut self, schema: &CompiledRecord) -> Result<Record, LayoutError> {
        log::debug!(
            "reading {} at position {}",
            schema.name,
            self.reader.position()
        );

        let start = self.reader.position();
        let mut record = Record::new();

        for field in &schema.fields {
            let used = self.read_field(schema, field, &mut record)?;
            record.actual_size += used;
        }

        debug_assert_eq!(self.reader.position() - start, record.actual_size as u64);
        log::debug!("read {} ({} bytes)", schema.name, record.actual_size);

        Ok(record)
    }

    /// Reads exactly `n` bytes into the scratch buffer.
    pub(crate) fn fill(&mut self, n: usize) -> Result<&[u8], ErrorKind> {
        self.scratch.clear();
        self.reader.read_to_vec(n, &mut self.scratch)?;
        Ok(&self.scratch)
    }
}

pub(crate) struct WriteSession<'a, W> {
    pub(crate) registry: &'a Registry,
    pub(crate) writer: &'a mut ByteWriter<W>,
    scratch: Vec<u8>,
}

impl<'a, W: Write> WriteSession<'a, W> {
    pub fn new(registry: &'a Registry, writer: &'a mut ByteWriter<W>) -> Self {
        Self {
            registry,
            writer,
            scratch: Vec::new(),
        }
    }

    /// Writes every participating field of `record`; nothing missing is synthesized.
    pub fn write_record(
        &mut self,
        schema: &CompiledRecord,
        record: &Record,
    ) -> Result<usize, LayoutError> {
        log::debug!(
            "writing {} at position {}",
            schema.name,
            self.writer.position()
        );

        let start = self.writer.position();
        let mut size = 0;

        for field in &schema.fields {
            size += self.write_field(schema, field, record)?;
        }

        debug_assert_eq!(self.writer.position() - start, size as u64);
        log::debug!("wrote {} ({size} bytes)", schema.name);

        Ok(size)
    }

    /// Lets `encode` fill a zeroed `n`-byte slot, then writes it.
    pub(crate) fn put(
        &mut self,
        n: usize,
        encode: impl FnOnce(&mut [u8]) -> Result<(), ErrorKind>,
    ) -> Result<(), ErrorKind> {
        self.scratch.clear();
        self.scratch.resize(n, 0);
        encode(&mut self.scratch)?;
        self.writer.write_all(&self.scratch)
    }
}
