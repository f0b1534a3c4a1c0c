//! Directive executor: runs one field's plan against the stream.
//!
//! Per field the executor moves through `unconditional -> (conditionally active |
//! inactive) -> done`. Leading steps always run; the guarded steps run only when
//! the predicate holds. Every step returns the number of bytes it moved the
//! stream by, and the record's size is the sum of those numbers.

use std::io::{Read, Write};

use crate::{
    codec,
    compiled::{CompiledField, CompiledRecord, Step},
    engine::{ReadSession, WriteSession},
    errors::{ErrorKind, LayoutError},
    field::{FieldType, Length, Repeat},
    resolve::Resolver,
    schema::Registry,
    value::{Record, Value},
};

impl<R: Read> ReadSession<'_, R> {
    pub(crate) fn read_field(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        record: &mut Record,
    ) -> Result<usize, LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);
        let mut size = 0;

        for step in &field.plan.leading {
            size += self.read_step(schema, field, step, record)?;
        }

        if let Some(guard) = &field.plan.guard {
            let active = Resolver::new(self.registry, record)
                .predicate(&guard.predicate)
                .map_err(at)?;
            log::trace!("{}.{}: condition is {active}", schema.name, field.name);

            if active {
                for step in &guard.steps {
                    size += self.read_step(schema, field, step, record)?;
                }
            }
        }

        if !record.contains(&field.name) {
            record.insert(field.name.clone(), self.registry.zero_value(field));
        }

        Ok(size)
    }

    fn read_step(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        step: &Step,
        record: &mut Record,
    ) -> Result<usize, LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);

        match step {
            Step::Skip(length) => {
                let n = Resolver::new(self.registry, record)
                    .length(length, field.ty.element())
                    .map_err(at)?;
                log::trace!("{}.{}: skip {n} bytes", schema.name, field.name);
                self.reader.advance(n).map_err(at)?;
                Ok(n)
            }
            Step::Emit => {
                let (value, used) = self.read_value(schema, field, record)?;
                record.insert(field.name.clone(), value);
                Ok(used)
            }
            Step::Repeat(repeat) => {
                let (items, used) = self.read_repeat(schema, field, repeat, record)?;
                record.insert(field.name.clone(), Value::Seq(items));
                Ok(used)
            }
        }
    }

    fn read_repeat(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        repeat: &Repeat,
        record: &Record,
    ) -> Result<(Vec<Value>, usize), LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);
        let resolver = Resolver::new(self.registry, record);
        let mut items = Vec::new();
        let mut size = 0;

        match repeat {
            Repeat::Count(count) => {
                let count = resolver.count(count).map_err(at)?;
                log::trace!("{}.{}: {count} elements", schema.name, field.name);

                for _ in 0..count {
                    let (value, used) = self.read_value(schema, field, record)?;
                    items.push(value);
                    size += used;
                }
            }
            Repeat::UntilPosition(target) => {
                let target = resolver.position(target).map_err(at)?;
                log::trace!("{}.{}: elements until {target}", schema.name, field.name);

                while self.reader.position() < target {
                    let (value, used) = self.read_value(schema, field, record)?;
                    if used == 0 {
                        return Err(at(ErrorKind::StalledRepeat(self.reader.position())));
                    }
                    items.push(value);
                    size += used;
                }
            }
        }

        Ok((items, size))
    }

    /// Reads one occurrence of the field's element type.
    fn read_value(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        record: &Record,
    ) -> Result<(Value, usize), LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);
        let ty = field.ty.element();

        if let FieldType::Record(name) = ty {
            return self.read_nested(schema, field, name, record);
        }

        let n = Resolver::new(self.registry, record)
            .length(&field.length, ty)
            .map_err(at)?;
        let bytes = self.fill(n).map_err(at)?;
        let value = codec::decode(ty, bytes)
            .ok_or_else(|| at(ErrorKind::InvalidValue(format!("{ty} has no codec"))))?;

        Ok((value, n))
    }

    /// Reads a nested record, then skips the rest of its slot if the field declares one.
    fn read_nested(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        name: &str,
        record: &Record,
    ) -> Result<(Value, usize), LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);
        let registry = self.registry;
        let nested = registry
            .record(name)
            .ok_or_else(|| LayoutError::record(name, ErrorKind::UnknownRecord))?;
        let slot = slot_length(registry, record, field).map_err(at)?;

        let value = self.read_record(nested)?;
        let used = value.actual_size();

        let Some(slot) = slot else {
            return Ok((Value::Record(value), used));
        };

        let pad = slot
            .checked_sub(used)
            .ok_or_else(|| at(ErrorKind::LayoutOverflow { slot, used }))?;
        log::trace!("{}.{}: skip {pad} slot bytes", schema.name, field.name);
        self.reader.advance(pad).map_err(at)?;

        Ok((Value::Record(value), slot))
    }
}

impl<W: Write> WriteSession<'_, W> {
    pub(crate) fn write_field(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        record: &Record,
    ) -> Result<usize, LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);
        let mut size = 0;

        for step in &field.plan.leading {
            size += self.write_step(schema, field, step, record)?;
        }

        if let Some(guard) = &field.plan.guard {
            let active = Resolver::new(self.registry, record)
                .predicate(&guard.predicate)
                .map_err(at)?;
            log::trace!("{}.{}: condition is {active}", schema.name, field.name);

            if active {
                for step in &guard.steps {
                    size += self.write_step(schema, field, step, record)?;
                }
            }
        }

        Ok(size)
    }

    fn write_step(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        step: &Step,
        record: &Record,
    ) -> Result<usize, LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);

        match step {
            Step::Skip(length) => {
                let n = Resolver::new(self.registry, record)
                    .length(length, field.ty.element())
                    .map_err(at)?;
                log::trace!("{}.{}: zero-fill {n} bytes", schema.name, field.name);
                self.writer.write_zeros(n).map_err(at)?;
                Ok(n)
            }
            Step::Emit => {
                let value = record
                    .get(&field.name)
                    .ok_or_else(|| at(ErrorKind::MissingValue))?;
                self.write_value(schema, field, value, record)
            }
            Step::Repeat(repeat) => self.write_repeat(schema, field, repeat, record),
        }
    }

    fn write_repeat(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        repeat: &Repeat,
        record: &Record,
    ) -> Result<usize, LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);

        let count = match repeat {
            Repeat::Count(count) => Resolver::new(self.registry, record)
                .count(count)
                .map_err(at)?,
            Repeat::UntilPosition(_) => {
                log::warn!(
                    "{}.{}: position-bounded repeats are not written",
                    schema.name,
                    field.name
                );
                return Ok(0);
            }
        };

        let value = record
            .get(&field.name)
            .ok_or_else(|| at(ErrorKind::MissingValue))?;
        let items = value.as_seq().ok_or_else(|| {
            at(ErrorKind::TypeMismatch {
                expected: "sequence",
                found: value.kind(),
            })
        })?;
        if items.len() != count {
            return Err(at(ErrorKind::CountMismatch {
                expected: count,
                actual: items.len(),
            }));
        }
        log::trace!("{}.{}: {count} elements", schema.name, field.name);

        let mut size = 0;
        for item in items {
            size += self.write_value(schema, field, item, record)?;
        }

        Ok(size)
    }

    /// Writes one occurrence of the field's element type.
    fn write_value(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        value: &Value,
        record: &Record,
    ) -> Result<usize, LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);
        let ty = field.ty.element();

        if let FieldType::Record(name) = ty {
            return self.write_nested(schema, field, name, value, record);
        }

        let n = Resolver::new(self.registry, record)
            .length(&field.length, ty)
            .map_err(at)?;
        self.put(n, |slot| {
            codec::encode(ty, value, slot).ok_or(ErrorKind::TypeMismatch {
                expected: ty.name(),
                found: value.kind(),
            })
        })
        .map_err(at)?;

        Ok(n)
    }

    /// Writes a nested record, then zero-pads the rest of its slot if the field declares one.
    fn write_nested(
        &mut self,
        schema: &CompiledRecord,
        field: &CompiledField,
        name: &str,
        value: &Value,
        record: &Record,
    ) -> Result<usize, LayoutError> {
        let at = |kind: ErrorKind| LayoutError::at(&schema.name, &field.name, kind);
        let registry = self.registry;
        let nested = registry
            .record(name)
            .ok_or_else(|| LayoutError::record(name, ErrorKind::UnknownRecord))?;
        let inner = value.as_record().ok_or_else(|| {
            at(ErrorKind::TypeMismatch {
                expected: "record",
                found: value.kind(),
            })
        })?;
        let slot = slot_length(registry, record, field).map_err(at)?;

        let used = self.write_record(nested, inner)?;

        let Some(slot) = slot else {
            return Ok(used);
        };

        let pad = slot
            .checked_sub(used)
            .ok_or_else(|| at(ErrorKind::LayoutOverflow { slot, used }))?;
        log::trace!("{}.{}: zero-fill {pad} slot bytes", schema.name, field.name);
        self.writer.write_zeros(pad).map_err(at)?;

        Ok(slot)
    }
}

/// Slot length of a nested record field; `None` when the record takes its natural size.
fn slot_length(
    registry: &Registry,
    record: &Record,
    field: &CompiledField,
) -> Result<Option<usize>, ErrorKind> {
    match &field.length {
        Length::Inferred => Ok(None),
        length => Resolver::new(registry, record)
            .length(length, field.ty.element())
            .map(Some),
    }
}
