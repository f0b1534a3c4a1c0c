//! Validated record layouts.
//!
//! Compilation checks a [RecordSchema] against the registry it is being added
//! to and turns each field's directive list into a [Plan]: the directives
//! declared before the field's condition run unconditionally, everything from
//! the condition to the end of the list runs under it.

use std::collections::HashMap;

use crate::{
    errors::CompileError,
    field::{Directive, Field, FieldType, Length, Predicate, Repeat, RecordSchema},
    schema::Registry,
    value::Value,
};

/// One executable step of a field plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Skip(Length),
    Emit,
    Repeat(Repeat),
}

/// Steps guarded by a condition. The span always closes at the end of the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub predicate: Predicate,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub leading: Vec<Step>,
    pub guard: Option<Guard>,
}

impl Plan {
    /// A field with an empty plan takes no part in reading or writing.
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.guard.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledField {
    pub name: String,
    pub ty: FieldType,
    pub length: Length,
    pub plan: Plan,
    pub default: Option<Value>,
}

impl CompiledField {
    fn fixed_size(&self, registry: &Registry) -> Option<usize> {
        if self.plan.guard.is_some() {
            return None;
        }

        self.plan.leading.iter().try_fold(0usize, |acc, step| {
            let size = match step {
                Step::Skip(Length::Fixed(n)) => *n,
                Step::Skip(Length::Inferred) => self.ty.element().width()?,
                Step::Skip(_) => return None,
                Step::Emit => self.occurrence_size(registry)?,
                Step::Repeat(Repeat::Count(Length::Fixed(n))) => {
                    n.checked_mul(self.occurrence_size(registry)?)?
                }
                Step::Repeat(_) => return None,
            };
            acc.checked_add(size)
        })
    }

    fn occurrence_size(&self, registry: &Registry) -> Option<usize> {
        match (self.ty.element(), &self.length) {
            (_, Length::Fixed(n)) => Some(*n),
            (FieldType::Record(name), Length::Inferred) => registry.fixed_size(name),
            (ty, Length::Inferred) => ty.width(),
            _ => None,
        }
    }
}

/// A record type that passed validation. Fields are kept in wire order.
#[derive(Debug, Clone)]
pub struct CompiledRecord {
    pub name: String,
    pub fields: Vec<CompiledField>,
}

impl CompiledRecord {
    /// Validates `schema` against the record types and functions already in `registry`.
    pub fn compile(schema: &RecordSchema, registry: &Registry) -> Result<Self, CompileError> {
        let mut scope = Scope {
            record: &schema.name,
            registry,
            earlier: HashMap::new(),
        };
        let mut fields = Vec::with_capacity(schema.fields.len());

        for field in &schema.fields {
            if field.name.is_empty() {
                return Err(CompileError::InvalidFieldName {
                    record: schema.name.clone(),
                });
            }
            if scope.earlier.contains_key(field.name.as_str()) {
                return Err(CompileError::DuplicateField {
                    record: schema.name.clone(),
                    field: field.name.clone(),
                });
            }

            fields.push(scope.compile_field(field)?);
            scope.earlier.insert(&field.name, &field.ty);
        }

        Ok(CompiledRecord {
            name: schema.name.clone(),
            fields,
        })
    }

    /// Size in bytes when the layout does not depend on field values.
    /// `None` if it does, or if the size does not fit in `usize`.
    pub fn fixed_size(&self, registry: &Registry) -> Option<usize> {
        self.fields
            .iter()
            .try_fold(0usize, |acc, field| acc.checked_add(field.fixed_size(registry)?))
    }
}

struct Scope<'a> {
    record: &'a str,
    registry: &'a Registry,
    /// Fields declared before the one being compiled; the only valid reference targets.
    earlier: HashMap<&'a str, &'a FieldType>,
}

impl Scope<'_> {
    fn compile_field(&self, field: &Field) -> Result<CompiledField, CompileError> {
        let invalid = |reason| CompileError::InvalidDirectives {
            record: self.record.to_string(),
            field: field.name.clone(),
            reason,
        };

        self.check_type(field, &field.ty)?;
        self.check_default(field)?;

        let mut plan = Plan::default();
        let (mut emits, mut repeats) = (0, 0);

        for directive in &field.directives {
            let step = match directive {
                Directive::Condition(predicate) => {
                    if plan.guard.is_some() {
                        return Err(invalid("a field may declare only one condition"));
                    }
                    self.check_predicate(field, predicate)?;
                    plan.guard = Some(Guard {
                        predicate: predicate.clone(),
                        steps: Vec::new(),
                    });
                    continue;
                }
                Directive::Skip(length) => {
                    if length.is_inferred() && field.ty.element().width().is_none() {
                        return Err(self.ambiguous(field));
                    }
                    self.check_length_ref(field, length)?;
                    Step::Skip(length.clone())
                }
                Directive::Emit => {
                    emits += 1;
                    Step::Emit
                }
                Directive::Repeat(repeat) => {
                    repeats += 1;
                    let (Repeat::Count(length) | Repeat::UntilPosition(length)) = repeat;
                    if length.is_inferred() {
                        return Err(invalid("a repeat count cannot be inferred"));
                    }
                    self.check_length_ref(field, length)?;
                    Step::Repeat(repeat.clone())
                }
            };

            match &mut plan.guard {
                Some(guard) => guard.steps.push(step),
                None => plan.leading.push(step),
            }
        }

        if !field.directives.is_empty() {
            let is_sequence = matches!(field.ty, FieldType::Sequence(_));

            if emits > 1 {
                return Err(invalid("a field may declare only one emit"));
            }
            if repeats > 1 {
                return Err(invalid("a field may declare only one repeat"));
            }
            match (emits, repeats) {
                (0, 0) => return Err(invalid("a field needs an emit or a repeat")),
                (1, 1) => return Err(invalid("emit and repeat are mutually exclusive")),
                _ => {}
            }
            if is_sequence && emits == 1 {
                return Err(invalid("sequence fields are written with repeat"));
            }
            if !is_sequence && repeats == 1 {
                return Err(invalid("repeat requires a sequence type"));
            }

            self.check_value_length(field)?;
        }

        Ok(CompiledField {
            name: field.name.clone(),
            ty: field.ty.clone(),
            length: field.length.clone(),
            plan,
            default: field.default.clone(),
        })
    }

    fn check_type(&self, field: &Field, ty: &FieldType) -> Result<(), CompileError> {
        match ty {
            FieldType::Sequence(inner) => {
                if matches!(**inner, FieldType::Sequence(_)) {
                    return Err(CompileError::UnsupportedType {
                        record: self.record.to_string(),
                        field: field.name.clone(),
                        type_name: ty.to_string(),
                    });
                }
                self.check_type(field, inner)
            }
            FieldType::Record(name) if self.registry.record(name).is_none() => {
                Err(self.unresolved(field, name))
            }
            _ => Ok(()),
        }
    }

    fn check_default(&self, field: &Field) -> Result<(), CompileError> {
        match &field.default {
            Some(value) if !field.ty.accepts(value) => Err(CompileError::InvalidDefault {
                record: self.record.to_string(),
                field: field.name.clone(),
                expected: field.ty.to_string(),
                found: value.kind(),
            }),
            _ => Ok(()),
        }
    }

    /// Length of one occurrence of the value.
    fn check_value_length(&self, field: &Field) -> Result<(), CompileError> {
        let ty = field.ty.element();

        match (ty.width(), &field.length) {
            (Some(_), Length::Inferred) => Ok(()),
            (Some(width), Length::Fixed(n)) if *n == width => Ok(()),
            (Some(width), _) => Err(CompileError::InvalidLength {
                record: self.record.to_string(),
                field: field.name.clone(),
                width,
            }),
            (None, Length::Inferred) if !matches!(ty, FieldType::Record(_)) => {
                Err(self.ambiguous(field))
            }
            (None, length) => self.check_length_ref(field, length),
        }
    }

    fn check_length_ref(&self, field: &Field, length: &Length) -> Result<(), CompileError> {
        match length {
            Length::Field(name) => self.check_sibling(field, name, "an integer field", |ty| {
                ty.is_integer()
            }),
            Length::Computed(name) if !self.registry.has_length_fn(name) => {
                Err(self.unresolved(field, name))
            }
            _ => Ok(()),
        }
    }

    fn check_predicate(&self, field: &Field, predicate: &Predicate) -> Result<(), CompileError> {
        match predicate {
            Predicate::Field(name) => {
                self.check_sibling(field, name, "a bool or integer field", |ty| {
                    *ty == FieldType::Bool || ty.is_integer()
                })
            }
            Predicate::Computed(name) if !self.registry.has_predicate_fn(name) => {
                Err(self.unresolved(field, name))
            }
            Predicate::Computed(_) => Ok(()),
        }
    }

    fn check_sibling(
        &self,
        field: &Field,
        name: &str,
        expected: &'static str,
        accepts: impl Fn(&FieldType) -> bool,
    ) -> Result<(), CompileError> {
        let ty = self
            .earlier
            .get(name)
            .copied()
            .ok_or_else(|| self.unresolved(field, name))?;

        if !accepts(ty) {
            return Err(CompileError::InvalidReference {
                record: self.record.to_string(),
                field: field.name.clone(),
                name: name.to_string(),
                expected,
            });
        }

        Ok(())
    }

    fn unresolved(&self, field: &Field, name: &str) -> CompileError {
        CompileError::UnresolvedReference {
            record: self.record.to_string(),
            field: field.name.clone(),
            name: name.to_string(),
        }
    }

    fn ambiguous(&self, field: &Field) -> CompileError {
        CompileError::AmbiguousLength {
            record: self.record.to_string(),
            field: field.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(fields: Vec<Field>) -> Result<CompiledRecord, CompileError> {
        CompiledRecord::compile(&RecordSchema::new("Test", fields), &Registry::new())
    }

    #[test]
    fn test_condition_spans_to_end_of_field() {
        let record = compile(vec![
            Field::new("flag", FieldType::Bool).emit(),
            Field::new("x", FieldType::U32)
                .skip(Length::Fixed(2))
                .when(Predicate::Field("flag".into()))
                .skip(Length::Fixed(1))
                .emit()
                .skip(Length::Fixed(3)),
        ])
        .unwrap();

        let plan = &record.fields[1].plan;
        assert_eq!(plan.leading, vec![Step::Skip(Length::Fixed(2))]);
        assert_eq!(
            plan.guard,
            Some(Guard {
                predicate: Predicate::Field("flag".into()),
                steps: vec![
                    Step::Skip(Length::Fixed(1)),
                    Step::Emit,
                    Step::Skip(Length::Fixed(3))
                ],
            })
        );
    }

    #[test]
    fn test_field_without_directives_has_empty_plan() {
        let record = compile(vec![Field::new("x", FieldType::U8)]).unwrap();
        assert!(record.fields[0].plan.is_empty());
    }

    #[test]
    fn test_duplicate_field() {
        let result = compile(vec![
            Field::new("x", FieldType::U8).emit(),
            Field::new("x", FieldType::U8).emit(),
        ]);
        assert!(matches!(result, Err(CompileError::DuplicateField { .. })));
    }

    #[test]
    fn test_empty_field_name() {
        let result = compile(vec![Field::new("", FieldType::U8).emit()]);
        assert!(matches!(result, Err(CompileError::InvalidFieldName { .. })));
    }

    #[test]
    fn test_two_emits() {
        let result = compile(vec![Field::new("x", FieldType::U8).emit().emit()]);
        assert!(matches!(result, Err(CompileError::InvalidDirectives { .. })));
    }

    #[test]
    fn test_skip_only_field() {
        let result = compile(vec![Field::new("x", FieldType::U8).skip(Length::Fixed(1))]);
        assert!(matches!(result, Err(CompileError::InvalidDirectives { .. })));
    }

    #[test]
    fn test_two_conditions() {
        let result = compile(vec![
            Field::new("flag", FieldType::Bool).emit(),
            Field::new("x", FieldType::U8)
                .when(Predicate::Field("flag".into()))
                .when(Predicate::Field("flag".into()))
                .emit(),
        ]);
        assert!(matches!(result, Err(CompileError::InvalidDirectives { .. })));
    }

    #[test]
    fn test_repeat_needs_sequence() {
        let result = compile(vec![
            Field::new("x", FieldType::U8).repeat(Repeat::Count(Length::Fixed(2))),
        ]);
        assert!(matches!(result, Err(CompileError::InvalidDirectives { .. })));

        let result = compile(vec![
            Field::new("x", FieldType::Sequence(Box::new(FieldType::U8))).emit(),
        ]);
        assert!(matches!(result, Err(CompileError::InvalidDirectives { .. })));
    }

    #[test]
    fn test_nested_sequence_unsupported() {
        let ty = FieldType::Sequence(Box::new(FieldType::Sequence(Box::new(FieldType::U8))));
        let result = compile(vec![Field::new("x", ty).repeat(Repeat::Count(Length::Fixed(1)))]);
        assert!(matches!(result, Err(CompileError::UnsupportedType { .. })));
    }

    #[test]
    fn test_string_needs_explicit_length() {
        let result = compile(vec![Field::new("s", FieldType::String).emit()]);
        assert!(matches!(result, Err(CompileError::AmbiguousLength { .. })));

        let result = compile(vec![
            Field::new("b", FieldType::Bytes)
                .with_length(Length::Fixed(2))
                .skip(Length::Inferred)
                .emit(),
        ]);
        assert!(matches!(result, Err(CompileError::AmbiguousLength { .. })));
    }

    #[test]
    fn test_scalar_length_must_match_width() {
        assert!(compile(vec![
            Field::new("x", FieldType::U32).with_length(Length::Fixed(4)).emit()
        ])
        .is_ok());

        let result = compile(vec![
            Field::new("x", FieldType::U32).with_length(Length::Fixed(8)).emit(),
        ]);
        assert!(matches!(
            result,
            Err(CompileError::InvalidLength { width: 4, .. })
        ));
    }

    #[test]
    fn test_forward_reference() {
        let result = compile(vec![
            Field::new("s", FieldType::String)
                .with_length(Length::Field("len".into()))
                .emit(),
            Field::new("len", FieldType::U8).emit(),
        ]);
        assert!(matches!(
            result,
            Err(CompileError::UnresolvedReference { ref name, .. }) if name == "len"
        ));
    }

    #[test]
    fn test_length_reference_must_be_integer() {
        let result = compile(vec![
            Field::new("len", FieldType::F32).emit(),
            Field::new("s", FieldType::String)
                .with_length(Length::Field("len".into()))
                .emit(),
        ]);
        assert!(matches!(result, Err(CompileError::InvalidReference { .. })));
    }

    #[test]
    fn test_unknown_computation_and_record() {
        let result = compile(vec![
            Field::new("s", FieldType::Bytes)
                .with_length(Length::Computed("payload_len".into()))
                .emit(),
        ]);
        assert!(matches!(result, Err(CompileError::UnresolvedReference { .. })));

        let result = compile(vec![Field::new("r", FieldType::Record("Missing".into())).emit()]);
        assert!(matches!(result, Err(CompileError::UnresolvedReference { .. })));
    }

    #[test]
    fn test_fixed_size() {
        let registry = Registry::new();
        let record = compile(vec![
            Field::new("a", FieldType::U16).skip(Length::Fixed(2)).emit(),
            Field::new("b", FieldType::String).with_length(Length::Fixed(6)).emit(),
            Field::new("c", FieldType::Sequence(Box::new(FieldType::U32)))
                .repeat(Repeat::Count(Length::Fixed(3))),
            Field::new("unused", FieldType::U64),
        ])
        .unwrap();
        assert_eq!(record.fixed_size(&registry), Some(2 + 2 + 6 + 12));

        let record = compile(vec![
            Field::new("n", FieldType::U8).emit(),
            Field::new("c", FieldType::Sequence(Box::new(FieldType::U32)))
                .repeat(Repeat::Count(Length::Field("n".into()))),
        ])
        .unwrap();
        assert_eq!(record.fixed_size(&registry), None);
    }

    #[test]
    fn test_default_must_match_type() {
        let result = compile(vec![
            Field::new("n", FieldType::U8).with_default(Value::from("seven")),
        ]);
        assert!(matches!(
            result,
            Err(CompileError::InvalidDefault { found: "string", ref expected, .. }) if expected == "u8"
        ));

        assert!(compile(vec![Field::new("n", FieldType::U8).with_default(Value::U8(7))]).is_ok());
    }

    #[test]
    fn test_fixed_size_overflow() {
        let registry = Registry::new();
        let record = compile(vec![
            Field::new("xs", FieldType::Sequence(Box::new(FieldType::U32)))
                .repeat(Repeat::Count(Length::Fixed(usize::MAX / 2))),
        ])
        .unwrap();
        assert_eq!(record.fixed_size(&registry), None);

        let record = compile(vec![
            Field::new("a", FieldType::Bytes)
                .with_length(Length::Fixed(usize::MAX))
                .emit(),
            Field::new("b", FieldType::U8).emit(),
        ])
        .unwrap();
        assert_eq!(record.fixed_size(&registry), None);
    }
}
