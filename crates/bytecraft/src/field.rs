//! Definition of logical fields used to build a [crate::field::RecordSchema].

use std::fmt;

use crate::value::Value;

/// Semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// One UTF-16 code unit.
    Char16,
    /// UTF-8 text in a fixed-length slot, NUL padded.
    String,
    /// Raw bytes in a fixed-length slot, zero padded.
    Bytes,
    /// Another registered record type, by name.
    Record(String),
    /// Repeated elements of the inner type. Requires a [Directive::Repeat].
    Sequence(Box<FieldType>),
}

impl FieldType {
    /// Looks up a primitive type by its schema name (`"u32"`, `"string"`, ...).
    ///
    /// Returns `None` for anything else, including fixed-point `decimal`.
    pub fn from_name(name: &str) -> Option<FieldType> {
        let ty = match name {
            "bool" => FieldType::Bool,
            "i8" => FieldType::I8,
            "u8" => FieldType::U8,
            "i16" => FieldType::I16,
            "u16" => FieldType::U16,
            "i32" => FieldType::I32,
            "u32" => FieldType::U32,
            "i64" => FieldType::I64,
            "u64" => FieldType::U64,
            "f32" => FieldType::F32,
            "f64" => FieldType::F64,
            "char16" => FieldType::Char16,
            "string" => FieldType::String,
            "bytes" => FieldType::Bytes,
            _ => return None,
        };
        Some(ty)
    }

    /// Type of a single occurrence: the element type for sequences, `self` otherwise.
    pub fn element(&self) -> &FieldType {
        match self {
            FieldType::Sequence(inner) => inner,
            other => other,
        }
    }

    /// Schema name of the type; the inverse of [FieldType::from_name] for primitives.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::I8 => "i8",
            FieldType::U8 => "u8",
            FieldType::I16 => "i16",
            FieldType::U16 => "u16",
            FieldType::I32 => "i32",
            FieldType::U32 => "u32",
            FieldType::I64 => "i64",
            FieldType::U64 => "u64",
            FieldType::F32 => "f32",
            FieldType::F64 => "f64",
            FieldType::Char16 => "char16",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Record(_) => "record",
            FieldType::Sequence(_) => "sequence",
        }
    }

    /// Whether `value` has the shape of this type. Nested records are matched
    /// by variant only; their fields are checked when written.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::Sequence(inner), Value::Seq(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            (FieldType::Record(_), Value::Record(_)) => true,
            (FieldType::Char16, Value::Char(_)) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Bytes, Value::Bytes(_)) => true,
            (ty, value) => ty.codec().is_some() && ty.name() == value.kind(),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldType::I8
                | FieldType::U8
                | FieldType::I16
                | FieldType::U16
                | FieldType::I32
                | FieldType::U32
                | FieldType::I64
                | FieldType::U64
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Record(name) => write!(f, "record {name}"),
            FieldType::Sequence(inner) => write!(f, "sequence of {inner}"),
            other => f.write_str(other.name()),
        }
    }
}

/// How a length, repeat count or stream position is obtained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Length {
    /// A constant.
    Fixed(usize),
    /// The integer value of an earlier field of the same record.
    Field(String),
    /// A length function registered on the [crate::schema::Registry] under this name.
    Computed(String),
    /// The fixed width of the field type.
    #[default]
    Inferred,
}

impl Length {
    pub fn is_inferred(&self) -> bool {
        matches!(self, Length::Inferred)
    }
}

/// Source of the boolean that opens a conditional span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// An earlier bool field, or an integer field compared against zero.
    Field(String),
    /// A predicate function registered on the [crate::schema::Registry] under this name.
    Computed(String),
}

/// How many times a repeated field occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repeat {
    /// A resolved number of elements.
    Count(Length),
    /// Read elements while the stream position is below the resolved absolute position.
    /// Only meaningful when reading.
    UntilPosition(Length),
}

/// One step of a field's processing plan, kept in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Skip (read) or zero-fill (write) the resolved number of bytes.
    Skip(Length),
    /// Every later directive of the field only runs if the predicate holds.
    Condition(Predicate),
    /// Read or write the field value once.
    Emit,
    /// Read or write the field's elements.
    Repeat(Repeat),
}

/// A single named field of a record.
#[derive(Debug, Clone)]
pub struct Field {
    /// Key used in the resolved [crate::value::Record].
    pub name: String,
    pub ty: FieldType,
    /// Bytes taken by one occurrence of the value (one element for sequences).
    pub length: Length,
    pub directives: Vec<Directive>,
    /// Value the field takes when nothing is read for it. Defaults to the type's zero value.
    pub default: Option<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Field {
            name: name.into(),
            ty,
            length: Length::Inferred,
            directives: Vec::new(),
            default: None,
        }
    }

    pub fn with_length(mut self, length: Length) -> Self {
        self.length = length;
        self
    }

    pub fn skip(mut self, length: Length) -> Self {
        self.directives.push(Directive::Skip(length));
        self
    }

    pub fn when(mut self, predicate: Predicate) -> Self {
        self.directives.push(Directive::Condition(predicate));
        self
    }

    pub fn emit(mut self) -> Self {
        self.directives.push(Directive::Emit);
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.directives.push(Directive::Repeat(repeat));
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Named, ordered list of fields. Field order is wire order.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        RecordSchema {
            name: name.into(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(FieldType::from_name("u16"), Some(FieldType::U16));
        assert_eq!(FieldType::from_name("string"), Some(FieldType::String));
        assert_eq!(FieldType::from_name("decimal"), None);
    }

    #[test]
    fn test_builder_keeps_declaration_order() {
        let field = Field::new("x", FieldType::F64)
            .skip(Length::Fixed(4))
            .when(Predicate::Field("flag".into()))
            .emit()
            .skip(Length::Fixed(2));

        assert_eq!(
            field.directives,
            vec![
                Directive::Skip(Length::Fixed(4)),
                Directive::Condition(Predicate::Field("flag".into())),
                Directive::Emit,
                Directive::Skip(Length::Fixed(2)),
            ]
        );
        assert_eq!(field.length, Length::Inferred);
    }

    #[test]
    fn test_accepts() {
        assert!(FieldType::U8.accepts(&Value::U8(1)));
        assert!(!FieldType::U8.accepts(&Value::U16(1)));
        assert!(!FieldType::U8.accepts(&Value::from("1")));
        assert!(FieldType::Char16.accepts(&Value::Char('a')));
        assert!(FieldType::Record("R".into()).accepts(&Value::Record(Default::default())));

        let seq = FieldType::Sequence(Box::new(FieldType::I16));
        assert!(seq.accepts(&Value::Seq(vec![Value::I16(1), Value::I16(2)])));
        assert!(!seq.accepts(&Value::Seq(vec![Value::I16(1), Value::I32(2)])));
    }

    #[test]
    fn test_element_type() {
        let seq = FieldType::Sequence(Box::new(FieldType::U32));
        assert_eq!(seq.element(), &FieldType::U32);
        assert_eq!(FieldType::Bool.element(), &FieldType::Bool);
    }
}
