//! JSON‑deserializable schema description.
//!
//! These types describe record layouts as data, for example a schema file
//! shipped with your application, and convert into the core
//! [crate::field] types. [Registry::load_json] parses and registers a whole file.
//!
//! ```json
//! {
//!   "records": [
//!     {
//!       "name": "Packet",
//!       "fields": [
//!         { "name": "flags", "type": "u8", "directives": ["emit"] },
//!         { "name": "len", "type": "u16", "directives": [{ "skip": { "fixed": 1 } }, "emit"] },
//!         {
//!           "name": "body",
//!           "type": "bytes",
//!           "length": { "field": "len" },
//!           "directives": [{ "when": { "field": "flags" } }, "emit"]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    errors::CompileError,
    field::{Directive, Field, FieldType, Length, Predicate, RecordSchema, Repeat},
    schema::Registry,
};

/// Top‑level definition: record types in registration order.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RegistryDef {
    pub records: Vec<RecordDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDef,
    /// Bytes per occurrence; inferred from the type when absent.
    #[serde(default)]
    pub length: Option<LengthDef>,
    /// Directives in wire order. A field without directives is not serialized.
    #[serde(default)]
    pub directives: Vec<DirectiveDef>,
}

/// Field type: a primitive name, `{"record": "Name"}` or `{"sequence": <type>}`.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum TypeDef {
    Primitive(String),
    Record { record: String },
    Sequence { sequence: Box<TypeDef> },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum LengthDef {
    Fixed(usize),
    Field(String),
    Computed(String),
    Inferred,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum PredicateDef {
    Field(String),
    Computed(String),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum RepeatDef {
    Count(LengthDef),
    /// Read-only: repeat while the stream position is below this absolute position.
    UntilPosition(LengthDef),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveDef {
    Skip(LengthDef),
    When(PredicateDef),
    Emit,
    Repeat(RepeatDef),
}

impl From<LengthDef> for Length {
    fn from(value: LengthDef) -> Self {
        match value {
            LengthDef::Fixed(n) => Length::Fixed(n),
            LengthDef::Field(name) => Length::Field(name),
            LengthDef::Computed(name) => Length::Computed(name),
            LengthDef::Inferred => Length::Inferred,
        }
    }
}

impl From<PredicateDef> for Predicate {
    fn from(value: PredicateDef) -> Self {
        match value {
            PredicateDef::Field(name) => Predicate::Field(name),
            PredicateDef::Computed(name) => Predicate::Computed(name),
        }
    }
}

impl From<RepeatDef> for Repeat {
    fn from(value: RepeatDef) -> Self {
        match value {
            RepeatDef::Count(length) => Repeat::Count(length.into()),
            RepeatDef::UntilPosition(length) => Repeat::UntilPosition(length.into()),
        }
    }
}

impl From<DirectiveDef> for Directive {
    fn from(value: DirectiveDef) -> Self {
        match value {
            DirectiveDef::Skip(length) => Directive::Skip(length.into()),
            DirectiveDef::When(predicate) => Directive::Condition(predicate.into()),
            DirectiveDef::Emit => Directive::Emit,
            DirectiveDef::Repeat(repeat) => Directive::Repeat(repeat.into()),
        }
    }
}

impl TypeDef {
    /// Resolves the type. Unknown primitive names are reported as unsupported.
    fn into_field_type(self, record: &str, field: &str) -> Result<FieldType, CompileError> {
        match self {
            TypeDef::Primitive(name) => {
                FieldType::from_name(&name).ok_or_else(|| CompileError::UnsupportedType {
                    record: record.to_string(),
                    field: field.to_string(),
                    type_name: name,
                })
            }
            TypeDef::Record { record } => Ok(FieldType::Record(record)),
            TypeDef::Sequence { sequence } => Ok(FieldType::Sequence(Box::new(
                sequence.into_field_type(record, field)?,
            ))),
        }
    }
}

impl RecordDef {
    pub fn into_schema(self) -> Result<RecordSchema, CompileError> {
        let mut fields = Vec::with_capacity(self.fields.len());

        for def in self.fields {
            let ty = def.ty.into_field_type(&self.name, &def.name)?;
            let mut field = Field::new(def.name, ty);
            field.length = def.length.map(Into::into).unwrap_or_default();
            field.directives = def.directives.into_iter().map(Into::into).collect();
            fields.push(field);
        }

        Ok(RecordSchema::new(self.name, fields))
    }
}

impl Registry {
    /// Registers every record of `def`, in order.
    pub fn load(&mut self, def: RegistryDef) -> Result<(), CompileError> {
        for record in def.records {
            self.register(record.into_schema()?)?;
        }
        Ok(())
    }

    /// Parses a JSON [RegistryDef] and registers its records.
    pub fn load_json(&mut self, json: &str) -> Result<(), CompileError> {
        let def: RegistryDef = serde_json::from_str(json)?;
        self.load(def)
    }
}
