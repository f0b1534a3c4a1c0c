//! Byte-level codecs for field types.
//!
//! Every fixed-width type has one entry in a static dispatch table holding its
//! width and a `decode`/`encode` function pair. Strings and blobs have no fixed
//! width; they are coded into a slot whose length is resolved at run time.
//!
//! All multi-byte values are little-endian.

use crate::{
    field::FieldType,
    value::{Record, Value},
};

/// Codec for a fixed-width type.
#[derive(Debug)]
pub struct Codec {
    /// Width in bytes of one encoded value.
    pub width: usize,
    /// Decodes exactly `width` bytes.
    pub decode: fn(&[u8]) -> Value,
    /// Encodes into exactly `width` bytes. `None` if the value has the wrong shape or range.
    pub encode: fn(&Value, &mut [u8]) -> Option<()>,
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

macro_rules! number_codec {
    ($name:ident, $t:ty, $variant:ident) => {
        static $name: Codec = Codec {
            width: size_of::<$t>(),
            decode: |bytes| Value::$variant(<$t>::from_le_bytes(array(bytes))),
            encode: |value, out| {
                let Value::$variant(v) = value else {
                    return None;
                };
                out.copy_from_slice(&v.to_le_bytes());
                Some(())
            },
        };
    };
}

number_codec!(I8, i8, I8);
number_codec!(U8, u8, U8);
number_codec!(I16, i16, I16);
number_codec!(U16, u16, U16);
number_codec!(I32, i32, I32);
number_codec!(U32, u32, U32);
number_codec!(I64, i64, I64);
number_codec!(U64, u64, U64);
number_codec!(F32, f32, F32);
number_codec!(F64, f64, F64);

static BOOL: Codec = Codec {
    width: 1,
    decode: |bytes| Value::Bool(bytes[0] != 0),
    encode: |value, out| {
        let Value::Bool(v) = value else {
            return None;
        };
        out[0] = u8::from(*v);
        Some(())
    },
};

// Lone surrogates have no `char`; they decode to U+FFFD.
static CHAR16: Codec = Codec {
    width: 2,
    decode: |bytes| {
        let unit = u16::from_le_bytes(array(bytes));
        Value::Char(char::from_u32(unit.into()).unwrap_or(char::REPLACEMENT_CHARACTER))
    },
    encode: |value, out| {
        let Value::Char(c) = value else {
            return None;
        };
        let unit = u16::try_from(u32::from(*c)).ok()?;
        out.copy_from_slice(&unit.to_le_bytes());
        Some(())
    },
};

impl FieldType {
    /// Looks up the codec of a fixed-width type. `None` for strings, blobs,
    /// records and sequences.
    pub fn codec(&self) -> Option<&'static Codec> {
        let codec = match self {
            FieldType::Bool => &BOOL,
            FieldType::I8 => &I8,
            FieldType::U8 => &U8,
            FieldType::I16 => &I16,
            FieldType::U16 => &U16,
            FieldType::I32 => &I32,
            FieldType::U32 => &U32,
            FieldType::I64 => &I64,
            FieldType::U64 => &U64,
            FieldType::F32 => &F32,
            FieldType::F64 => &F64,
            FieldType::Char16 => &CHAR16,
            FieldType::String
            | FieldType::Bytes
            | FieldType::Record(_)
            | FieldType::Sequence(_) => return None,
        };
        Some(codec)
    }

    /// Fixed width in bytes, if the type has one.
    pub fn width(&self) -> Option<usize> {
        self.codec().map(|codec| codec.width)
    }

    /// Zero value of a type without registry access. Records are built by the
    /// caller because their zero value depends on the nested schema.
    pub(crate) fn zero_scalar(&self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(false),
            FieldType::I8 => Value::I8(0),
            FieldType::U8 => Value::U8(0),
            FieldType::I16 => Value::I16(0),
            FieldType::U16 => Value::U16(0),
            FieldType::I32 => Value::I32(0),
            FieldType::U32 => Value::U32(0),
            FieldType::I64 => Value::I64(0),
            FieldType::U64 => Value::U64(0),
            FieldType::F32 => Value::F32(0.0),
            FieldType::F64 => Value::F64(0.0),
            FieldType::Char16 => Value::Char('\0'),
            FieldType::String => Value::String(String::new()),
            FieldType::Bytes => Value::Bytes(Vec::new()),
            FieldType::Record(_) => Value::Record(Record::new()),
            FieldType::Sequence(_) => Value::Seq(Vec::new()),
        }
    }
}

/// Decodes one slot of `ty`. `None` for records and sequences, which have no codec.
pub fn decode(ty: &FieldType, bytes: &[u8]) -> Option<Value> {
    match ty {
        FieldType::String => Some(Value::String(decode_string(bytes))),
        FieldType::Bytes => Some(Value::Bytes(bytes.to_vec())),
        other => other.codec().map(|codec| (codec.decode)(bytes)),
    }
}

/// Encodes `value` into `slot`, which is sized to the resolved length. `None`
/// if the value does not fit the type.
pub fn encode(ty: &FieldType, value: &Value, slot: &mut [u8]) -> Option<()> {
    match ty {
        FieldType::String => fill_slot(value.as_str()?.as_bytes(), slot),
        FieldType::Bytes => fill_slot(value.as_bytes()?, slot),
        other => return (other.codec()?.encode)(value, slot),
    }
    Some(())
}

/// Decodes a fixed-length string slot: UTF-8 with trailing NULs removed.
/// Embedded NULs are kept. Invalid UTF-8 sequences become U+FFFD.
pub fn decode_string(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Copies `src` into `slot`, truncating or zero-padding to the slot length.
pub fn fill_slot(src: &[u8], slot: &mut [u8]) {
    let n = src.len().min(slot.len());
    slot[..n].copy_from_slice(&src[..n]);
    slot[n..].fill(0);
}
