//! # bytecraft
//!
//! A declarative binary layout engine. A record type is an ordered list of
//! fields; each field carries a directive list (skip bytes, open a condition,
//! emit the value, repeat it) whose lengths, counts and predicates may depend on
//! fields read earlier. The same schema reads a record from a byte stream and
//! writes it back byte for byte.
//!
//! Multi-byte values are little-endian. A condition, once opened, spans every
//! remaining directive of its field; directives before it are unconditional.
//!
//! ## Example
//!
//! ```
//! use bytecraft::field::{Field, FieldType, Length, RecordSchema};
//! use bytecraft::schema::Registry;
//! use bytecraft::value::Value;
//!
//! let mut registry = Registry::new();
//! registry
//!     .register(RecordSchema::new(
//!         "Message",
//!         vec![
//!             Field::new("x", FieldType::F64).skip(Length::Fixed(4)).emit(),
//!             Field::new("count", FieldType::I32).skip(Length::Fixed(8)).emit(),
//!             Field::new("msg", FieldType::String)
//!                 .with_length(Length::Fixed(32))
//!                 .emit(),
//!         ],
//!     ))
//!     .unwrap();
//!
//! let mut data = vec![0u8; 4];
//! data.extend_from_slice(&123.456f64.to_le_bytes());
//! data.extend_from_slice(&[0u8; 8]);
//! data.extend_from_slice(&2i32.to_le_bytes());
//! let mut msg = b"Test Message".to_vec();
//! msg.resize(32, 0);
//! data.extend_from_slice(&msg);
//!
//! let record = registry.read_slice("Message", &data).unwrap();
//! assert_eq!(record.get("x"), Some(&Value::F64(123.456)));
//! assert_eq!(record.get("count"), Some(&Value::I32(2)));
//! assert_eq!(record.get("msg"), Some(&Value::from("Test Message")));
//! assert_eq!(record.actual_size(), 56);
//!
//! assert_eq!(registry.write_vec("Message", &record).unwrap(), data);
//! ```

pub mod codec;
pub mod compiled;
mod engine;
pub mod errors;
mod exec;
pub mod field;
mod resolve;
pub mod schema;
#[cfg(feature = "serde")]
pub mod serde;
pub mod stream;
pub mod value;
