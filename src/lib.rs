//! Reading and writing of dBase III (`.dbf`) table files.
//!
//! A [`Header`] is either decoded from an existing file by [`DbfReader`] or
//! built column by column and handed to [`DbfWriter`], which writes it before
//! the first record.

use core::fmt;

use chrono::NaiveDate;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod codepage;
pub mod csv;
pub mod error;
pub mod header;
mod printer;
pub mod reader;
pub mod writer;

pub use codepage::{CodePage, TextCodec};
pub use error::{DecodeError, Error, Result, SchemaError};
pub use header::{FieldDescriptor, FieldType, Header};
pub use reader::{DbfReader, ReaderOptions};
pub use writer::{DbfWriter, FieldFormatter, WriterOptions};

/// A typed field value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Null,
    Logical(bool),
    Character(String),
    Integer(i32),
    Long(i64),
    Double(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Logical(b) => write!(f, "{}", b),
            Value::Character(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Logical(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Character(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Character(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
