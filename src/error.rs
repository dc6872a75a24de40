use std::io;

use thiserror::Error;

use crate::printer::Escaped;

/// Bytes that could not be turned into a header or a value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Header {section} truncated at byte {offset}: expected {expected} bytes, got {observed}")]
    TruncatedHeader {
        section: &'static str,
        offset: u64,
        expected: usize,
        observed: usize,
    },

    #[error("Record {row}, field {column} ({name}) truncated at byte {offset}: expected {expected} bytes, got {observed}")]
    TruncatedField {
        row: u32,
        column: usize,
        name: String,
        offset: u64,
        expected: usize,
        observed: usize,
    },

    #[error("Unknown logical value in record {row}, field {column} ({name}): '{}' ({} bytes)", Escaped(.raw), .raw.len())]
    InvalidLogical {
        row: u32,
        column: usize,
        name: String,
        raw: Vec<u8>,
    },

    #[error("Invalid field type '{tag}' in record {row}, field {column} ({name})")]
    UnsupportedFieldType {
        row: u32,
        column: usize,
        name: String,
        tag: char,
    },

    #[error("Field {column} out of range, table has {field_count} fields")]
    ColumnOutOfRange { column: usize, field_count: usize },
}

/// Caller misuse of the column schema.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Invalid length {length} for field {name}")]
    InvalidFieldLength { name: String, length: i32 },

    #[error("Undefined field type {tag} for column {name}")]
    UnknownFieldType { name: String, tag: char },

    #[error("Wrong number of fields {observed} expected {expected}")]
    FieldCountMismatch { expected: usize, observed: usize },

    #[error("Could not find a field named '{name}'")]
    ColumnNotFound { name: String },

    #[error("Field {name} makes the record {record_length} bytes and the header {header_length} bytes, both are limited to 65535")]
    RecordTooLong {
        name: String,
        record_length: usize,
        header_length: usize,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
