use std::io::{Read, Seek, SeekFrom};

use chrono::NaiveDate;

use crate::codepage::TextCodec;
use crate::error::{DecodeError, Result};
use crate::header::{read_fully, FieldType, Header};
use crate::Value;

/// Settings applied when opening a table for reading.
#[derive(Clone, Debug, Default)]
pub struct ReaderOptions {
    forced_encoding: Option<String>,
}

impl ReaderOptions {
    pub fn new() -> ReaderOptions {
        ReaderOptions::default()
    }

    /// Decode text with this charset instead of the one named by the header.
    pub fn forced_encoding(mut self, label: impl Into<String>) -> ReaderOptions {
        self.forced_encoding = Some(label.into());
        self
    }
}

/// Random access to the records of a table.
///
/// The reader owns its decode scratch space, so a single reader must not be
/// shared between threads without external locking.
pub struct DbfReader<R> {
    source: R,
    header: Header,
    codec: TextCodec,
    raw: Vec<u8>,
    text: String,
}

impl<R: Read + Seek> DbfReader<R> {
    pub fn new(source: R) -> Result<DbfReader<R>> {
        DbfReader::with_options(source, &ReaderOptions::default())
    }

    /// Decodes the header at the start of `source`.
    pub fn with_options(mut source: R, options: &ReaderOptions) -> Result<DbfReader<R>> {
        source.seek(SeekFrom::Start(0))?;
        let header = Header::decode(&mut source, options.forced_encoding.as_deref())?;
        log::debug!(
            "Opened table: {} fields, {} records, encoding {}",
            header.field_count(),
            header.record_count(),
            header.encoding()
        );
        let codec = header.code_page().codec();
        let capacity = usize::from(header.largest_field_size());
        Ok(DbfReader {
            source,
            header,
            codec,
            raw: Vec::with_capacity(capacity),
            text: String::with_capacity(capacity),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn record_count(&self) -> u32 {
        self.header.record_count()
    }

    pub fn field_count(&self) -> usize {
        self.header.field_count()
    }

    fn record_offset(&self, row: u32) -> u64 {
        u64::from(self.header.header_length())
            + u64::from(row) * u64::from(self.header.record_length())
    }

    /// Reads the deletion marker of a record. Deleted records are still
    /// returned by the other read methods.
    pub fn is_deleted(&mut self, row: u32) -> Result<bool> {
        let offset = self.record_offset(row);
        self.source.seek(SeekFrom::Start(offset))?;
        let mut marker = [0u8; 1];
        if read_fully(&mut self.source, &mut marker)? == 0 {
            return Err(DecodeError::TruncatedField {
                row,
                column: 0,
                name: String::from("<deletion marker>"),
                offset,
                expected: 1,
                observed: 0,
            }
            .into());
        }
        Ok(marker[0] != b' ')
    }

    /// Decodes field `column` of record `row`, both 0-based.
    pub fn field_value(&mut self, row: u32, column: usize) -> Result<Value> {
        let field = match self.header.field(column) {
            Some(field) => field,
            None => {
                return Err(DecodeError::ColumnOutOfRange {
                    column,
                    field_count: self.header.field_count(),
                }
                .into())
            }
        };
        let length = usize::from(field.length());
        if length == 0 {
            return Ok(Value::Null);
        }
        let offset = self.record_offset(row) + u64::from(field.data_address());

        self.raw.clear();
        self.raw.resize(length, 0);
        self.source.seek(SeekFrom::Start(offset))?;
        let observed = read_fully(&mut self.source, &mut self.raw)?;
        if observed < length {
            return Err(DecodeError::TruncatedField {
                row,
                column,
                name: field.name().to_owned(),
                offset,
                expected: length,
                observed,
            }
            .into());
        }
        self.codec.decode_into(&self.raw, &mut self.text);

        let value = match field.field_type() {
            FieldType::Logical => match self.text.chars().next() {
                Some('t') | Some('T') | Some('y') | Some('Y') => Value::Logical(true),
                Some('f') | Some('F') | Some('n') | Some('N') => Value::Logical(false),
                _ => {
                    return Err(DecodeError::InvalidLogical {
                        row,
                        column,
                        name: field.name().to_owned(),
                        raw: self.raw.clone(),
                    }
                    .into())
                }
            },
            FieldType::Character => Value::Character(trim_character(&self.text).to_owned()),
            FieldType::Date => parse_date(&self.text),
            FieldType::Number if field.decimal_count() == 0 => parse_integer(&self.text),
            FieldType::Number | FieldType::Float => parse_double(&self.text),
            other => {
                return Err(DecodeError::UnsupportedFieldType {
                    row,
                    column,
                    name: field.name().to_owned(),
                    tag: other.tag() as char,
                }
                .into())
            }
        };
        Ok(value)
    }

    /// All values of a record, in field order.
    pub fn read_row(&mut self, row: u32) -> Result<Vec<Value>> {
        (0..self.field_count())
            .map(|column| self.field_value(row, column))
            .collect()
    }

    /// Iterates over every record the header announces.
    pub fn rows(&mut self) -> Rows<'_, R> {
        let end = self.record_count();
        Rows {
            reader: self,
            next: 0,
            end,
        }
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

pub struct Rows<'a, R> {
    reader: &'a mut DbfReader<R>,
    next: u32,
    end: u32,
}

impl<'a, R: Read + Seek> Iterator for Rows<'a, R> {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let row = self.next;
        self.next += 1;
        Some(self.reader.read_row(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

fn trim_character(text: &str) -> &str {
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
}

fn parse_date(text: &str) -> Value {
    if text == "00000000" {
        return Value::Null;
    }
    let year = match text.get(0..4) {
        Some(year) if !year.trim().is_empty() => year,
        _ => return Value::Null,
    };
    let month = text.get(4..6);
    let day = text.get(6..8);
    let parsed = match (year.parse::<i32>(), month.map(str::parse::<u32>), day.map(str::parse::<u32>)) {
        (Ok(year), Some(Ok(month)), Some(Ok(day))) => NaiveDate::from_ymd_opt(year, month, day),
        _ => None,
    };
    match parsed {
        Some(date) => Value::Date(date),
        None => {
            log::warn!("There was an error parsing a date, ignoring it: {:?}", text);
            Value::Null
        }
    }
}

fn parse_integer(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<i32>() {
        return Value::Integer(n);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Long(n);
    }
    parse_double(text)
}

fn parse_double(text: &str) -> Value {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(n) => Value::Double(n),
        Err(_) => {
            log::warn!("Unparseable numeric value, 0.0 used: {:?}", trimmed);
            Value::Double(0.0)
        }
    }
}
