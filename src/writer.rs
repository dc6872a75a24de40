use core::fmt::Write as _;
use std::io::{Seek, SeekFrom, Write};

use chrono::{Datelike, NaiveDate};

use crate::codepage::TextCodec;
use crate::error::{Result, SchemaError};
use crate::header::{FieldDescriptor, FieldType, Header};
use crate::Value;

/// Optional trailer byte some dBase consumers expect.
pub const END_OF_FILE: u8 = 0x1A;

const RECORD_ACTIVE: u8 = b' ';
const DATE_LENGTH: usize = 8;
const RECORD_COUNT_OFFSET: u64 = 4;

/// Settings applied when creating a table.
#[derive(Clone, Debug)]
pub struct WriterOptions {
    encoding: Option<String>,
    write_eof_marker: bool,
    update_record_count: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            encoding: None,
            write_eof_marker: false,
            update_record_count: true,
        }
    }
}

impl WriterOptions {
    pub fn new() -> WriterOptions {
        WriterOptions::default()
    }

    /// Charset for record text. Defaults to the header's encoding.
    pub fn encoding(mut self, label: impl Into<String>) -> WriterOptions {
        self.encoding = Some(label.into());
        self
    }

    /// Append the 0x1A end-of-file byte on close.
    pub fn write_eof_marker(mut self, yes: bool) -> WriterOptions {
        self.write_eof_marker = yes;
        self
    }

    /// Rewrite the header's record count on close.
    pub fn update_record_count(mut self, yes: bool) -> WriterOptions {
        self.update_record_count = yes;
        self
    }
}

/// Turns values into fixed-width field bytes.
pub struct FieldFormatter {
    codec: TextCodec,
    scratch: String,
}

impl FieldFormatter {
    pub fn new(codec: TextCodec) -> FieldFormatter {
        FieldFormatter {
            codec,
            scratch: String::with_capacity(255),
        }
    }

    /// Left-aligned text padded with spaces to `size` bytes. Text that does not
    /// fit is cut at a character boundary.
    pub fn format_character(&self, size: usize, s: &str, out: &mut Vec<u8>) {
        let start = out.len();
        self.codec.encode_bounded(s, size, out);
        out.resize(start + size, b' ');
    }

    pub fn format_logical(value: Option<bool>) -> u8 {
        match value {
            Some(true) => b'T',
            _ => b'F',
        }
    }

    /// Right-justified number with exactly `decimals` fractional digits and no
    /// grouping. Output longer than `size` keeps its leading characters.
    pub fn format_number(&mut self, size: usize, decimals: usize, value: &Value, out: &mut Vec<u8>) {
        self.scratch.clear();
        // Writing into a String cannot fail.
        let _ = match value {
            Value::Integer(n) => write_integer(&mut self.scratch, i64::from(*n), decimals),
            Value::Long(n) => write_integer(&mut self.scratch, *n, decimals),
            Value::Double(n) => write!(self.scratch, "{:.*}", decimals, n),
            _ => write_integer(&mut self.scratch, 0, decimals),
        };

        let text = self.scratch.as_bytes();
        if text.len() >= size {
            out.extend_from_slice(&text[..size]);
        } else {
            out.resize(out.len() + size - text.len(), b' ');
            out.extend_from_slice(text);
        }
    }

    /// `YYYYMMDD`, or eight spaces for a missing date.
    pub fn format_date(&mut self, value: Option<NaiveDate>, out: &mut Vec<u8>) {
        match value {
            Some(date) => {
                self.scratch.clear();
                let _ = write!(
                    self.scratch,
                    "{:04}{:02}{:02}",
                    date.year(),
                    date.month(),
                    date.day()
                );
                out.extend_from_slice(self.scratch.as_bytes());
            }
            None => out.extend_from_slice(&[b' '; DATE_LENGTH]),
        }
    }

    /// Appends the bytes of `value` as stored in `field`.
    pub fn format_value(
        &mut self,
        field: &FieldDescriptor,
        value: &Value,
        out: &mut Vec<u8>,
    ) -> core::result::Result<(), SchemaError> {
        let size = usize::from(field.length());
        match field.field_type() {
            FieldType::Character | FieldType::Memo | FieldType::General => {
                self.scratch.clear();
                let _ = write!(self.scratch, "{}", value);
                let text = core::mem::take(&mut self.scratch);
                self.format_character(size, &text, out);
                self.scratch = text;
            }
            FieldType::Logical => {
                let logical = match value {
                    Value::Logical(b) => Some(*b),
                    Value::Null => None,
                    other => {
                        log::warn!("Non-logical value {:?} for field {}, writing F", other, field.name());
                        None
                    }
                };
                out.push(FieldFormatter::format_logical(logical));
            }
            FieldType::Number if field.decimal_count() == 0 => {
                self.format_number(size, 0, value, out)
            }
            FieldType::Number | FieldType::Float => {
                self.format_number(size, usize::from(field.decimal_count()), value, out)
            }
            FieldType::Date => {
                let date = match value {
                    Value::Date(d) => Some(*d),
                    _ => None,
                };
                self.format_date(date, out)
            }
            FieldType::Other(tag) => {
                return Err(SchemaError::UnknownFieldType {
                    name: field.name().to_owned(),
                    tag: tag as char,
                })
            }
        }
        Ok(())
    }
}

fn write_integer(out: &mut String, n: i64, decimals: usize) -> core::fmt::Result {
    write!(out, "{}", n)?;
    if decimals > 0 {
        out.push('.');
        for _ in 0..decimals {
            out.push('0');
        }
    }
    Ok(())
}

/// Appends records to a new table.
///
/// The header is written when the writer is created and must not change
/// afterwards, so the writer takes ownership of it.
pub struct DbfWriter<W: Write + Seek> {
    sink: W,
    header: Header,
    formatter: FieldFormatter,
    record: Vec<u8>,
    options: WriterOptions,
    start: u64,
}

impl<W: Write + Seek> DbfWriter<W> {
    pub fn new(header: Header, sink: W) -> Result<DbfWriter<W>> {
        DbfWriter::with_options(header, sink, WriterOptions::default())
    }

    /// Writes `header` to the sink's current position.
    pub fn with_options(mut header: Header, mut sink: W, options: WriterOptions) -> Result<DbfWriter<W>> {
        header.relayout()?;
        let start = sink.stream_position()?;
        header.encode(&mut sink)?;
        // From here on the in-memory count tracks rows actually appended.
        header.set_record_count(0);

        let codec = match &options.encoding {
            Some(label) => TextCodec::for_label(label),
            None => header.code_page().codec(),
        };
        log::debug!(
            "Writing table: {} fields, record length {}, encoding {}",
            header.field_count(),
            header.record_length(),
            codec.name()
        );
        let record = Vec::with_capacity(usize::from(header.record_length()));
        Ok(DbfWriter {
            sink,
            header,
            formatter: FieldFormatter::new(codec),
            record,
            options,
            start,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn records_written(&self) -> u32 {
        self.header.record_count()
    }

    /// Appends one record. On error nothing reaches the sink.
    pub fn write_record(&mut self, values: &[Value]) -> Result<()> {
        let expected = self.header.field_count();
        if values.len() != expected {
            return Err(SchemaError::FieldCountMismatch {
                expected,
                observed: values.len(),
            }
            .into());
        }

        self.record.clear();
        self.record.push(RECORD_ACTIVE);
        for (field, value) in self.header.fields().iter().zip(values) {
            let start = self.record.len();
            let size = usize::from(field.length());
            self.formatter.format_value(field, value, &mut self.record)?;
            if self.record.len() - start != size {
                log::debug!(
                    "Formatted {} bytes for field {} of length {}, writing zeros",
                    self.record.len() - start,
                    field.name(),
                    size
                );
                self.record.truncate(start);
                self.record.resize(start + size, 0);
            }
        }

        self.sink.write_all(&self.record)?;
        let count = self.header.record_count() + 1;
        self.header.set_record_count(count);
        Ok(())
    }

    /// Flushes and returns the sink, after the optional end-of-file byte and
    /// record count update.
    pub fn close(mut self) -> Result<W> {
        if self.options.write_eof_marker {
            self.sink.write_all(&[END_OF_FILE])?;
        }
        if self.options.update_record_count {
            let end = self.sink.stream_position()?;
            self.sink
                .seek(SeekFrom::Start(self.start + RECORD_COUNT_OFFSET))?;
            self.sink
                .write_all(&self.header.record_count().to_le_bytes())?;
            self.sink.seek(SeekFrom::Start(end))?;
        }
        self.sink.flush()?;
        Ok(self.sink)
    }
}
