//! Dumps a table as delimited text.

use core::fmt::Write as _;
use std::io::{self, Read, Seek, Write};

use csv_core::WriteResult;

use crate::error::Result;
use crate::reader::DbfReader;

const OUT_BUFFER_SIZE: usize = 1024;

/// Streams fields through a `csv_core::Writer` into an `io::Write` sink.
pub struct CsvSink<W> {
    inner: csv_core::Writer,
    sink: W,
    out_buffer: Vec<u8>,
    fields_in_record: usize,
    records_written: u64,
}

impl<W: Write> CsvSink<W> {
    pub fn new(sink: W, delim: u8) -> CsvSink<W> {
        CsvSink::from_core(csv_core::WriterBuilder::new().delimiter(delim).build(), sink)
    }

    pub fn from_core(writer: csv_core::Writer, sink: W) -> CsvSink<W> {
        CsvSink {
            inner: writer,
            sink,
            out_buffer: vec![0; OUT_BUFFER_SIZE],
            fields_in_record: 0,
            records_written: 0,
        }
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn write_field(&mut self, mut field: &[u8]) -> io::Result<()> {
        if self.fields_in_record > 0 {
            loop {
                let (res, bytes_out) = self.inner.delimiter(&mut self.out_buffer);
                self.sink.write_all(&self.out_buffer[..bytes_out])?;
                if res == WriteResult::InputEmpty {
                    break;
                }
            }
        }
        loop {
            let (res, bytes_in, bytes_out) = self.inner.field(field, &mut self.out_buffer);
            field = &field[bytes_in..];
            self.sink.write_all(&self.out_buffer[..bytes_out])?;
            if res == WriteResult::InputEmpty {
                break;
            }
        }
        self.fields_in_record += 1;
        Ok(())
    }

    pub fn end_record(&mut self) -> io::Result<()> {
        loop {
            let (res, bytes_out) = self.inner.terminator(&mut self.out_buffer);
            self.sink.write_all(&self.out_buffer[..bytes_out])?;
            if res == WriteResult::InputEmpty {
                break;
            }
        }
        self.fields_in_record = 0;
        self.records_written += 1;
        Ok(())
    }

    /// Flushes pending quote state and hands back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        loop {
            let (res, bytes_out) = self.inner.finish(&mut self.out_buffer);
            self.sink.write_all(&self.out_buffer[..bytes_out])?;
            if res == WriteResult::InputEmpty {
                break;
            }
        }
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Writes a header line of field names followed by every record.
/// Null values become empty fields. Returns the number of data records written.
pub fn write_csv<R, W>(reader: &mut DbfReader<R>, sink: W, delim: u8) -> Result<u64>
where
    R: Read + Seek,
    W: Write,
{
    let mut csv = CsvSink::new(sink, delim);
    let names: Vec<String> = reader
        .header()
        .fields()
        .iter()
        .map(|f| f.name().to_owned())
        .collect();
    for name in &names {
        csv.write_field(name.as_bytes())?;
    }
    csv.end_record()?;

    let mut text = String::new();
    for row in reader.rows() {
        for value in row? {
            text.clear();
            let _ = write!(text, "{}", value);
            csv.write_field(text.as_bytes())?;
        }
        csv.end_record()?;
    }
    let written = csv.records_written() - 1;
    csv.finish()?;
    Ok(written)
}
