use core::fmt;
use std::convert::TryFrom;
use std::io::{Read, Write};

use chrono::{Datelike, Local, NaiveDate};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::codepage::CodePage;
use crate::error::{DecodeError, Result, SchemaError};

/// File type tag of a dBase III table without memo.
pub const MAGIC: u8 = 0x03;
/// Header length of a table without fields: 32-byte prologue and the terminator.
pub const MINIMUM_HEADER: u16 = 33;
pub const FIELD_DESCRIPTOR_SIZE: usize = 32;
/// Ends the field descriptor array.
pub const FIELD_TERMINATOR: u8 = 0x0D;

const PROLOGUE_SIZE: usize = 32;
const FIELD_NAME_SIZE: usize = 11;
const MAX_FIELD_NAME_BYTES: usize = 10;
const RESERVED_PROLOGUE: usize = 17;
const RESERVED_DESCRIPTOR: usize = 14;
const DATE_LENGTH: u8 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldType {
    Character,
    Number,
    Float,
    Logical,
    Date,
    /// Memo reference, kept as opaque text.
    Memo,
    /// OLE reference, kept as opaque text.
    General,
    /// Any other tag found in an existing file.
    Other(u8),
}

impl FieldType {
    /// Interprets an on-disk tag. Lowercase letters are accepted.
    pub fn from_tag(tag: u8) -> FieldType {
        match tag.to_ascii_uppercase() {
            b'C' => FieldType::Character,
            b'N' => FieldType::Number,
            b'F' => FieldType::Float,
            b'L' => FieldType::Logical,
            b'D' => FieldType::Date,
            b'M' => FieldType::Memo,
            b'G' => FieldType::General,
            _ => FieldType::Other(tag),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            FieldType::Character => b'C',
            FieldType::Number => b'N',
            FieldType::Float => b'F',
            FieldType::Logical => b'L',
            FieldType::Date => b'D',
            FieldType::Memo => b'M',
            FieldType::General => b'G',
            FieldType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}

/// One column of the table.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldDescriptor {
    name: String,
    field_type: FieldType,
    length: u8,
    decimal_count: u8,
    data_address: u32,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Width of the field in bytes.
    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn decimal_count(&self) -> u8 {
        self.decimal_count
    }

    /// Offset of the field inside a record, counting the deletion marker.
    pub fn data_address(&self) -> u32 {
        self.data_address
    }
}

/// A soft problem found while resolving a column definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnWarning {
    /// The length exceeds what dBase III readers accept; it is kept.
    NonConformantLength { requested: i32, max: i32 },
    /// The type dictates a fixed length; the requested one was replaced.
    LengthForced { requested: i32, forced: u8 },
    /// `S` was requested and read as `C`.
    LegacyStringAlias,
    DecimalCountClamped { requested: i32, clamped: u8 },
}

impl fmt::Display for ColumnWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColumnWarning::NonConformantLength { requested, max } => write!(
                f,
                "length {} is longer than {}, not consistent with dBase III; preserving it",
                requested, max
            ),
            ColumnWarning::LengthForced { requested, forced } => {
                write!(f, "length {} replaced by {}", requested, forced)
            }
            ColumnWarning::LegacyStringAlias => {
                write!(f, "type S is not a dBase type, storing as C")
            }
            ColumnWarning::DecimalCountClamped { requested, clamped } => {
                write!(f, "decimal count {} clamped to {}", requested, clamped)
            }
        }
    }
}

/// Outcome of [`resolve_column`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub field_type: FieldType,
    pub length: u8,
    pub decimal_count: u8,
    pub warnings: Vec<ColumnWarning>,
}

fn checked_length(name: &str, length: i32) -> core::result::Result<u8, SchemaError> {
    if length > i32::from(u8::MAX) {
        return Err(SchemaError::InvalidFieldLength {
            name: name.to_owned(),
            length,
        });
    }
    Ok(length as u8)
}

fn clamp_decimals(length: u8, decimal_count: i32, warnings: &mut Vec<ColumnWarning>) -> u8 {
    let max = i32::from(length) - 1;
    if decimal_count < 0 {
        warnings.push(ColumnWarning::DecimalCountClamped {
            requested: decimal_count,
            clamped: 0,
        });
        0
    } else if decimal_count > max {
        warnings.push(ColumnWarning::DecimalCountClamped {
            requested: decimal_count,
            clamped: max as u8,
        });
        max as u8
    } else {
        decimal_count as u8
    }
}

fn forced_length(requested: i32, forced: u8, warnings: &mut Vec<ColumnWarning>) -> u8 {
    if requested != i32::from(forced) {
        warnings.push(ColumnWarning::LengthForced { requested, forced });
    }
    forced
}

/// Applies the per-type length and decimal rules to a requested column.
/// Pure: nothing is logged and no header is touched.
pub fn resolve_column(
    name: &str,
    type_tag: char,
    length: i32,
    decimal_count: i32,
) -> core::result::Result<ResolvedColumn, SchemaError> {
    if length <= 0 {
        return Err(SchemaError::InvalidFieldLength {
            name: name.to_owned(),
            length,
        });
    }
    let mut warnings = Vec::new();
    let (field_type, length, decimal_count) = match type_tag {
        'C' | 'c' => {
            let length = checked_length(name, length)?;
            if length > 254 {
                warnings.push(ColumnWarning::NonConformantLength {
                    requested: i32::from(length),
                    max: 254,
                });
            }
            (FieldType::Character, length, 0)
        }
        'S' | 's' => {
            warnings.push(ColumnWarning::LegacyStringAlias);
            if length > 254 {
                warnings.push(ColumnWarning::NonConformantLength {
                    requested: length,
                    max: 254,
                });
            }
            (FieldType::Character, forced_length(length, 8, &mut warnings), 0)
        }
        'D' | 'd' => (
            FieldType::Date,
            forced_length(length, DATE_LENGTH, &mut warnings),
            0,
        ),
        'F' | 'f' => {
            let length = checked_length(name, length)?;
            if length > 20 {
                warnings.push(ColumnWarning::NonConformantLength {
                    requested: i32::from(length),
                    max: 20,
                });
            }
            let decimal_count = clamp_decimals(length, decimal_count, &mut warnings);
            (FieldType::Float, length, decimal_count)
        }
        'N' | 'n' => {
            let length = checked_length(name, length)?;
            if length > 18 {
                warnings.push(ColumnWarning::NonConformantLength {
                    requested: i32::from(length),
                    max: 18,
                });
            }
            let decimal_count = clamp_decimals(length, decimal_count, &mut warnings);
            (FieldType::Number, length, decimal_count)
        }
        'L' | 'l' => (
            FieldType::Logical,
            forced_length(length, 1, &mut warnings),
            0,
        ),
        other => {
            return Err(SchemaError::UnknownFieldType {
                name: name.to_owned(),
                tag: other,
            })
        }
    };
    Ok(ResolvedColumn {
        field_type,
        length,
        decimal_count,
        warnings,
    })
}

/// The structural description of a table file.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    record_count: u32,
    record_length: u16,
    header_length: u16,
    last_update: NaiveDate,
    code_page: CodePage,
    fields: Vec<FieldDescriptor>,
    largest_field_size: u8,
}

impl Default for Header {
    fn default() -> Self {
        Header::new()
    }
}

impl Header {
    /// An empty header in the default encoding.
    pub fn new() -> Header {
        Header {
            record_count: 0,
            record_length: 1,
            header_length: MINIMUM_HEADER,
            last_update: Local::now().date_naive(),
            code_page: CodePage::default(),
            fields: Vec::new(),
            largest_field_size: 0,
        }
    }

    /// An empty header whose text is stored in the named charset.
    pub fn with_encoding(label: &str) -> Header {
        let mut header = Header::new();
        header.set_encoding(label);
        header
    }

    pub fn set_encoding(&mut self, label: &str) {
        self.code_page = CodePage::for_label(label);
    }

    pub fn code_page(&self) -> &CodePage {
        &self.code_page
    }

    /// Label of the charset used for names and character data.
    pub fn encoding(&self) -> &str {
        self.code_page.label()
    }

    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    pub fn set_record_count(&mut self, record_count: u32) {
        self.record_count = record_count;
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn record_length(&self) -> u16 {
        self.record_length
    }

    pub fn header_length(&self) -> u16 {
        self.header_length
    }

    pub fn last_update(&self) -> NaiveDate {
        self.last_update
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn largest_field_size(&self) -> u8 {
        self.largest_field_size
    }

    /// Position of the field with the given name, ignoring case and
    /// surrounding whitespace.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.fields
            .iter()
            .position(|field| field.name.trim().to_lowercase() == wanted)
    }

    /// Appends a column. Names longer than ten encoded bytes are truncated.
    pub fn add_column(
        &mut self,
        name: &str,
        type_tag: char,
        length: i32,
        decimal_count: i32,
    ) -> Result<()> {
        let resolved = resolve_column(name, type_tag, length, decimal_count)?;
        for warning in &resolved.warnings {
            log::warn!("Field {}: {}", name, warning);
        }

        let name = if name.is_empty() { "NoName" } else { name };
        let mut encoded = Vec::with_capacity(MAX_FIELD_NAME_BYTES);
        let kept = self
            .code_page
            .codec()
            .encode_bounded(name, MAX_FIELD_NAME_BYTES, &mut encoded);
        if kept < name.len() {
            log::warn!(
                "Field name {} is longer than {} bytes, truncating to {}",
                name,
                MAX_FIELD_NAME_BYTES,
                &name[..kept]
            );
        }

        let (record_length, header_length) = layout_lengths(
            self.fields
                .iter()
                .map(|f| f.length)
                .chain(Some(resolved.length)),
        );
        if !layout_fits(record_length, header_length) {
            return Err(SchemaError::RecordTooLong {
                name: name[..kept].to_owned(),
                record_length,
                header_length,
            }
            .into());
        }

        self.fields.push(FieldDescriptor {
            name: name[..kept].to_owned(),
            field_type: resolved.field_type,
            length: resolved.length,
            decimal_count: resolved.decimal_count,
            data_address: 0,
        });
        self.relayout()?;
        Ok(())
    }

    /// Removes the column with the given name and returns its former index.
    pub fn remove_column(&mut self, name: &str) -> Result<usize> {
        let index = self
            .field_index(name)
            .ok_or_else(|| SchemaError::ColumnNotFound {
                name: name.to_owned(),
            })?;
        self.fields.remove(index);
        self.relayout()?;
        Ok(index)
    }

    /// Recomputes data addresses, record length and header length from the
    /// field list.
    pub(crate) fn relayout(&mut self) -> core::result::Result<(), SchemaError> {
        let (record_length, header_length) = self.checked_lengths()?;
        let mut address: u32 = 1;
        let mut largest = 0;
        for field in &mut self.fields {
            field.data_address = address;
            address += u32::from(field.length);
            largest = largest.max(field.length);
        }
        self.record_length = record_length;
        self.header_length = header_length;
        self.largest_field_size = largest;
        Ok(())
    }

    fn checked_lengths(&self) -> core::result::Result<(u16, u16), SchemaError> {
        let (record_length, header_length) = layout_lengths(self.fields.iter().map(|f| f.length));
        match (u16::try_from(record_length), u16::try_from(header_length)) {
            (Ok(record), Ok(header)) => Ok((record, header)),
            _ => Err(SchemaError::RecordTooLong {
                name: self
                    .fields
                    .last()
                    .map(|f| f.name.clone())
                    .unwrap_or_default(),
                record_length,
                header_length,
            }),
        }
    }

    /// Reads a header from the start of `source`.
    ///
    /// With `forced_encoding`, the language driver byte is ignored and the given
    /// charset is used for every text value.
    pub fn decode<R: Read>(source: &mut R, forced_encoding: Option<&str>) -> Result<Header> {
        let mut prologue = [0u8; PROLOGUE_SIZE];
        read_section(source, &mut prologue, "prologue", 0)?;

        if prologue[0] != MAGIC {
            log::warn!("Unsupported DBF file type 0x{:02x}", prologue[0]);
        }
        let last_update = stamp_date(prologue[1], prologue[2], prologue[3]);
        let record_count = u32::from_le_bytes([prologue[4], prologue[5], prologue[6], prologue[7]]);
        let header_length = u16::from_le_bytes([prologue[8], prologue[9]]);
        let record_length = u16::from_le_bytes([prologue[10], prologue[11]]);
        let language_driver = prologue[12 + RESERVED_PROLOGUE];

        let code_page = match forced_encoding {
            Some(label) => CodePage::for_label(label),
            None => CodePage::from_language_driver(language_driver),
        };
        let codec = code_page.codec();

        let field_count = usize::from(header_length).saturating_sub(PROLOGUE_SIZE + 1)
            / FIELD_DESCRIPTOR_SIZE;
        let mut descriptors = vec![0u8; field_count * FIELD_DESCRIPTOR_SIZE + 1];
        read_section(
            source,
            &mut descriptors,
            "field descriptors",
            PROLOGUE_SIZE as u64,
        )?;

        let mut fields = Vec::with_capacity(field_count);
        let mut name = String::new();
        for raw in descriptors.chunks_exact(FIELD_DESCRIPTOR_SIZE) {
            let name_bytes = &raw[..FIELD_NAME_SIZE];
            let name_end = name_bytes
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(FIELD_NAME_SIZE);
            codec.decode_into(&name_bytes[..name_end], &mut name);
            let length = raw[16];
            let field = FieldDescriptor {
                name: name.trim().to_owned(),
                field_type: FieldType::from_tag(raw[11]),
                length,
                decimal_count: raw[17],
                data_address: 0,
            };
            // Some broken producers write zero-length attributes; skip them.
            if length == 0 {
                log::warn!("Dropping zero-length field {}", field.name);
                continue;
            }
            fields.push(field);
        }

        let mut header = Header {
            record_count,
            record_length,
            header_length,
            last_update,
            code_page,
            fields,
            largest_field_size: 0,
        };
        let mut address = 1;
        for field in &mut header.fields {
            field.data_address = address;
            address += u32::from(field.length);
            header.largest_field_size = header.largest_field_size.max(field.length);
        }
        Ok(header)
    }

    /// Writes the header stamped with today's date.
    pub fn encode<W: Write>(&self, sink: &mut W) -> Result<()> {
        self.encode_dated(sink, Local::now().date_naive())
    }

    /// Writes the header stamped with `today`. The whole header is assembled
    /// in memory and handed to the sink in one piece.
    pub fn encode_dated<W: Write>(&self, sink: &mut W, today: NaiveDate) -> Result<()> {
        let bytes = self.to_bytes(today)?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    pub(crate) fn to_bytes(&self, today: NaiveDate) -> core::result::Result<Vec<u8>, SchemaError> {
        let (record_length, header_length) = self.checked_lengths()?;
        let codec = self.code_page.codec();

        let mut buf = Vec::with_capacity(usize::from(header_length));
        buf.push(MAGIC);
        buf.push((today.year().rem_euclid(100)) as u8);
        buf.push(today.month() as u8);
        buf.push(today.day() as u8);
        buf.extend_from_slice(&self.record_count.to_le_bytes());
        buf.extend_from_slice(&header_length.to_le_bytes());
        buf.extend_from_slice(&record_length.to_le_bytes());
        buf.extend_from_slice(&[0u8; RESERVED_PROLOGUE]);
        buf.push(self.code_page.language_driver());
        buf.extend_from_slice(&[0u8; 2]);

        let mut address: u32 = 1;
        for field in &self.fields {
            let start = buf.len();
            codec.encode_bounded(&field.name, FIELD_NAME_SIZE, &mut buf);
            buf.resize(start + FIELD_NAME_SIZE, 0);
            buf.push(field.field_type.tag());
            buf.extend_from_slice(&address.to_le_bytes());
            address += u32::from(field.length);
            buf.push(field.length);
            buf.push(field.decimal_count);
            buf.extend_from_slice(&[0u8; RESERVED_DESCRIPTOR]);
        }
        buf.push(FIELD_TERMINATOR);
        debug_assert_eq!(buf.len(), usize::from(header_length));
        Ok(buf)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "DB3 Header")?;
        writeln!(f, "Date : {}", self.last_update)?;
        writeln!(f, "Records : {}", self.record_count)?;
        writeln!(f, "Fields : {}", self.fields.len())?;
        writeln!(f, "Encoding : {}", self.code_page.label())?;
        for field in &self.fields {
            writeln!(
                f,
                "{} {} {} {} {}",
                field.name, field.field_type, field.length, field.decimal_count, field.data_address
            )?;
        }
        Ok(())
    }
}

/// Two-digit year stamps pivot at 90.
/// Record length (with the deletion marker) and header length for fields of
/// the given lengths.
fn layout_lengths(lengths: impl Iterator<Item = u8>) -> (usize, usize) {
    let mut count = 0;
    let mut record_length = 1;
    for length in lengths {
        count += 1;
        record_length += usize::from(length);
    }
    (
        record_length,
        usize::from(MINIMUM_HEADER) + FIELD_DESCRIPTOR_SIZE * count,
    )
}

fn layout_fits(record_length: usize, header_length: usize) -> bool {
    record_length <= usize::from(u16::MAX) && header_length <= usize::from(u16::MAX)
}

fn stamp_date(year: u8, month: u8, day: u8) -> NaiveDate {
    let year = if year > 90 {
        1900 + i32::from(year)
    } else {
        2000 + i32::from(year)
    };
    let month = u32::from(month);
    let day = u32::from(day);
    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| {
            log::debug!("Invalid last update stamp {}-{}-{}", year, month, day);
            NaiveDate::from_ymd_opt(year, month.max(1).min(12), 1)
        })
        .unwrap_or(NaiveDate::MIN)
}

/// Fills `buf` from `source`, reporting how much was available on a short read.
pub(crate) fn read_fully<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_section<R: Read>(
    source: &mut R,
    buf: &mut [u8],
    section: &'static str,
    offset: u64,
) -> Result<()> {
    let observed = read_fully(source, buf)?;
    if observed < buf.len() {
        return Err(DecodeError::TruncatedHeader {
            section,
            offset,
            expected: buf.len(),
            observed,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codepage;
    use crate::Error;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn resolve_character() {
        let col = resolve_column("A", 'c', 300, 4).unwrap_err();
        assert_eq!(
            col,
            SchemaError::InvalidFieldLength {
                name: "A".into(),
                length: 300
            }
        );
        let col = resolve_column("A", 'C', 255, 4).unwrap();
        assert_eq!(col.field_type, FieldType::Character);
        assert_eq!(col.length, 255);
        assert_eq!(col.decimal_count, 0);
        assert_eq!(
            col.warnings,
            vec![ColumnWarning::NonConformantLength {
                requested: 255,
                max: 254
            }]
        );
        assert!(resolve_column("A", 'C', 254, 0).unwrap().warnings.is_empty());
    }

    #[test]
    fn resolve_legacy_string() {
        let col = resolve_column("A", 's', 20, 0).unwrap();
        assert_eq!(col.field_type, FieldType::Character);
        assert_eq!(col.length, 8);
        assert_eq!(
            col.warnings,
            vec![
                ColumnWarning::LegacyStringAlias,
                ColumnWarning::LengthForced {
                    requested: 20,
                    forced: 8
                }
            ]
        );
        let col = resolve_column("A", 'S', 8, 0).unwrap();
        assert_eq!(col.warnings, vec![ColumnWarning::LegacyStringAlias]);
    }

    #[test]
    fn resolve_date_and_logical() {
        let col = resolve_column("A", 'd', 10, 3).unwrap();
        assert_eq!((col.field_type, col.length, col.decimal_count), (FieldType::Date, 8, 0));
        assert_eq!(col.warnings.len(), 1);
        assert!(resolve_column("A", 'D', 8, 0).unwrap().warnings.is_empty());

        let col = resolve_column("A", 'l', 5, 0).unwrap();
        assert_eq!((col.field_type, col.length), (FieldType::Logical, 1));
        assert_eq!(
            col.warnings,
            vec![ColumnWarning::LengthForced {
                requested: 5,
                forced: 1
            }]
        );
        assert!(resolve_column("A", 'L', 1, 0).unwrap().warnings.is_empty());
    }

    #[test]
    fn resolve_float() {
        let col = resolve_column("A", 'f', 24, 5).unwrap();
        assert_eq!((col.field_type, col.length, col.decimal_count), (FieldType::Float, 24, 5));
        assert_eq!(
            col.warnings,
            vec![ColumnWarning::NonConformantLength {
                requested: 24,
                max: 20
            }]
        );
        assert!(resolve_column("A", 'F', 20, 5).unwrap().warnings.is_empty());
    }

    #[test]
    fn resolve_number_clamps_decimals() {
        let col = resolve_column("A", 'n', 19, 2).unwrap();
        assert_eq!((col.field_type, col.length, col.decimal_count), (FieldType::Number, 19, 2));
        assert_eq!(col.warnings.len(), 1);

        let col = resolve_column("A", 'N', 5, -3).unwrap();
        assert_eq!(col.decimal_count, 0);
        assert_eq!(
            col.warnings,
            vec![ColumnWarning::DecimalCountClamped {
                requested: -3,
                clamped: 0
            }]
        );

        let col = resolve_column("A", 'N', 5, 9).unwrap();
        assert_eq!(col.decimal_count, 4);
    }

    #[test]
    fn resolve_rejects_bad_input() {
        assert!(matches!(
            resolve_column("A", 'N', 0, 0),
            Err(SchemaError::InvalidFieldLength { length: 0, .. })
        ));
        assert!(matches!(
            resolve_column("A", 'C', -1, 0),
            Err(SchemaError::InvalidFieldLength { length: -1, .. })
        ));
        assert!(matches!(
            resolve_column("A", 'X', 4, 0),
            Err(SchemaError::UnknownFieldType { tag: 'X', .. })
        ));
    }

    #[test]
    fn add_and_remove_keep_layout() {
        let mut header = Header::new();
        header.add_column("ID", 'N', 9, 0).unwrap();
        header.add_column("NAME", 'C', 20, 0).unwrap();
        header.add_column("BORN", 'D', 8, 0).unwrap();
        assert_eq!(header.record_length(), 1 + 9 + 20 + 8);
        assert_eq!(header.header_length(), 33 + 32 * 3);
        let addresses: Vec<u32> = header.fields().iter().map(|f| f.data_address()).collect();
        assert_eq!(addresses, vec![1, 10, 30]);
        assert_eq!(header.largest_field_size(), 20);

        assert_eq!(header.remove_column(" name ").unwrap(), 1);
        assert_eq!(header.record_length(), 1 + 9 + 8);
        assert_eq!(header.header_length(), 33 + 32 * 2);
        assert_eq!(header.fields()[1].data_address(), 10);

        match header.remove_column("missing") {
            Err(Error::Schema(SchemaError::ColumnNotFound { name })) => assert_eq!(name, "missing"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn record_length_must_fit_sixteen_bits() {
        let mut header = Header::new();
        for i in 0..256 {
            header.add_column(&format!("F{}", i), 'C', 255, 0).unwrap();
        }
        assert_eq!(header.record_length(), 1 + 256 * 255);

        match header.add_column("F256", 'C', 255, 0) {
            Err(Error::Schema(SchemaError::RecordTooLong {
                name,
                record_length,
                ..
            })) => {
                assert_eq!(name, "F256");
                assert_eq!(record_length, 1 + 257 * 255);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(header.field_count(), 256);
        assert_eq!(header.record_length(), 1 + 256 * 255);

        header.add_column("LAST", 'C', 254, 0).unwrap();
        assert_eq!(header.record_length(), u16::MAX);
        let bytes = header.to_bytes(today()).unwrap();
        let decoded = Header::decode(&mut &bytes[..], None).unwrap();
        assert_eq!(decoded.record_length(), u16::MAX);
        assert_eq!(decoded.field_count(), 257);
    }

    #[test]
    fn default_language_driver_comes_from_the_table() {
        let bytes = Header::new().to_bytes(today()).unwrap();
        assert_eq!(Some(bytes[29]), codepage::reverse_lookup(codepage::DEFAULT_ENCODING));
        assert_eq!(
            bytes[29],
            Header::with_encoding("ISO-8859-1").to_bytes(today()).unwrap()[29]
        );
    }

    #[test]
    fn long_names_are_truncated() {
        let mut header = Header::new();
        header.add_column("DESCRIPTION_LONG", 'C', 4, 0).unwrap();
        assert_eq!(header.fields()[0].name(), "DESCRIPTIO");
    }

    #[test]
    fn empty_header_layout() {
        let header = Header::new();
        let bytes = header.to_bytes(today()).unwrap();
        assert_eq!(bytes.len(), 33);
        assert_eq!(&bytes[..4], &[MAGIC, 24, 3, 9]);
        assert_eq!(&bytes[8..10], &33u16.to_le_bytes());
        assert_eq!(&bytes[10..12], &1u16.to_le_bytes());
        assert_eq!(bytes[32], FIELD_TERMINATOR);
    }

    #[test]
    fn descriptor_layout() {
        let mut header = Header::new();
        header.add_column("NAME", 'C', 10, 0).unwrap();
        header.add_column("AGE", 'N', 5, 0).unwrap();
        header.set_record_count(7);
        let bytes = header.to_bytes(today()).unwrap();
        assert_eq!(bytes.len(), 97);
        assert_eq!(&bytes[4..8], &7u32.to_le_bytes());
        assert_eq!(&bytes[32..43], b"NAME\0\0\0\0\0\0\0");
        assert_eq!(bytes[43], b'C');
        assert_eq!(&bytes[44..48], &1u32.to_le_bytes());
        assert_eq!(bytes[48], 10);
        assert_eq!(&bytes[64..75], b"AGE\0\0\0\0\0\0\0\0");
        assert_eq!(bytes[75], b'N');
        assert_eq!(&bytes[76..80], &11u32.to_le_bytes());
        assert_eq!(bytes[80], 5);
        assert_eq!(bytes[96], FIELD_TERMINATOR);
    }

    #[test]
    fn pivot_year() {
        assert_eq!(stamp_date(91, 1, 2), NaiveDate::from_ymd_opt(1991, 1, 2).unwrap());
        assert_eq!(stamp_date(90, 1, 2), NaiveDate::from_ymd_opt(2090, 1, 2).unwrap());
        assert_eq!(stamp_date(24, 2, 30), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn decode_reads_unsigned_lengths() {
        let mut header = Header::new();
        header.add_column("WIDE", 'C', 200, 0).unwrap();
        let bytes = header.to_bytes(today()).unwrap();
        let decoded = Header::decode(&mut &bytes[..], None).unwrap();
        assert_eq!(decoded.fields()[0].length(), 200);
        assert_eq!(decoded.record_length(), 201);
    }

    #[test]
    fn decode_tolerates_foreign_magic() {
        let mut bytes = Header::new().to_bytes(today()).unwrap();
        bytes[0] = 0x83;
        let decoded = Header::decode(&mut &bytes[..], None).unwrap();
        assert_eq!(decoded.field_count(), 0);
        assert_eq!(decoded.last_update(), today());
    }

    #[test]
    fn decode_short_input() {
        let bytes = [MAGIC, 24, 1, 1, 0, 0];
        match Header::decode(&mut &bytes[..], None) {
            Err(Error::Decode(DecodeError::TruncatedHeader {
                expected, observed, ..
            })) => {
                assert_eq!(expected, 32);
                assert_eq!(observed, 6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn forced_encoding_wins() {
        let mut header = Header::with_encoding("windows-1251");
        header.add_column("A", 'C', 1, 0).unwrap();
        let bytes = header.to_bytes(today()).unwrap();
        assert_eq!(bytes[29], 0xC9);
        let decoded = Header::decode(&mut &bytes[..], Some("windows-1250")).unwrap();
        assert_eq!(decoded.encoding(), "windows-1250");
        assert_eq!(decoded.code_page().language_driver(), 0xC8);
    }
}
