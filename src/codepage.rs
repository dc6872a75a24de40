//! Language driver bytes and the text encodings they stand for.

use std::borrow::Cow;

use encoding_rs::{CoderResult, Encoding, EUC_KR, WINDOWS_1252};
use oem_cp::code_table::{DECODING_TABLE_CP_MAP, ENCODING_TABLE_CP_MAP};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Charset used when a file carries no recognized language driver byte.
pub const DEFAULT_ENCODING: &str = "ISO-8859-1";

/// Language driver byte written for encodings that have no table entry.
pub const DEFAULT_LANGUAGE_DRIVER: u8 = 0x00;

/// Language driver byte -> canonical charset label.
/// When several bytes share a label, the first one wins on reverse lookup.
pub static CODE_PAGES: &[(u8, &str)] = &[
    (0x01, "IBM437"),       // U.S. MS-DOS
    (0x02, "IBM850"),       // International MS-DOS
    (0x03, "windows-1252"), // Windows ANSI
    (0x04, "macintosh"),    // Standard Macintosh
    (0x08, "IBM865"),       // Danish OEM
    (0x09, "IBM437"),       // Dutch OEM
    (0x0A, "IBM850"),       // Dutch OEM (secondary)
    (0x0B, "IBM437"),       // Finnish OEM
    (0x0D, "IBM437"),       // French OEM
    (0x0E, "IBM850"),       // French OEM (secondary)
    (0x0F, "IBM437"),       // German OEM
    (0x10, "IBM850"),       // German OEM (secondary)
    (0x11, "IBM437"),       // Italian OEM
    (0x12, "IBM850"),       // Italian OEM (secondary)
    (0x13, "Shift_JIS"),    // Japanese Shift-JIS
    (0x14, "IBM850"),       // Spanish OEM (secondary)
    (0x15, "IBM437"),       // Swedish OEM
    (0x16, "IBM850"),       // Swedish OEM (secondary)
    (0x17, "IBM865"),       // Norwegian OEM
    (0x18, "IBM437"),       // Spanish OEM
    (0x19, "IBM437"),       // English OEM (Britain)
    (0x1A, "IBM850"),       // English OEM (Britain, secondary)
    (0x1B, "IBM437"),       // English OEM (U.S.)
    (0x1C, "IBM863"),       // French OEM (Canada)
    (0x1D, "IBM850"),       // French OEM (secondary)
    (0x1F, "IBM852"),       // Czech OEM
    (0x22, "IBM852"),       // Hungarian OEM
    (0x23, "IBM852"),       // Polish OEM
    (0x24, "IBM860"),       // Portuguese OEM
    (0x25, "IBM850"),       // Portuguese OEM (secondary)
    (0x26, "IBM866"),       // Russian OEM
    (0x37, "IBM850"),       // English OEM (U.S., secondary)
    (0x40, "IBM852"),       // Romanian OEM
    (0x4D, "GBK"),          // Chinese GBK (PRC)
    (0x4E, "EUC-KR"),       // Korean (ANSI/OEM)
    (0x4F, "MS949"),        // Korean Windows
    (0x50, "TIS-620"),      // Thai (ANSI/OEM)
    (0x57, "ISO-8859-1"),   // ANSI, no explicit code page
    (0x58, "windows-1252"), // Western European ANSI
    (0x59, "windows-1252"), // Spanish ANSI
    (0x64, "IBM852"),       // Eastern European MS-DOS
    (0x65, "IBM866"),       // Russian MS-DOS
    (0x66, "IBM865"),       // Nordic MS-DOS
    (0x67, "IBM861"),       // Icelandic MS-DOS
    (0x6A, "IBM737"),       // Greek MS-DOS (437G)
    (0x6B, "IBM857"),       // Turkish MS-DOS
    (0x6C, "IBM863"),       // French-Canadian MS-DOS
    (0x78, "Big5"),         // Taiwan Big 5
    (0x79, "EUC-KR"),       // Hangul (Wansung)
    (0x7A, "GBK"),          // PRC GBK
    (0x7B, "Shift_JIS"),    // Japanese Shift-JIS
    (0x7C, "windows-874"),  // Thai Windows/MS-DOS
    (0x7D, "windows-1255"), // Hebrew Windows
    (0x7E, "windows-1256"), // Arabic Windows
    (0x86, "IBM737"),       // Greek OEM
    (0x87, "IBM852"),       // Slovenian OEM
    (0x88, "IBM857"),       // Turkish OEM
    (0x96, "x-mac-cyrillic"), // Russian Macintosh
    (0x97, "x-mac-ce"),     // Eastern European Macintosh
    (0x98, "x-mac-greek"),  // Greek Macintosh
    (0xC8, "windows-1250"), // Eastern European Windows
    (0xC9, "windows-1251"), // Russian Windows
    (0xCA, "windows-1254"), // Turkish Windows
    (0xCB, "windows-1253"), // Greek Windows
    (0xCC, "windows-1257"), // Baltic Windows
];

/// Returns the charset label registered for a language driver byte.
pub fn lookup(language_driver: u8) -> Option<&'static str> {
    CODE_PAGES
        .iter()
        .find(|(id, _)| *id == language_driver)
        .map(|(_, label)| *label)
}

/// Returns the first language driver byte registered for a charset label.
/// Label comparison ignores ASCII case.
pub fn reverse_lookup(label: &str) -> Option<u8> {
    CODE_PAGES
        .iter()
        .find(|(_, known)| known.eq_ignore_ascii_case(label.trim()))
        .map(|(id, _)| *id)
}

/// Single-byte DOS code pages decoded through `oem_cp` tables.
const OEM_CODE_PAGES: &[(&str, u16)] = &[
    ("IBM437", 437),
    ("IBM737", 737),
    ("IBM850", 850),
    ("IBM852", 852),
    ("IBM857", 857),
    ("IBM860", 860),
    ("IBM861", 861),
    ("IBM863", 863),
    ("IBM865", 865),
];

/// A resolved text codec for field names and character data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextCodec {
    Standard(&'static Encoding),
    Oem { label: &'static str, code_page: u16 },
}

impl From<&'static Encoding> for TextCodec {
    fn from(encoding: &'static Encoding) -> TextCodec {
        TextCodec::Standard(encoding)
    }
}

impl TextCodec {
    /// Finds the codec for a charset label, if one is available.
    pub fn lookup(label: &str) -> Option<TextCodec> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("MS949") {
            return Some(TextCodec::Standard(EUC_KR));
        }
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            return Some(TextCodec::Standard(encoding));
        }
        let (label, code_page) = *OEM_CODE_PAGES
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(label))?;
        DECODING_TABLE_CP_MAP.get(&code_page)?;
        Some(TextCodec::Oem { label, code_page })
    }

    /// Like [`TextCodec::lookup`], but labels without a codec are read as
    /// windows-1252, which agrees with them on the ASCII range.
    pub fn for_label(label: &str) -> TextCodec {
        match TextCodec::lookup(label) {
            Some(codec) => codec,
            None => {
                log::warn!(
                    "No decoder for encoding {}, falling back to windows-1252",
                    label.trim()
                );
                TextCodec::Standard(WINDOWS_1252)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextCodec::Standard(encoding) => encoding.name(),
            TextCodec::Oem { label, .. } => *label,
        }
    }

    /// Decodes `bytes` into `out`, replacing its previous contents.
    /// A fresh decoder is used per call so no partial state leaks between fields.
    pub fn decode_into(&self, bytes: &[u8], out: &mut String) {
        out.clear();
        let encoding = match *self {
            TextCodec::Standard(encoding) => encoding,
            TextCodec::Oem { code_page, .. } => match DECODING_TABLE_CP_MAP.get(&code_page) {
                Some(table) => {
                    out.push_str(&table.decode_string_lossy(bytes));
                    return;
                }
                None => WINDOWS_1252,
            },
        };
        let mut decoder = encoding.new_decoder_without_bom_handling();
        let mut input = bytes;
        loop {
            let needed = decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or_else(|| input.len() * 3 + 16);
            out.reserve(needed);
            let (result, read, _) = decoder.decode_to_string(input, out, true);
            input = &input[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    /// Appends the encoded form of one character. Characters the codec
    /// cannot represent become `?`.
    pub fn encode_char(&self, c: char, out: &mut Vec<u8>) {
        match *self {
            TextCodec::Standard(encoding) => {
                let mut utf8 = [0u8; 4];
                let (bytes, _, had_errors) = encoding.encode(c.encode_utf8(&mut utf8));
                if had_errors {
                    out.push(b'?');
                } else {
                    out.extend_from_slice(&bytes);
                }
            }
            TextCodec::Oem { code_page, .. } => {
                if c.is_ascii() {
                    out.push(c as u8);
                    return;
                }
                let byte = ENCODING_TABLE_CP_MAP
                    .get(&code_page)
                    .and_then(|table| table.get(&c))
                    .copied();
                out.push(byte.unwrap_or(b'?'));
            }
        }
    }

    /// Encodes as many leading characters of `s` as fit into `max_bytes`
    /// without splitting a multi-byte sequence. Returns the number of bytes
    /// of `s` (UTF-8) that were consumed.
    pub fn encode_bounded(&self, s: &str, max_bytes: usize, out: &mut Vec<u8>) -> usize {
        let start = out.len();
        let mut scratch = Vec::with_capacity(4);
        for (i, c) in s.char_indices() {
            scratch.clear();
            self.encode_char(c, &mut scratch);
            if out.len() - start + scratch.len() > max_bytes {
                return i;
            }
            out.extend_from_slice(&scratch);
        }
        s.len()
    }
}

/// The text encoding of a table, together with the language driver byte
/// that identifies it in the header.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "StoredCodePage", into = "StoredCodePage"))]
pub struct CodePage {
    language_driver: u8,
    label: Cow<'static, str>,
    codec: TextCodec,
}

impl CodePage {
    fn new(language_driver: u8, label: Cow<'static, str>) -> CodePage {
        let codec = TextCodec::for_label(&label);
        CodePage {
            language_driver,
            label,
            codec,
        }
    }

    /// Resolves a header byte. Unknown bytes fall back to [`DEFAULT_ENCODING`].
    pub fn from_language_driver(language_driver: u8) -> CodePage {
        match lookup(language_driver) {
            Some(label) => CodePage::new(language_driver, Cow::Borrowed(label)),
            None => {
                if language_driver != DEFAULT_LANGUAGE_DRIVER {
                    log::debug!(
                        "Unknown language driver 0x{:02x}, using {}",
                        language_driver,
                        DEFAULT_ENCODING
                    );
                }
                CodePage::default()
            }
        }
    }

    /// Builds a code page from a charset label, picking the language driver byte
    /// by reverse lookup.
    pub fn for_label(label: &str) -> CodePage {
        let label = label.trim();
        let language_driver = reverse_lookup(label).unwrap_or(DEFAULT_LANGUAGE_DRIVER);
        CodePage::new(language_driver, Cow::Owned(label.to_owned()))
    }

    pub fn language_driver(&self) -> u8 {
        self.language_driver
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The decoder/encoder used for this code page's text.
    pub fn codec(&self) -> TextCodec {
        self.codec
    }
}

impl Default for CodePage {
    fn default() -> Self {
        let language_driver = reverse_lookup(DEFAULT_ENCODING).unwrap_or(DEFAULT_LANGUAGE_DRIVER);
        CodePage::new(language_driver, Cow::Borrowed(DEFAULT_ENCODING))
    }
}

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct StoredCodePage {
    language_driver: u8,
    label: String,
}

#[cfg(feature = "serde")]
impl From<StoredCodePage> for CodePage {
    fn from(stored: StoredCodePage) -> CodePage {
        CodePage::new(stored.language_driver, Cow::Owned(stored.label))
    }
}

#[cfg(feature = "serde")]
impl From<CodePage> for StoredCodePage {
    fn from(code_page: CodePage) -> StoredCodePage {
        StoredCodePage {
            language_driver: code_page.language_driver,
            label: code_page.label.into_owned(),
        }
    }
}
