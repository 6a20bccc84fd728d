// src/data/metadata.rs

//! Implements [`RawRecord`] and [`DecodedMetadata`], and the total
//! (never-failing) metadata blob decoder.
//!
//! A metadata blob is one of two serialization dialects, distinguished by
//! its first character:
//!
//! * `{` — a JSON document (newer MediaWiki-style exports),
//! * `a` — a PHP `serialize()` array, `a:<count>:{…}` (legacy exports).
//!
//! Anything else, and any structurally broken blob, decodes to "no data".
//!
//! [`RawRecord`]: self::RawRecord
//! [`DecodedMetadata`]: self::DecodedMetadata

use crate::common::FPath;

use std::collections::BTreeMap;

#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RawRecord
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One source-dump entry, as captured by the
/// [`DumpReader`]. Both fields are already SQL-unescaped.
///
/// [`DumpReader`]: crate::readers::dumpreader::DumpReader
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawRecord {
    /// database file name, e.g. `Great_Wave_off_Kanagawa.jpg`
    pub filename: FPath,
    /// serialized metadata blob; may be empty
    pub metadata_blob: String,
}

impl RawRecord {
    pub fn new(
        filename: FPath,
        metadata_blob: String,
    ) -> RawRecord {
        RawRecord {
            filename,
            metadata_blob,
        }
    }
}

/// Strip SQL string escapes from a captured column value.
///
/// A backslash followed by any character is a literal escape, never a
/// terminator. The common MySQL mnemonics map to their control characters;
/// any other escaped character maps to itself.
pub fn unescape_sql(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('Z') => out.push('\x1A'),
            Some(other) => out.push(other),
            // trailing lone backslash
            None => out.push('\\'),
        }
    }

    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DecodedMetadata
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// mapping of field name to [`MetaValue`]
pub type FieldMap = BTreeMap<String, MetaValue>;

/// a decoded metadata value; scalar values of either dialect are carried
/// as their string form
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MetaValue {
    Str(String),
    Map(FieldMap),
}

impl MetaValue {
    /// the value as a string, if it is a scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s.as_str()),
            MetaValue::Map(_) => None,
        }
    }
}

/// key whose nested sub-mapping, when present, becomes the effective
/// field mapping
const KEY_EXIF: &str = "exif";

/// top-level keys marking a record as error-classified
const KEY_ERROR1: &str = "_error";
const KEY_ERROR2: &str = "errors";

/// The structured field mapping decoded from a [`RawRecord`] metadata blob.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedMetadata {
    /// the effective field mapping (the nested `exif` sub-mapping when the
    /// document has one, the top-level mapping otherwise)
    pub fields: FieldMap,
    /// was a top-level `_error` or `errors` key present?
    pub error_marked: bool,
}

impl DecodedMetadata {
    /// top-level scalar field value, trimmed; `None` for absent or
    /// nested values
    pub fn field_str(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|v| v.as_str())
            .map(|s| s.trim())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// decode dispatch on the blob's first character
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeAttempt {
    /// blob begins with `{`
    JsonLike,
    /// blob begins with the PHP `serialize()` array tag `a`
    LegacySerialized,
    /// anything else; always "no data"
    Unrecognized,
}

impl DecodeAttempt {
    pub fn discriminant(blob: &str) -> DecodeAttempt {
        match blob.chars().next() {
            Some('{') => DecodeAttempt::JsonLike,
            Some('a') => DecodeAttempt::LegacySerialized,
            _ => DecodeAttempt::Unrecognized,
        }
    }
}

/// Decode a metadata blob into a [`DecodedMetadata`].
///
/// Decoding is total: for any input, including random bytes, this returns
/// a mapping or `None`; it never panics and never propagates a
/// deserialization error.
pub fn decode_metadata(blob: &str) -> Option<DecodedMetadata> {
    defn!("(blob len {})", blob.len());
    let top: FieldMap = match DecodeAttempt::discriminant(blob) {
        DecodeAttempt::JsonLike => decode_json(blob)?,
        DecodeAttempt::LegacySerialized => decode_php(blob)?,
        DecodeAttempt::Unrecognized => {
            defx!("unrecognized discriminant; no data");
            return None;
        }
    };
    let error_marked: bool = top.contains_key(KEY_ERROR1) || top.contains_key(KEY_ERROR2);
    let fields: FieldMap = match top.get(KEY_EXIF) {
        Some(MetaValue::Map(exif)) => exif.clone(),
        _ => top,
    };
    defx!("{} fields, error_marked {}", fields.len(), error_marked);

    Some(DecodedMetadata {
        fields,
        error_marked,
    })
}

/// JSON dialect: the document must be an object.
fn decode_json(blob: &str) -> Option<FieldMap> {
    let value: serde_json::Value = match serde_json::from_str(blob) {
        Ok(val) => val,
        Err(_err) => {
            defñ!("serde_json::from_str failed ({}); no data", _err);
            return None;
        }
    };
    match json_to_metavalue(value) {
        MetaValue::Map(map) => Some(map),
        MetaValue::Str(_) => None,
    }
}

/// JSON value to [`MetaValue`]. Scalars become their string form; arrays
/// become maps keyed by element index.
fn json_to_metavalue(value: serde_json::Value) -> MetaValue {
    match value {
        serde_json::Value::Null => MetaValue::Str(String::new()),
        serde_json::Value::Bool(b) => MetaValue::Str(b.to_string()),
        serde_json::Value::Number(n) => MetaValue::Str(n.to_string()),
        serde_json::Value::String(s) => MetaValue::Str(s),
        serde_json::Value::Array(elems) => {
            let mut map = FieldMap::new();
            for (index, elem) in elems.into_iter().enumerate() {
                map.insert(index.to_string(), json_to_metavalue(elem));
            }
            MetaValue::Map(map)
        }
        serde_json::Value::Object(obj) => {
            let mut map = FieldMap::new();
            for (key, val) in obj.into_iter() {
                map.insert(key, json_to_metavalue(val));
            }
            MetaValue::Map(map)
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PHP serialize() dialect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Legacy dialect: PHP `serialize()` output, top-level must be an array.
///
/// Supported tags: `a` (array), `s` (string), `i` (integer), `d` (double),
/// `b` (boolean), `N` (null). `s` lengths are byte lengths.
fn decode_php(blob: &str) -> Option<FieldMap> {
    let mut parser = PhpParser::new(blob.as_bytes());
    let value: MetaValue = parser.parse_value()?;
    match value {
        MetaValue::Map(map) => Some(map),
        MetaValue::Str(_) => None,
    }
}

struct PhpParser<'a> {
    data: &'a [u8],
    at: usize,
}

impl<'a> PhpParser<'a> {
    fn new(data: &'a [u8]) -> PhpParser<'a> {
        PhpParser { data, at: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.at).copied()
    }

    fn expect(
        &mut self,
        byte: u8,
    ) -> Option<()> {
        if self.peek()? != byte {
            return None;
        }
        self.at += 1;

        Some(())
    }

    /// ASCII run up to (not including) `stop`; consumes the `stop` byte
    fn take_until(
        &mut self,
        stop: u8,
    ) -> Option<&'a str> {
        let begin: usize = self.at;
        while self.peek()? != stop {
            self.at += 1;
        }
        let run: &[u8] = &self.data[begin..self.at];
        self.at += 1;

        std::str::from_utf8(run).ok()
    }

    fn parse_usize_until(
        &mut self,
        stop: u8,
    ) -> Option<usize> {
        self.take_until(stop)?.parse::<usize>().ok()
    }

    fn parse_value(&mut self) -> Option<MetaValue> {
        match self.peek()? {
            b'a' => self.parse_array(),
            b's' => self.parse_string().map(MetaValue::Str),
            b'i' => {
                self.at += 1;
                self.expect(b':')?;
                let n: &str = self.take_until(b';')?;
                n.parse::<i64>().ok()?;
                Some(MetaValue::Str(n.to_string()))
            }
            b'd' => {
                self.at += 1;
                self.expect(b':')?;
                let n: &str = self.take_until(b';')?;
                n.parse::<f64>().ok()?;
                Some(MetaValue::Str(n.to_string()))
            }
            b'b' => {
                self.at += 1;
                self.expect(b':')?;
                let b: &str = self.take_until(b';')?;
                match b {
                    "0" => Some(MetaValue::Str(String::from("false"))),
                    "1" => Some(MetaValue::Str(String::from("true"))),
                    _ => None,
                }
            }
            b'N' => {
                self.at += 1;
                self.expect(b';')?;
                Some(MetaValue::Str(String::new()))
            }
            _ => None,
        }
    }

    /// `s:<len>:"<bytes>";`
    fn parse_string(&mut self) -> Option<String> {
        self.expect(b's')?;
        self.expect(b':')?;
        let len: usize = self.parse_usize_until(b':')?;
        self.expect(b'"')?;
        // a declared length can be anything up to usize::MAX; the sum must
        // not overflow
        let end: usize = self
            .at
            .checked_add(len)
            .filter(|end| *end <= self.data.len())?;
        let bytes: &[u8] = &self.data[self.at..end];
        self.at = end;
        self.expect(b'"')?;
        self.expect(b';')?;

        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// `a:<count>:{<key><value>…}` — no trailing `;`
    fn parse_array(&mut self) -> Option<MetaValue> {
        self.expect(b'a')?;
        self.expect(b':')?;
        let count: usize = self.parse_usize_until(b':')?;
        self.expect(b'{')?;
        let mut map = FieldMap::new();
        for _ in 0..count {
            let key: String = match self.peek()? {
                b's' => self.parse_string()?,
                b'i' => {
                    self.at += 1;
                    self.expect(b':')?;
                    let n: &str = self.take_until(b';')?;
                    n.parse::<i64>().ok()?;
                    n.to_string()
                }
                _ => return None,
            };
            let value: MetaValue = self.parse_value()?;
            map.insert(key, value);
        }
        self.expect(b'}')?;

        Some(MetaValue::Map(map))
    }
}
