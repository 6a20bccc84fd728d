// src/data/producer.rs

//! Implements [`ProducerKey`] classification: assign each decoded record to
//! a semantically meaningful bucket representing the device, software tool,
//! error condition, or bare field-name signature that likely produced its
//! metadata.
//!
//! Precedence, first match wins: `errors/*` > `software/*` >
//! `device/<make>/<model>` > `tags/*`.
//!
//! Classification is a pure function of `(filename, DecodedMetadata)`;
//! identical inputs always yield the identical key. The sole piece of
//! run-global state is the error ordinal that keeps `errors/*` keys unique
//! for repeated filenames.
//!
//! [`ProducerKey`]: self::ProducerKey

use crate::common::Count;
use crate::data::metadata::DecodedMetadata;

use ::md5::{Digest, Md5};
use ::phf::phf_set;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// tunable constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// field names longer than this are dropped before classification
pub const FIELD_NAME_LEN_MAX: usize = 50;

/// generic sanitized segment length cap
pub const SEGMENT_LEN_MAX: usize = 100;

/// sanitized make/model segment length cap
pub const DEVICE_SEGMENT_LEN_MAX: usize = 50;

/// joined `tags/*` segment length cap; longer forms are truncated and
/// suffixed with [`TAG_HASH_LEN`] characters of a content hash
pub const TAG_SEGMENT_LEN_MAX: usize = 64;

/// hex characters of the content hash appended to truncated `tags/*` keys
pub const TAG_HASH_LEN: usize = 8;

/// exact-match deny-list of field names that carry no producer signal
pub static FIELD_DENY_LIST: phf::Set<&'static str> = phf_set! {
    "MEDIAWIKI_EXIF_VERSION",
};

/// file extensions (lower-case) accepted for sampling; raster and camera
/// raw image formats
pub static EXTENSION_ALLOW_LIST: phf::Set<&'static str> = phf_set! {
    "jpg",
    "jpeg",
    "png",
    "gif",
    "tif",
    "tiff",
    "webp",
    "bmp",
    "cr2",
    "nef",
    "arw",
    "dng",
    "orf",
    "rw2",
    "raf",
    "pef",
    "srw",
    "x3f",
};

/// software-indicating field names, in precedence order: the processing
/// tool, the host system, the author
pub const SOFTWARE_FIELDS: [&str; 3] = ["Software", "HostComputer", "Artist"];

pub const FIELD_MAKE: &str = "Make";
pub const FIELD_MODEL: &str = "Model";

/// stand-in segment for a device with only one of make/model set
pub const DEVICE_UNKNOWN: &str = "unknown";

/// host path template for content-addressed sample URLs
pub const SAMPLE_URL_BASE: &str = "https://upload.wikimedia.org/wikipedia/commons";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProducerKey
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// a sanitized, hierarchical, path-like classification bucket;
/// one of `errors/*`, `software/*`, `device/<make>/<model>`, `tags/*`
pub type ProducerKey = String;

/// which classification branch produced a [`ProducerKey`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProducerCategory {
    Error,
    Software,
    Device,
    Tags,
}

/// a classified record: the key and the branch that produced it
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Classification {
    pub key: ProducerKey,
    pub category: ProducerCategory,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sanitization and filename helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sanitize one key segment for safe use in a hierarchical path string.
///
/// Replace every character outside `[A-Za-z0-9._-]` with `_`, collapse
/// repeated `_`, trim leading/trailing `_` and space, truncate to `cap`.
/// Sanitizing an already-sanitized string returns it unchanged.
pub fn sanitize_segment(
    value: &str,
    cap: usize,
) -> String {
    let mut out = String::with_capacity(value.len().min(cap));
    let mut last_underscore: bool = false;
    for c in value.chars() {
        let c_: char = match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '-' => c,
            _ => '_',
        };
        if c_ == '_' {
            if last_underscore {
                continue;
            }
            last_underscore = true;
        } else {
            last_underscore = false;
        }
        out.push(c_);
        if out.len() >= cap {
            break;
        }
    }
    // trim after truncation so a cut at `_` cannot leave a trailing `_`
    let trimmed: &str = out.trim_matches(|c| c == '_' || c == ' ');

    trimmed.to_string()
}

/// lower-cased extension after the final `.`, if any
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('/') {
        return None;
    }

    Some(ext.to_ascii_lowercase())
}

/// the filename without its final extension
pub fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// is the (lower-case) extension in the sampling allow-list?
pub fn extension_allowed(ext: &str) -> bool {
    EXTENSION_ALLOW_LIST.contains(ext)
}

/// lower-case hex MD5 of `value`
pub fn md5_hex(value: &str) -> String {
    let digest = Md5::digest(value.as_bytes());
    let mut hex = String::with_capacity(32);
    for byte in digest.iter() {
        hex.push_str(&format!("{:02x}", byte));
    }

    hex
}

/// Content-addressed sample URL for a record filename: the first one and
/// first two hex characters of the filename's MD5 form two nested directory
/// shards under the fixed host path.
pub fn sample_url(filename: &str) -> String {
    let hash: String = md5_hex(filename);
    format!(
        "{}/{}/{}/{}",
        SAMPLE_URL_BASE,
        &hash[..1],
        &hash[..2],
        urlencoding::encode(filename),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Computes [`ProducerKey`]s. Holds the run-global error ordinal.
#[derive(Debug, Default)]
pub struct Classifier {
    /// monotonically increasing; shared across all error records in the
    /// run so repeated filenames still get unique `errors/*` keys
    error_ordinal: Count,
}

impl Classifier {
    pub fn new() -> Classifier {
        Classifier { error_ordinal: 0 }
    }

    /// Classify one record.
    ///
    /// `filtered_names` is the record's field-name set after deny-list and
    /// length filtering; `ext` is the validated lower-case file extension.
    /// Returns `None` when the record has no error marker and an empty
    /// filtered field-name set (the "empty metadata" outcome).
    pub fn classify(
        &mut self,
        filename: &str,
        ext: &str,
        decoded: &DecodedMetadata,
        filtered_names: &[&str],
    ) -> Option<Classification> {
        defn!("({:?})", filename);
        let (mut key, category): (ProducerKey, ProducerCategory) = if decoded.error_marked {
            let ordinal: Count = self.error_ordinal;
            self.error_ordinal += 1;
            (
                format!(
                    "errors/{}.error.{}",
                    sanitize_segment(file_stem(filename), SEGMENT_LEN_MAX),
                    ordinal,
                ),
                ProducerCategory::Error,
            )
        } else if let Some(joined) = software_join(decoded) {
            (
                format!("software/{}", sanitize_segment(&joined, SEGMENT_LEN_MAX)),
                ProducerCategory::Software,
            )
        } else if let Some((make, model)) = device_make_model(decoded) {
            (
                format!("device/{}/{}", make, model),
                ProducerCategory::Device,
            )
        } else if !filtered_names.is_empty() {
            (
                format!("tags/{}", tags_segment(filtered_names)),
                ProducerCategory::Tags,
            )
        } else {
            defx!("no error marker and empty field-name set; no classification");
            return None;
        };
        key.push('.');
        key.push_str(ext);
        defx!("{:?} {:?}", key, category);

        Some(Classification { key, category })
    }
}

/// the `.`-joined non-empty values of the software-indicating fields,
/// in precedence order, or `None` when all are empty
fn software_join(decoded: &DecodedMetadata) -> Option<String> {
    let values: Vec<&str> = SOFTWARE_FIELDS
        .iter()
        .filter_map(|name| decoded.field_str(name))
        .filter(|value| !value.is_empty())
        .collect();
    if values.is_empty() {
        return None;
    }

    Some(values.join("."))
}

/// sanitized `(make, model)` segments, or `None` when both are empty
fn device_make_model(decoded: &DecodedMetadata) -> Option<(String, String)> {
    let make: &str = decoded.field_str(FIELD_MAKE).unwrap_or("");
    let model: &str = decoded.field_str(FIELD_MODEL).unwrap_or("");
    if make.is_empty() && model.is_empty() {
        return None;
    }
    let make_seg: String = match sanitize_segment(make, DEVICE_SEGMENT_LEN_MAX) {
        s if s.is_empty() => String::from(DEVICE_UNKNOWN),
        s => s,
    };
    let model_seg: String = match sanitize_segment(model, DEVICE_SEGMENT_LEN_MAX) {
        s if s.is_empty() => String::from(DEVICE_UNKNOWN),
        s => s,
    };

    Some((make_seg, model_seg))
}

/// the `tags/*` segment: sanitized `.`-joined sorted field names; joined
/// forms longer than [`TAG_SEGMENT_LEN_MAX`] are truncated and suffixed
/// with [`TAG_HASH_LEN`] hex characters of the untruncated form's hash to
/// preserve uniqueness
fn tags_segment(filtered_names: &[&str]) -> String {
    let mut names: Vec<&str> = filtered_names.to_vec();
    names.sort_unstable();
    let joined: String = names.join(".");
    let segment: String = sanitize_segment(&joined, usize::MAX);
    if segment.len() <= TAG_SEGMENT_LEN_MAX {
        return segment;
    }
    let hash: String = md5_hex(&segment);

    format!("{}{}", &segment[..TAG_SEGMENT_LEN_MAX], &hash[..TAG_HASH_LEN])
}
