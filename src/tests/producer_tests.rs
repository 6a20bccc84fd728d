// src/tests/producer_tests.rs

//! tests for `producer.rs` sanitization and classification

use crate::data::metadata::decode_metadata;
use crate::data::producer::{
    extension_allowed,
    file_extension,
    file_stem,
    md5_hex,
    sample_url,
    sanitize_segment,
    Classification,
    Classifier,
    ProducerCategory,
    SAMPLE_URL_BASE,
    SEGMENT_LEN_MAX,
    TAG_HASH_LEN,
    TAG_SEGMENT_LEN_MAX,
};

use ::test_case::test_case;

// ------------------
// sanitization

#[test_case("Canon", "Canon"; "already clean")]
#[test_case("EOS 5D", "EOS_5D"; "space replaced")]
#[test_case("a  b   c", "a_b_c"; "repeats collapsed")]
#[test_case("__x__", "x"; "trimmed")]
#[test_case(" x ", "x"; "spaces trimmed")]
#[test_case("NIKON/COOLPIX", "NIKON_COOLPIX"; "slash replaced")]
#[test_case("v1.2-rc_3", "v1.2-rc_3"; "allowed punctuation kept")]
#[test_case("日本語", ""; "all replaced then trimmed away")]
fn test_sanitize_segment(input: &str, expected: &str) {
    assert_eq!(sanitize_segment(input, SEGMENT_LEN_MAX), expected);
}

#[test_case("Canon EOS 5D")]
#[test_case("__lead__and__trail__")]
#[test_case("GIMP 2.10.34 (linux)")]
#[test_case("ACD Systems Digital Imaging")]
fn test_sanitize_segment_idempotent(input: &str) {
    let once: String = sanitize_segment(input, SEGMENT_LEN_MAX);
    let twice: String = sanitize_segment(&once, SEGMENT_LEN_MAX);
    assert_eq!(once, twice);
}

#[test]
fn test_sanitize_segment_cap_no_trailing_underscore() {
    // a cut at `_` must not leave a trailing `_`
    let sanitized: String = sanitize_segment("abcd efgh", 5);
    assert_eq!(sanitized, "abcd");
}

// ------------------
// filename helpers

#[test_case("photo.JPG", Some("jpg"); "uppercase lowered")]
#[test_case("archive.tar.gz", Some("gz"); "last extension")]
#[test_case("noext", None)]
#[test_case("trailingdot.", None; "empty extension")]
fn test_file_extension(filename: &str, expected: Option<&str>) {
    assert_eq!(file_extension(filename).as_deref(), expected);
}

#[test_case("photo.jpg", "photo")]
#[test_case("a.b.c.png", "a.b.c")]
#[test_case("noext", "noext")]
fn test_file_stem(filename: &str, expected: &str) {
    assert_eq!(file_stem(filename), expected);
}

#[test_case("jpg", true)]
#[test_case("nef", true)]
#[test_case("svg", false; "vector formats excluded")]
#[test_case("mp4", false)]
fn test_extension_allowed(ext: &str, expected: bool) {
    assert_eq!(extension_allowed(ext), expected);
}

// ------------------
// content-addressed sharding

#[test]
fn test_md5_hex_known_value() {
    // RFC 1321 test vector
    assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
}

#[test]
fn test_sample_url_shards() {
    let url: String = sample_url("Great_Wave.jpg");
    let hash: String = md5_hex("Great_Wave.jpg");
    let expected: String = format!(
        "{}/{}/{}/Great_Wave.jpg",
        SAMPLE_URL_BASE,
        &hash[..1],
        &hash[..2],
    );
    assert_eq!(url, expected);
}

#[test]
fn test_sample_url_escapes_filename() {
    let url: String = sample_url("100%_sure.jpg");
    assert!(url.ends_with("/100%25_sure.jpg"), "url was {:?}", url);
}

// ------------------
// classification

fn classify_one(
    filename: &str,
    blob: &str,
) -> Option<Classification> {
    let decoded = decode_metadata(blob)?;
    let names: Vec<&str> = decoded.fields.keys().map(|k| k.as_str()).collect();
    let ext: String = file_extension(filename)?;
    Classifier::new().classify(filename, &ext, &decoded, &names)
}

#[test]
fn test_classify_device() {
    let c = classify_one("IMG_0001.JPG", r#"{"Make":"Canon","Model":"EOS 5D"}"#).unwrap();
    assert_eq!(c.category, ProducerCategory::Device);
    assert_eq!(c.key, "device/Canon/EOS_5D.jpg");
}

#[test]
fn test_classify_device_make_only() {
    let c = classify_one("x.png", r#"{"Make":"Canon"}"#).unwrap();
    assert_eq!(c.key, "device/Canon/unknown.png");
}

#[test]
fn test_classify_software() {
    let c = classify_one("x.tif", r#"{"Software":"Photoshop CS6"}"#).unwrap();
    assert_eq!(c.category, ProducerCategory::Software);
    assert_eq!(c.key, "software/Photoshop_CS6.tif");
}

#[test]
fn test_classify_software_joins_values_in_order() {
    let c = classify_one(
        "x.jpg",
        r#"{"HostComputer":"Mac OS X","Software":"QuickTime"}"#,
    )
    .unwrap();
    // Software precedes HostComputer regardless of mapping order
    assert_eq!(c.key, "software/QuickTime.Mac_OS_X.jpg");
}

#[test]
fn test_classify_precedence_software_over_device() {
    let c = classify_one(
        "x.jpg",
        r#"{"Make":"Canon","Model":"EOS 5D","Software":"Photoshop"}"#,
    )
    .unwrap();
    assert_eq!(c.category, ProducerCategory::Software);
}

#[test]
fn test_classify_precedence_error_over_software() {
    let c = classify_one(
        "broken.jpg",
        r#"{"_error":"bad header","Software":"Photoshop"}"#,
    )
    .unwrap();
    assert_eq!(c.category, ProducerCategory::Error);
    assert_eq!(c.key, "errors/broken.error.0.jpg");
}

#[test]
fn test_classify_error_ordinal_increments() {
    let decoded = decode_metadata(r#"{"_error":"x"}"#).unwrap();
    let mut classifier = Classifier::new();
    let first = classifier
        .classify("same.jpg", "jpg", &decoded, &[])
        .unwrap();
    let second = classifier
        .classify("same.jpg", "jpg", &decoded, &[])
        .unwrap();
    // repeated filenames still get unique error keys
    assert_eq!(first.key, "errors/same.error.0.jpg");
    assert_eq!(second.key, "errors/same.error.1.jpg");
}

#[test]
fn test_classify_tags() {
    let c = classify_one("x.jpg", r#"{"Zeta":"1","Alpha":"2"}"#).unwrap();
    assert_eq!(c.category, ProducerCategory::Tags);
    // names sorted before joining
    assert_eq!(c.key, "tags/Alpha.Zeta.jpg");
}

#[test]
fn test_classify_tags_long_form_truncated_with_hash() {
    let blob = r#"{"AAAAAAAAAAAAAAAAAAAAAAAA":"1","BBBBBBBBBBBBBBBBBBBBBBBB":"1","CCCCCCCCCCCCCCCCCCCCCCCC":"1","DDDDDDDDDDDDDDDDDDDDDDDD":"1"}"#;
    let c = classify_one("x.jpg", blob).unwrap();
    let segment: &str = c
        .key
        .strip_prefix("tags/")
        .unwrap()
        .strip_suffix(".jpg")
        .unwrap();
    assert_eq!(segment.len(), TAG_SEGMENT_LEN_MAX + TAG_HASH_LEN);
}

#[test]
fn test_classify_empty_field_set_fails() {
    let decoded = decode_metadata("{}").unwrap();
    let mut classifier = Classifier::new();
    assert_eq!(classifier.classify("x.jpg", "jpg", &decoded, &[]), None);
}

#[test]
fn test_classify_deterministic() {
    let blob = r#"{"Make":"NIKON CORPORATION","Model":"NIKON D90"}"#;
    let first = classify_one("dsc_0001.nef", blob).unwrap();
    for _ in 0..3 {
        let again = classify_one("dsc_0001.nef", blob).unwrap();
        assert_eq!(first, again);
    }
}
