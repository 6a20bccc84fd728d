// src/tests/metadata_tests.rs

//! tests for `metadata.rs` decoding functions

use crate::data::metadata::{
    decode_metadata,
    unescape_sql,
    DecodeAttempt,
    DecodedMetadata,
    MetaValue,
};

use ::test_case::test_case;

#[test_case("", ""; "empty")]
#[test_case("plain", "plain"; "no escapes")]
#[test_case(r"O\'Brien", "O'Brien"; "escaped single quote")]
#[test_case(r#"a\"b"#, "a\"b"; "escaped double quote")]
#[test_case(r"a\\b", r"a\b"; "escaped backslash")]
#[test_case(r"a\nb", "a\nb"; "escaped newline")]
#[test_case(r"a\tb", "a\tb"; "escaped tab")]
#[test_case(r"a\0b", "a\0b"; "escaped nul")]
#[test_case(r"a\qb", "aqb"; "unknown escape keeps the character")]
#[test_case("trailing\\", "trailing\\"; "lone trailing backslash")]
fn test_unescape_sql(input: &str, expected: &str) {
    assert_eq!(unescape_sql(input), expected);
}

#[test_case("{}", DecodeAttempt::JsonLike)]
#[test_case("{\"a\":1}", DecodeAttempt::JsonLike; "json object")]
#[test_case("a:0:{}", DecodeAttempt::LegacySerialized)]
#[test_case("", DecodeAttempt::Unrecognized; "empty blob")]
#[test_case("xyz", DecodeAttempt::Unrecognized)]
#[test_case("[1,2]", DecodeAttempt::Unrecognized; "json array is not a document")]
fn test_decode_attempt_discriminant(blob: &str, expected: DecodeAttempt) {
    assert_eq!(DecodeAttempt::discriminant(blob), expected);
}

#[test]
fn test_decode_json_object() {
    let decoded: DecodedMetadata =
        decode_metadata(r#"{"Make":"Canon","Model":"EOS 5D","ISOSpeedRatings":400}"#).unwrap();
    assert!(!decoded.error_marked);
    assert_eq!(decoded.field_str("Make"), Some("Canon"));
    assert_eq!(decoded.field_str("Model"), Some("EOS 5D"));
    // numbers decode to their string form
    assert_eq!(decoded.field_str("ISOSpeedRatings"), Some("400"));
}

#[test]
fn test_decode_json_exif_submap_is_effective() {
    let decoded: DecodedMetadata =
        decode_metadata(r#"{"exif":{"Make":"Nikon"},"width":640}"#).unwrap();
    assert_eq!(decoded.field_str("Make"), Some("Nikon"));
    // the top-level mapping is replaced by the exif sub-mapping
    assert_eq!(decoded.field_str("width"), None);
}

#[test]
fn test_decode_json_error_marker_with_exif_submap() {
    // the error marker is read at the top level, even when the exif
    // sub-mapping becomes the effective field mapping
    let decoded: DecodedMetadata =
        decode_metadata(r#"{"_error":"bad header","exif":{"Make":"Nikon"}}"#).unwrap();
    assert!(decoded.error_marked);
    assert_eq!(decoded.field_str("Make"), Some("Nikon"));
}

#[test_case(r#"{"_error":"failed"}"#; "underscore error")]
#[test_case(r#"{"errors":["a","b"]}"#; "errors list")]
fn test_decode_error_marked(blob: &str) {
    let decoded: DecodedMetadata = decode_metadata(blob).unwrap();
    assert!(decoded.error_marked);
}

#[test]
fn test_decode_php_array() {
    let blob = r#"a:3:{s:4:"Make";s:5:"Canon";s:5:"Model";s:6:"EOS 5D";s:22:"MEDIAWIKI_EXIF_VERSION";i:2;}"#;
    let decoded: DecodedMetadata = decode_metadata(blob).unwrap();
    assert!(!decoded.error_marked);
    assert_eq!(decoded.field_str("Make"), Some("Canon"));
    assert_eq!(decoded.field_str("Model"), Some("EOS 5D"));
    assert_eq!(decoded.field_str("MEDIAWIKI_EXIF_VERSION"), Some("2"));
}

#[test]
fn test_decode_php_nested_and_scalars() {
    let blob = r#"a:4:{s:3:"GPS";a:1:{i:0;d:1.5;}s:4:"Flag";b:1;s:4:"None";N;s:3:"Neg";i:-12;}"#;
    let decoded: DecodedMetadata = decode_metadata(blob).unwrap();
    match decoded.fields.get("GPS") {
        Some(MetaValue::Map(map)) => {
            assert_eq!(map.get("0").and_then(|v| v.as_str()), Some("1.5"));
        }
        other => panic!("GPS decoded to {:?}", other),
    }
    assert_eq!(decoded.field_str("Flag"), Some("true"));
    assert_eq!(decoded.field_str("None"), Some(""));
    assert_eq!(decoded.field_str("Neg"), Some("-12"));
}

#[test]
fn test_decode_php_error_marker() {
    let blob = r#"a:1:{s:6:"_error";s:9:"truncated";}"#;
    let decoded: DecodedMetadata = decode_metadata(blob).unwrap();
    assert!(decoded.error_marked);
}

// decoding is total: a mapping or "no data", never a panic

#[test_case(""; "empty blob")]
#[test_case("0"; "bare scalar")]
#[test_case("{"; "unterminated json")]
#[test_case(r#"{"a":}"#; "broken json")]
#[test_case(r#""just a string""#; "json string not object")]
#[test_case("a:5:{s:4:\"Make\";}"; "php count larger than content")]
#[test_case("a:1:{s:99:\"Make\";s:5:\"Canon\";}"; "php string length overrun")]
#[test_case("a:1:{s:18446744073709551615:\"x\";s:1:\"y\";}"; "php declared length usize max")]
#[test_case("a:1:{s:1:\"k\";s:18446744073709551610:\"v\";}"; "php declared value length near usize max")]
#[test_case("a:1:{d:1.5;s:5:\"Canon\";}"; "php non-string key")]
#[test_case("i:42;"; "php top-level scalar")]
#[test_case("a:1:{s:1:\"x\";q:0;}"; "php unknown tag")]
fn test_decode_metadata_no_data(blob: &str) {
    assert_eq!(decode_metadata(blob), None);
}

#[test]
fn test_decode_metadata_total_over_arbitrary_bytes() {
    // pseudo-random byte soup; decoder must return mapping-or-nothing,
    // never panic
    let mut state: u32 = 0x2545F491;
    for len in 0..200 {
        let mut blob = String::with_capacity(len);
        for _ in 0..len {
            // xorshift
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            blob.push(char::from_u32(state % 0x80).unwrap_or('a'));
        }
        let _ = decode_metadata(&blob);
        // also force both dialect branches
        let _ = decode_metadata(&format!("{{{}", blob));
        let _ = decode_metadata(&format!("a:{}", blob));
    }
}
