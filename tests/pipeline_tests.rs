// tests/pipeline_tests.rs

//! blackbox tests of the full pipeline: dump stream in, sampled
//! references and side files out

use std::fs;
use std::io::Cursor;

use ::edslib::common::{ResultS3, COUNT_ALWAYS};
use ::edslib::printer::summary::{
    SummaryWriter,
    FILE_ALL_FIELDS,
    FILE_MAKES,
    FILE_SOFTWARE,
    FILE_TRACE,
};
use ::edslib::readers::dumpreader::{DumpReader, INSERT_MARKER};
use ::edslib::readers::sampler::{SampleEngine, SampleRef};
use ::tempfile::TempDir;

fn insert_line(fragments: &[&str]) -> String {
    format!("{}{});\n", INSERT_MARKER, fragments.join("),("))
}

fn run_pipeline(dump: String) -> (SampleEngine, Vec<SampleRef>, TempDir) {
    let mut dumpreader = DumpReader::new(Cursor::new(dump));
    let mut engine = SampleEngine::new();
    let mut emitted: Vec<SampleRef> = Vec::new();
    loop {
        match dumpreader.next_record() {
            ResultS3::Found(record) => {
                if let Some(sampleref) = engine.process(&record) {
                    emitted.push(sampleref);
                }
            }
            ResultS3::Done => break,
            ResultS3::Err(err) => panic!("read error {}", err),
        }
    }
    let tmpdir = TempDir::new().unwrap();
    let mut writer = SummaryWriter::new(tmpdir.path());
    writer.flush(&engine).unwrap();

    (engine, emitted, tmpdir)
}

#[test]
fn test_pipeline_power_of_two_sampling() {
    // 17 records in one device bucket: emissions at counts 1, 2, 4, 8, 16
    let mut dump = String::from("-- MySQL dump\n");
    for index in 0..17 {
        let fragment = format!(
            r#"{},2,3,4,'Img_{}.jpg','{{"Make":"Canon","Model":"EOS 5D"}}'"#,
            index, index,
        );
        dump.push_str(&insert_line(&[&fragment]));
    }
    let (engine, emitted, _tmpdir) = run_pipeline(dump);
    let counts: Vec<u64> = emitted.iter().map(|r| r.count).collect();
    assert_eq!(counts, vec![1, 2, 4, 8, 16]);
    assert_eq!(engine.stats.records, 17);
    assert_eq!(engine.seen.len(), 1);
}

#[test]
fn test_pipeline_errors_always_emitted() {
    let mut dump = String::new();
    let mut fragments: Vec<String> = Vec::new();
    for index in 0..5 {
        fragments.push(format!(
            r#"{},2,3,4,'Broken_{}.jpg','{{"_error":"no header"}}'"#,
            index, index,
        ));
    }
    let fragment_refs: Vec<&str> = fragments.iter().map(|s| s.as_str()).collect();
    dump.push_str(&insert_line(&fragment_refs));
    let (engine, emitted, _tmpdir) = run_pipeline(dump);
    assert_eq!(emitted.len(), 5);
    for sampleref in emitted.iter() {
        assert_eq!(sampleref.count, COUNT_ALWAYS);
        assert!(sampleref.to_line().contains("\talways\t"));
    }
    assert_eq!(engine.stats.errors_classified, 5);
}

#[test]
fn test_pipeline_mixed_records_and_side_files() {
    // A and B share a device bucket, C is software, D has a disallowed
    // extension, E is legacy-serialized
    let dump = insert_line(&[
        r#"1,2,3,4,'A.jpg','{"Make":"Canon","Model":"EOS 5D"}'"#,
        r#"2,2,3,4,'B.jpg','{"Make":"Canon","Model":"EOS 5D"}'"#,
        r#"3,2,3,4,'C.tif','{"Software":"Photoshop"}'"#,
        r#"4,2,3,4,'D.mp4','{"Make":"Canon"}'"#,
        r#"5,2,3,4,'E.png','a:1:{s:4:\"Make\";s:5:\"Nikon\";}'"#,
    ]);
    let (engine, emitted, tmpdir) = run_pipeline(dump);

    let keys: Vec<&str> = emitted.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "device/Canon/EOS_5D.jpg",
            "device/Canon/EOS_5D.jpg",
            "software/Photoshop.tif",
            "device/Nikon/unknown.png",
        ],
    );
    assert_eq!(emitted[0].count, 1);
    assert_eq!(emitted[1].count, 2);
    assert_eq!(engine.stats.skipped_extension, 1);

    // the content URL shards on the md5 of the filename
    assert!(emitted[0]
        .url
        .starts_with("https://upload.wikimedia.org/wikipedia/commons/"));
    assert!(emitted[0].url.ends_with("/A.jpg"));

    let makes = fs::read_to_string(tmpdir.path().join(FILE_MAKES)).unwrap();
    assert_eq!(makes, "1\t2\tCanon\n2\t1\tNikon\n");
    let software = fs::read_to_string(tmpdir.path().join(FILE_SOFTWARE)).unwrap();
    assert_eq!(software, "1\t1\tPhotoshop\n");
    let all_fields = fs::read_to_string(tmpdir.path().join(FILE_ALL_FIELDS)).unwrap();
    assert_eq!(all_fields, "Make\nModel\nSoftware\n");
    let trace = fs::read_to_string(tmpdir.path().join(FILE_TRACE)).unwrap();
    assert_eq!(trace.lines().count(), 4);
}

#[test]
fn test_pipeline_flush_mid_stream_then_again_is_noop() {
    // the cancellation path: flush after a prefix of the stream, then
    // a second flush must not overwrite
    let dump = insert_line(&[
        r#"1,2,3,4,'A.jpg','{"Make":"Canon","Model":"EOS 5D"}'"#,
        r#"2,2,3,4,'B.jpg','{"Make":"Nikon","Model":"D90"}'"#,
    ]);
    let mut dumpreader = DumpReader::new(Cursor::new(dump));
    let mut engine = SampleEngine::new();
    match dumpreader.next_record() {
        ResultS3::Found(record) => {
            engine.process(&record);
        }
        other => panic!("expected a record, got {}", other),
    }
    let tmpdir = TempDir::new().unwrap();
    let mut writer = SummaryWriter::new(tmpdir.path());
    writer.flush(&engine).unwrap();
    let makes = fs::read_to_string(tmpdir.path().join(FILE_MAKES)).unwrap();
    assert_eq!(makes, "1\t1\tCanon\n");

    // drain the rest, then the no-op second flush
    while let ResultS3::Found(record) = dumpreader.next_record() {
        engine.process(&record);
    }
    writer.flush(&engine).unwrap();
    let makes_again = fs::read_to_string(tmpdir.path().join(FILE_MAKES)).unwrap();
    assert_eq!(makes_again, makes);
}
