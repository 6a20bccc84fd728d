// src/readers/dumpreader.rs

//! Implements [`DumpReader`], the streaming Record Extractor.
//!
//! The source dump is logically one giant line (or a small number of very
//! long lines) of bulk-insert statements,
//! ``INSERT INTO `image` VALUES (<record>),(<record>),…;``. Only lines
//! beginning with that fixed marker are processed; all others are ignored
//! without error.
//!
//! Within an insert line, records split on the literal boundary `),(`,
//! which is safe because embedded string fields never contain that exact
//! sequence unescaped. Each fragment must match one anchored pattern that
//! captures exactly two groups, the filename and the metadata blob,
//! tolerating escaped quotes and backslashes inside either group. Fragments
//! that do not match are counted as skipped and dropped; the source schema
//! may grow columns beyond the four expected leading ones at any time.
//!
//! [`DumpReader`]: self::DumpReader

use crate::common::{Count, ResultS3};
use crate::data::metadata::{unescape_sql, RawRecord};
use crate::debug::printers::de_wrn;

use std::collections::VecDeque;
use std::io::{BufRead, Error};

use ::const_format::concatcp;
use ::lazy_static::lazy_static;
use ::memchr::memmem;
use ::regex::Regex;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// framing and the record capture pattern
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// fixed marker beginning every processed line
pub const INSERT_MARKER: &str = "INSERT INTO `image` VALUES (";

/// fixed framing ending every processed line
pub const INSERT_SUFFIX: &str = ");";

/// literal record boundary within an insert payload
pub const RECORD_BOUNDARY: &str = "),(";

/// capture group name for the record filename
const CGN_FILENAME: &str = "filename";

/// capture group name for the record metadata blob
const CGN_METADATA: &str = "metadata";

/// one uninterpreted leading column and its trailing comma
const CGP_LEAD_COLUMN: &str = r"[^,]*,";

/// a single-quoted string column; a backslash followed by any character is
/// a literal escape, never a terminator
const CGP_QUOTED_BODY: &str = r"(?:[^'\\]|\\.)*";

/// count of uninterpreted leading columns before the filename column
const LEAD_COLUMN_COUNT: usize = 4;

/// the anchored record capture pattern:
/// four uninterpreted leading columns, the quoted filename column, the
/// quoted metadata column
pub const RECORD_PATTERN: &str = concatcp!(
    r"^(?:",
    CGP_LEAD_COLUMN,
    r"){",
    LEAD_COLUMN_COUNT,
    r"}'(?P<",
    CGN_FILENAME,
    r">",
    CGP_QUOTED_BODY,
    r")','(?P<",
    CGN_METADATA,
    r">",
    CGP_QUOTED_BODY,
    r")'",
);

lazy_static! {
    static ref RECORD_REGEX: Regex = {
        defñ!("lazy_static! RECORD_REGEX::new()");

        #[allow(clippy::unwrap_used)]
        Regex::new(RECORD_PATTERN).unwrap()
    };
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// free helper functions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Strip the insert framing from a line.
///
/// Returns the payload between the marker and the trailing `);`, or `None`
/// when the line does not begin with [`INSERT_MARKER`].
pub fn strip_insert_framing(line: &str) -> Option<&str> {
    let payload: &str = line.strip_prefix(INSERT_MARKER)?;
    let payload: &str = payload.trim_end_matches(['\n', '\r', ' ']);
    let payload: &str = match payload.strip_suffix(INSERT_SUFFIX) {
        Some(p) => p,
        // tolerate a final line cut before the statement terminator
        None => payload.strip_suffix(')').unwrap_or(payload),
    };

    Some(payload)
}

/// Split an insert payload into record fragments on [`RECORD_BOUNDARY`].
pub fn split_fragments(payload: &str) -> Vec<&str> {
    let finder = memmem::Finder::new(RECORD_BOUNDARY.as_bytes());
    let bytes: &[u8] = payload.as_bytes();
    let mut fragments: Vec<&str> = Vec::new();
    let mut begin: usize = 0;
    for at in finder.find_iter(bytes) {
        fragments.push(&payload[begin..at]);
        begin = at + RECORD_BOUNDARY.len();
    }
    fragments.push(&payload[begin..]);

    fragments
}

/// Capture one [`RawRecord`] from a record fragment.
///
/// Returns `None` when the fragment does not match [`RECORD_PATTERN`];
/// that is not an error, the source format may extend beyond the expected
/// leading columns at any time.
pub fn capture_record(fragment: &str) -> Option<RawRecord> {
    let captures = RECORD_REGEX.captures(fragment)?;
    let filename: String = unescape_sql(&captures[CGN_FILENAME]);
    let metadata_blob: String = unescape_sql(&captures[CGN_METADATA]);

    Some(RawRecord::new(filename, metadata_blob))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DumpReader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// [`DumpReader::next_record`] result
pub type ResultNextRecord = ResultS3<RawRecord, Error>;

/// Streaming extractor of [`RawRecord`s] from a dump stream.
///
/// Reads the underlying stream one line at a time (lines may be hundreds
/// of megabytes; nothing else is buffered beyond the current line's
/// pending records).
///
/// XXX: not a rust "Reader"; does not implement trait `Read`
///
/// [`RawRecord`s]: crate::data::metadata::RawRecord
pub struct DumpReader<R: BufRead> {
    reader: R,
    /// records captured from the current insert line, not yet returned
    pending: VecDeque<RawRecord>,
    /// count of lines read
    pub(crate) lines: Count,
    /// count of lines beginning with [`INSERT_MARKER`]
    pub(crate) insert_lines: Count,
    /// count of record fragments seen
    pub(crate) fragments: Count,
    /// count of fragments that did not match [`RECORD_PATTERN`]
    pub(crate) fragments_skipped: Count,
    /// count of `RawRecord`s returned
    pub(crate) records: Count,
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(reader: R) -> DumpReader<R> {
        defñ!();

        DumpReader {
            reader,
            pending: VecDeque::new(),
            lines: 0,
            insert_lines: 0,
            fragments: 0,
            fragments_skipped: 0,
            records: 0,
        }
    }

    /// Return the next [`RawRecord`] from the stream.
    ///
    /// `Done` at end-of-stream, `Err` only for an underlying read error.
    pub fn next_record(&mut self) -> ResultNextRecord {
        loop {
            if let Some(record) = self.pending.pop_front() {
                self.records += 1;
                return ResultS3::Found(record);
            }
            let mut line_raw: Vec<u8> = Vec::new();
            match self.reader.read_until(b'\n', &mut line_raw) {
                Ok(0) => {
                    defñ!("read_until 0 bytes; Done");
                    return ResultS3::Done;
                }
                Ok(_sz) => {}
                Err(err) => {
                    defñ!("read_until error {}", err);
                    return ResultS3::Err(err);
                }
            }
            self.lines += 1;
            let line: String = String::from_utf8_lossy(&line_raw).into_owned();
            let payload: &str = match strip_insert_framing(&line) {
                Some(p) => p,
                None => continue,
            };
            self.insert_lines += 1;
            defo!("insert line {} payload len {}", self.lines, payload.len());
            for fragment in split_fragments(payload).into_iter() {
                self.fragments += 1;
                match capture_record(fragment) {
                    Some(record) => self.pending.push_back(record),
                    None => {
                        self.fragments_skipped += 1;
                        de_wrn!(
                            "fragment {} does not match the record pattern; skipped",
                            self.fragments,
                        );
                    }
                }
            }
        }
    }

    pub fn count_fragments_skipped(&self) -> Count {
        self.fragments_skipped
    }

    pub fn summary(&self) -> SummaryDumpReader {
        SummaryDumpReader {
            dumpreader_lines: self.lines,
            dumpreader_insert_lines: self.insert_lines,
            dumpreader_fragments: self.fragments,
            dumpreader_fragments_skipped: self.fragments_skipped,
            dumpreader_records: self.records,
        }
    }
}

/// Accumulated statistics about processing activity of a [`DumpReader`].
///
/// For the final summary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SummaryDumpReader {
    pub dumpreader_lines: Count,
    pub dumpreader_insert_lines: Count,
    pub dumpreader_fragments: Count,
    pub dumpreader_fragments_skipped: Count,
    pub dumpreader_records: Count,
}
