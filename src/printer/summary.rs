// src/printer/summary.rs

//! Implements the interrupt-safe Reporter: ranked side files, the field
//! audit list, the per-emission debug trace, and the human-readable final
//! summary.
//!
//! [`SummaryWriter::flush`] is safe to invoke at any point during the
//! stream (the cancellation path) or at normal end-of-stream, and writes
//! every output file atomically: content is fully materialized in a
//! temporary file which is then persisted to its final name.

use crate::common::Count;
use crate::printer::printers::{print_colored_stderr, ColorChoice, COLOR_SECTION};
use crate::readers::dumpreader::SummaryDumpReader;
use crate::readers::sampler::{SampleEngine, SeenTable};

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use ::itertools::Itertools; // brings in `sorted_by`
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};
use ::tempfile::NamedTempFile;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// output files
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const FILE_MAKES: &str = "makes.txt";
pub const FILE_MODELS: &str = "models.txt";
pub const FILE_SOFTWARE: &str = "software.txt";
pub const FILE_ALL_FIELDS: &str = "all_fields.txt";
pub const FILE_TRACE: &str = "sample_trace.txt";

/// how many software values and producer keys the stderr summary lists
pub const SUMMARY_TOP_N: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SummaryWriter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Writes the Reporter's side files into one output directory.
pub struct SummaryWriter {
    out_dir: PathBuf,
    /// has `flush` already run? `flush` is at-most-once per run
    flushed: bool,
}

impl SummaryWriter {
    pub fn new(out_dir: &Path) -> SummaryWriter {
        defñ!("({:?})", out_dir);

        SummaryWriter {
            out_dir: out_dir.to_path_buf(),
            flushed: false,
        }
    }

    /// Flush aggregate statistics to the side files.
    ///
    /// Callable from the end-of-stream path and the cancellation path;
    /// a second call is a no-op. No output file is ever partially visible.
    pub fn flush(
        &mut self,
        engine: &SampleEngine,
    ) -> std::io::Result<()> {
        defn!();
        if self.flushed {
            defx!("already flushed; no-op");
            return Ok(());
        }

        let makes: HashMap<String, Count> = sum_by(
            engine.stats.make_model_counts.iter(),
            |(make, _model)| make.as_str(),
        );
        let models: HashMap<String, Count> = sum_by(
            engine.stats.make_model_counts.iter(),
            |(_make, model)| model.as_str(),
        );
        self.write_atomic(FILE_MAKES, &ranked_lines(&makes))?;
        self.write_atomic(FILE_MODELS, &ranked_lines(&models))?;
        self.write_atomic(FILE_SOFTWARE, &ranked_lines(&engine.stats.software_counts))?;

        let mut all_fields = String::new();
        for name in engine.field_table.sorted_names().into_iter() {
            all_fields.push_str(name);
            all_fields.push('\n');
        }
        self.write_atomic(FILE_ALL_FIELDS, &all_fields)?;

        let mut trace = String::new();
        for line in engine.trace_lines.iter() {
            trace.push_str(line);
            trace.push('\n');
        }
        self.write_atomic(FILE_TRACE, &trace)?;

        self.flushed = true;
        defx!();

        Ok(())
    }

    /// Fully materialize `content` in a temporary file within the output
    /// directory, then persist it to `filename`.
    fn write_atomic(
        &self,
        filename: &str,
        content: &str,
    ) -> std::io::Result<()> {
        defn!("({:?})", filename);
        let mut tmp: NamedTempFile = NamedTempFile::new_in(&self.out_dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        let target: PathBuf = self.out_dir.join(filename);
        tmp.persist(&target).map_err(|err| err.error)?;
        defx!("persisted {:?}", target);

        Ok(())
    }
}

/// sum counts of a keyed map grouped by a projection of the key,
/// skipping empty projected values
pub(crate) fn sum_by<'a, I, F>(
    counts: I,
    project: F,
) -> HashMap<String, Count>
where
    I: Iterator<Item = (&'a (String, String), &'a Count)>,
    F: Fn(&'a (String, String)) -> &'a str,
{
    let mut sums: HashMap<String, Count> = HashMap::new();
    for (key, count) in counts {
        let value: &str = project(key);
        if value.is_empty() {
            continue;
        }
        *sums.entry(value.to_string()).or_insert(0) += *count;
    }

    sums
}

/// render `rank<TAB>count<TAB>value` lines, descending by count,
/// ties broken by value
pub(crate) fn ranked_lines(counts: &HashMap<String, Count>) -> String {
    let mut out = String::new();
    let ranked = counts
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (rank, (value, count)) in ranked.enumerate() {
        out.push_str(&format!("{}\t{}\t{}\n", rank + 1, count, value));
    }

    out
}

/// the top-N producer keys by record count: `count key (first filename)`
/// lines, descending by count, ties broken by key
pub(crate) fn top_seen_lines(seen: &SeenTable) -> Vec<String> {
    seen.iter()
        .sorted_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)))
        .take(SUMMARY_TOP_N)
        .map(|(key, entry)| format!("{:>10} {} (first {:?})", entry.count, key, entry.first_filename))
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// stderr summary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn print_section(
    color_choice: ColorChoice,
    text: &str,
) {
    match print_colored_stderr(COLOR_SECTION, Some(color_choice), text.as_bytes()) {
        Ok(_) => eprintln!(),
        Err(_) => eprintln!("{}", text),
    }
}

/// Print a human-readable summary of every aggregate counter plus the
/// top-N software values by popularity. For the diagnostic channel.
pub fn print_summary(
    engine: &SampleEngine,
    summary_dumpreader: &SummaryDumpReader,
    color_choice: ColorChoice,
) {
    defñ!();
    print_section(color_choice, "Extraction:");
    eprintln!("  lines read                 {}", summary_dumpreader.dumpreader_lines);
    eprintln!("  insert lines               {}", summary_dumpreader.dumpreader_insert_lines);
    eprintln!("  record fragments           {}", summary_dumpreader.dumpreader_fragments);
    eprintln!("  fragments skipped          {}", summary_dumpreader.dumpreader_fragments_skipped);
    eprintln!("  records extracted          {}", summary_dumpreader.dumpreader_records);

    print_section(color_choice, "Classification:");
    eprintln!("  records processed          {}", engine.stats.records);
    eprintln!("  skipped by extension       {}", engine.stats.skipped_extension);
    eprintln!("  empty or undecodable       {}", engine.stats.empty_metadata);
    eprintln!("  fields dropped (deny-list) {}", engine.stats.fields_dropped_deny);
    eprintln!("  fields dropped (oversize)  {}", engine.stats.fields_dropped_len);
    eprintln!("  error-classified records   {}", engine.stats.errors_classified);
    eprintln!("  distinct producer keys     {}", engine.seen.len());
    eprintln!("  distinct field names       {}", engine.field_table.len());
    eprintln!("  distinct (make, model)     {}", engine.stats.make_model_counts.len());
    eprintln!("  distinct software strings  {}", engine.stats.software_counts.len());
    eprintln!("  references emitted         {}", engine.trace_lines.len());

    print_section(color_choice, "Top software:");
    let top = engine
        .stats
        .software_counts
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        .take(SUMMARY_TOP_N);
    for (value, count) in top {
        eprintln!("  {:>10} {}", count, value);
    }

    print_section(color_choice, "Top producer keys:");
    for line in top_seen_lines(&engine.seen).into_iter() {
        eprintln!("  {}", line);
    }
}
