// src/readers/sampler.rs

//! Implements [`SampleEngine`]: field interning, aggregate statistics, the
//! per-producer-key seen table, and the power-of-two sampling selector.
//!
//! On each classified record the engine increments the key's running count
//! and emits a [`SampleRef`] exactly when the record is error-classified
//! (always) or the new count is a power of two (1, 2, 4, 8, 16, …). A
//! bucket with millions of records contributes only a handful of emitted
//! references while still reflecting its relative weight.
//!
//! [`SampleEngine`]: self::SampleEngine
//! [`SampleRef`]: self::SampleRef

use crate::common::{Count, FPath, FieldId, SetFieldId, COUNT_ALWAYS};
use crate::data::metadata::{decode_metadata, DecodedMetadata, RawRecord};
use crate::data::producer::{
    extension_allowed,
    file_extension,
    sample_url,
    Classification,
    Classifier,
    ProducerCategory,
    ProducerKey,
    FIELD_DENY_LIST,
    FIELD_MAKE,
    FIELD_MODEL,
    FIELD_NAME_LEN_MAX,
    SOFTWARE_FIELDS,
};

use std::collections::HashMap;

use ::more_asserts::debug_assert_le;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FieldTable
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bijection between field name and a dense [`FieldId`], built
/// incrementally. Id assignment order is first-seen order; once assigned,
/// a field's id never changes within a run.
#[derive(Debug, Default)]
pub struct FieldTable {
    ids: HashMap<String, FieldId>,
    names: Vec<String>,
}

impl FieldTable {
    pub fn new() -> FieldTable {
        FieldTable::default()
    }

    /// Assign a new dense id on first sight, return the existing id
    /// otherwise. Idempotent.
    pub fn intern(
        &mut self,
        name: &str,
    ) -> FieldId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id: FieldId = self.names.len() as FieldId;
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        debug_assert_le!(self.names.len(), FieldId::MAX as usize + 1);

        id
    }

    pub fn name(
        &self,
        id: FieldId,
    ) -> Option<&str> {
        self.names.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// all distinct field names encountered, sorted, for auditing
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(|s| s.as_str()).collect();
        names.sort_unstable();

        names
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AggregateStats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-lifetime counters, initialized at start, updated per record,
/// read (never mutated) by the Reporter. Purely additive; no individual
/// record history is retained.
#[derive(Debug, Default)]
pub struct AggregateStats {
    /// total records seen
    pub records: Count,
    /// records skipped by the extension allow-list filter
    pub skipped_extension: Count,
    /// records with empty or undecodable metadata, and records whose
    /// filtered field-name set was empty
    pub empty_metadata: Count,
    /// individual fields dropped by the deny-list
    pub fields_dropped_deny: Count,
    /// individual fields dropped for oversized names
    pub fields_dropped_len: Count,
    /// records classified `errors/*`
    pub errors_classified: Count,
    /// per-field popularity, post-filtering
    pub field_counts: HashMap<FieldId, Count>,
    /// per-(make, model) popularity; pair formed even if one side is empty
    pub make_model_counts: HashMap<(String, String), Count>,
    /// per-distinct-software-string popularity
    pub software_counts: HashMap<String, Count>,
}

impl AggregateStats {
    pub fn new() -> AggregateStats {
        AggregateStats::default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SeenEntry and SampleRef
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-[`ProducerKey`] state. Created on first assignment to a key,
/// count-incremented on every subsequent assignment, never destroyed
/// during a run.
#[derive(Clone, Debug, Default)]
pub struct SeenEntry {
    /// running count of records assigned to this key
    pub count: Count,
    /// filename of the first record assigned to this key
    pub first_filename: FPath,
    /// field ids observed, for keys from tag-based classification
    pub field_ids: SetFieldId,
}

/// storage for `SeenEntry`, keyed by producer key
pub type SeenTable = HashMap<ProducerKey, SeenEntry>;

/// An emitted sample reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SampleRef {
    pub key: ProducerKey,
    /// the per-key count at emission, or [`COUNT_ALWAYS`] for
    /// error-classified records
    pub count: Count,
    /// content-addressed URL of the record's file
    pub url: String,
}

impl SampleRef {
    /// the stdout line for this reference: `key<TAB>count<TAB>url`
    pub fn to_line(&self) -> String {
        match self.count {
            COUNT_ALWAYS => format!("{}\talways\t{}\n", self.key, self.url),
            _ => format!("{}\t{}\t{}\n", self.key, self.count, self.url),
        }
    }
}

/// power-of-two sampling checkpoint
pub const fn count_is_checkpoint(count: Count) -> bool {
    count > 0 && count & (count - 1) == 0
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SampleEngine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Drives one [`RawRecord`] at a time through decode, field filtering,
/// classification, interning, aggregate tallies, and sample selection.
///
/// Exclusively owns the [`SeenTable`], the [`FieldTable`], and the
/// [`AggregateStats`]; single-threaded, single-writer.
#[derive(Debug, Default)]
pub struct SampleEngine {
    classifier: Classifier,
    pub field_table: FieldTable,
    pub seen: SeenTable,
    pub stats: AggregateStats,
    /// per-emission debug trace: the producer key, or for `tags/*` keys
    /// the field-name list (from the key's observed field ids) that
    /// produced the classification
    pub trace_lines: Vec<String>,
}

impl SampleEngine {
    pub fn new() -> SampleEngine {
        defñ!();

        SampleEngine::default()
    }

    /// Process one record. Returns the emitted [`SampleRef`], if this
    /// record hit a sampling checkpoint or was error-classified.
    pub fn process(
        &mut self,
        record: &RawRecord,
    ) -> Option<SampleRef> {
        defn!("({:?})", record.filename);
        self.stats.records += 1;

        let ext: String = match file_extension(&record.filename) {
            Some(e) if extension_allowed(&e) => e,
            _ => {
                self.stats.skipped_extension += 1;
                defx!("extension not allowed; skip");
                return None;
            }
        };

        let decoded: DecodedMetadata = match decode_metadata(&record.metadata_blob) {
            Some(d) => d,
            None => {
                self.stats.empty_metadata += 1;
                defx!("no data; skip");
                return None;
            }
        };

        let filtered_names: Vec<&str> = self.filter_fields(&decoded);
        self.tally(&decoded, &filtered_names);

        let classification: Classification =
            match self
                .classifier
                .classify(&record.filename, &ext, &decoded, &filtered_names)
            {
                Some(c) => c,
                None => {
                    self.stats.empty_metadata += 1;
                    defx!("unclassifiable; skip");
                    return None;
                }
            };
        if classification.category == ProducerCategory::Error {
            self.stats.errors_classified += 1;
        }

        self.select(record, classification, &filtered_names)
    }

    /// Drop deny-listed and oversized field names; both drops are counted
    /// but do not abort classification.
    fn filter_fields<'a>(
        &mut self,
        decoded: &'a DecodedMetadata,
    ) -> Vec<&'a str> {
        let mut names: Vec<&str> = Vec::with_capacity(decoded.fields.len());
        for name in decoded.fields.keys() {
            if FIELD_DENY_LIST.contains(name.as_str()) {
                self.stats.fields_dropped_deny += 1;
                continue;
            }
            if name.len() > FIELD_NAME_LEN_MAX {
                self.stats.fields_dropped_len += 1;
                continue;
            }
            names.push(name.as_str());
        }

        names
    }

    /// Additive per-record tallies: field popularity, (make, model) pairs,
    /// software strings.
    fn tally(
        &mut self,
        decoded: &DecodedMetadata,
        filtered_names: &[&str],
    ) {
        for name in filtered_names.iter() {
            let id: FieldId = self.field_table.intern(name);
            *self.stats.field_counts.entry(id).or_insert(0) += 1;
        }
        let make: &str = decoded.field_str(FIELD_MAKE).unwrap_or("");
        let model: &str = decoded.field_str(FIELD_MODEL).unwrap_or("");
        if !make.is_empty() || !model.is_empty() {
            *self
                .stats
                .make_model_counts
                .entry((make.to_string(), model.to_string()))
                .or_insert(0) += 1;
        }
        for field in SOFTWARE_FIELDS.iter() {
            match decoded.field_str(field) {
                Some(value) if !value.is_empty() => {
                    *self
                        .stats
                        .software_counts
                        .entry(value.to_string())
                        .or_insert(0) += 1;
                }
                _ => {}
            }
        }
    }

    /// Update the key's [`SeenEntry`] and apply the sampling rule.
    fn select(
        &mut self,
        record: &RawRecord,
        classification: Classification,
        filtered_names: &[&str],
    ) -> Option<SampleRef> {
        let Classification { key, category } = classification;
        let entry: &mut SeenEntry = self.seen.entry(key.clone()).or_insert_with(|| SeenEntry {
            count: 0,
            first_filename: record.filename.clone(),
            field_ids: SetFieldId::new(),
        });
        entry.count += 1;
        if category == ProducerCategory::Tags {
            for name in filtered_names.iter() {
                let id: FieldId = self.field_table.intern(name);
                entry.field_ids.insert(id);
            }
        }

        let count: Count = match category {
            ProducerCategory::Error => COUNT_ALWAYS,
            _ if count_is_checkpoint(entry.count) => entry.count,
            _ => {
                defx!("count {} not a checkpoint; no emission", entry.count);
                return None;
            }
        };

        let trace: String = match category {
            ProducerCategory::Tags => {
                let mut names: Vec<&str> = entry
                    .field_ids
                    .iter()
                    .filter_map(|id| self.field_table.name(*id))
                    .collect();
                names.sort_unstable();
                names.join(".")
            }
            _ => key.clone(),
        };
        self.trace_lines.push(trace);
        defx!("emit {:?} at count {}", key, count);

        Some(SampleRef {
            url: sample_url(&record.filename),
            key,
            count,
        })
    }
}
