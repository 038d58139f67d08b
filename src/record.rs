//! Participant records and the immutable record store.
//!
//! Each input row describes one participant: anthropometrics, free-text
//! categories, cycle statistics, the number of cycles tried, and whether a
//! pregnancy was observed. Sentinel-encoded absences in the raw table
//! (`-1`, `"-1"`, empty) become `None` here, so no downstream computation
//! ever sees a magic number.
//!
//! # Examples
//!
//! ```
//! use u_fertility::record::{Outcome, RecordStore};
//!
//! let rows = [
//!     "0 22.1 31 SE No,never University Regular 2 pregnant 0.8 28 1.5 regular 0.2",
//!     "1 -1 29 -1 Yes,once -1 Regular 5 not_pregnant -1 30 2.0 regular 0.1",
//! ];
//! let loaded = RecordStore::load(rows);
//! assert_eq!(loaded.skipped, 0);
//! assert_eq!(loaded.store.count(), 2);
//! assert_eq!(loaded.store.bmi(1), None);
//! assert_eq!(loaded.store.outcome(0), Some(Outcome::Pregnant));
//! ```

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

/// Number of whitespace-separated columns in a data row.
pub const FIELD_COUNT: usize = 14;

/// Column names in file order, used for error reporting.
pub const COLUMNS: [&str; FIELD_COUNT] = [
    "index",
    "bmi",
    "age",
    "country",
    "pregnant_before",
    "education",
    "sleeping_pattern",
    "n_cycles_trying",
    "outcome",
    "dedication",
    "average_cycle_length",
    "cycle_length_std",
    "regular_cycle",
    "intercourse_frequency",
];

/// Observed result at the end of the tracking window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A pregnancy was recorded in the final tracked cycle.
    Pregnant,
    /// The participant stopped tracking without a recorded pregnancy.
    NotPregnant,
}

impl Outcome {
    /// Parses `pregnant` / `not_pregnant` (case-insensitive, `-` or `_`).
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().replace('-', "_").as_str() {
            "pregnant" => Some(Outcome::Pregnant),
            "not_pregnant" | "notpregnant" => Some(Outcome::NotPregnant),
            _ => None,
        }
    }

    pub fn is_pregnant(self) -> bool {
        self == Outcome::Pregnant
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pregnant => write!(f, "pregnant"),
            Outcome::NotPregnant => write!(f, "not_pregnant"),
        }
    }
}

/// One participant.
///
/// # Invariants
///
/// - `cycles_trying >= 1`
/// - every `Some(f64)` is finite
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub bmi: Option<f64>,
    pub age: Option<f64>,
    pub country: Option<String>,
    /// Number of previous pregnancies, 0..=3 (3 means "three or more").
    pub pregnancies_before: Option<u8>,
    pub education: Option<String>,
    pub sleep_pattern: Option<String>,
    pub cycles_trying: u32,
    pub outcome: Outcome,
    pub dedication: Option<f64>,
    pub average_cycle_length: Option<f64>,
    pub cycle_length_std: Option<f64>,
    pub cycle_regularity: Option<String>,
    pub intercourse_frequency: Option<f64>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// What went wrong with a single row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// The row does not have exactly [`FIELD_COUNT`] columns.
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    /// A numeric column could not be parsed.
    #[error("field '{field}' is not a number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    /// The outcome column is neither `pregnant` nor `not_pregnant`.
    #[error("unknown outcome '{value}'")]
    InvalidOutcome { value: String },
    /// `n_cycles_trying` was zero.
    #[error("n_cycles_trying must be at least 1")]
    NoCycles,
}

/// A row that could not be turned into a [`Record`].
///
/// Recovered: the loader logs it, skips the row, and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row}: {kind}")]
pub struct ParseError {
    /// Zero-based data row index (header excluded).
    pub row: usize,
    /// Offending column, if the error is tied to one.
    pub field: Option<&'static str>,
    pub kind: ParseErrorKind,
}

/// Maps the free-text previous-pregnancy label to a count.
///
/// Unmapped text (including the `-1` sentinel) yields `None`.
///
/// ```
/// use u_fertility::record::parse_pregnancies_before;
///
/// assert_eq!(parse_pregnancies_before("No,never"), Some(0));
/// assert_eq!(parse_pregnancies_before("Yes,3TimesOrMore"), Some(3));
/// assert_eq!(parse_pregnancies_before("-1"), None);
/// ```
pub fn parse_pregnancies_before(label: &str) -> Option<u8> {
    match label {
        "No,never" => Some(0),
        "Yes,once" => Some(1),
        "Yes,twice" => Some(2),
        "Yes,3TimesOrMore" => Some(3),
        _ => None,
    }
}

fn optional_number(row: usize, column: usize, token: &str) -> Result<Option<f64>, ParseError> {
    let value: f64 = token.parse().map_err(|_| ParseError {
        row,
        field: Some(COLUMNS[column]),
        kind: ParseErrorKind::InvalidNumber {
            field: COLUMNS[column],
            value: token.to_string(),
        },
    })?;
    // -1 (and anything below) marks "not reported"
    if !value.is_finite() || value <= -1.0 {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

fn optional_category(token: &str) -> Option<String> {
    if token.is_empty() || token == "-1" {
        None
    } else {
        Some(token.to_string())
    }
}

impl Record {
    /// Parses one whitespace-separated data row.
    ///
    /// `row` is only used to annotate errors.
    pub fn parse(row: usize, line: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != FIELD_COUNT {
            return Err(ParseError {
                row,
                field: None,
                kind: ParseErrorKind::FieldCount {
                    expected: FIELD_COUNT,
                    found: fields.len(),
                },
            });
        }

        let invalid = |column: usize| ParseError {
            row,
            field: Some(COLUMNS[column]),
            kind: ParseErrorKind::InvalidNumber {
                field: COLUMNS[column],
                value: fields[column].to_string(),
            },
        };

        let id: i64 = fields[0].parse().map_err(|_| invalid(0))?;
        let cycles_trying: u32 = fields[7].parse().map_err(|_| invalid(7))?;
        if cycles_trying == 0 {
            return Err(ParseError {
                row,
                field: Some(COLUMNS[7]),
                kind: ParseErrorKind::NoCycles,
            });
        }
        let outcome = Outcome::parse(fields[8]).ok_or_else(|| ParseError {
            row,
            field: Some(COLUMNS[8]),
            kind: ParseErrorKind::InvalidOutcome {
                value: fields[8].to_string(),
            },
        })?;

        Ok(Record {
            id,
            bmi: optional_number(row, 1, fields[1])?,
            age: optional_number(row, 2, fields[2])?,
            country: optional_category(fields[3]),
            pregnancies_before: parse_pregnancies_before(fields[4]),
            education: optional_category(fields[5]),
            sleep_pattern: optional_category(fields[6]),
            cycles_trying,
            outcome,
            dedication: optional_number(row, 9, fields[9])?,
            average_cycle_length: optional_number(row, 10, fields[10])?,
            cycle_length_std: optional_number(row, 11, fields[11])?,
            cycle_regularity: optional_category(fields[12]),
            intercourse_frequency: optional_number(row, 13, fields[13])?,
        })
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Read-only collection of parsed records.
///
/// Built once by [`RecordStore::load`]; there is no way to mutate it
/// afterwards, so it can be shared freely across threads.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

/// Result of [`RecordStore::load`].
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub store: RecordStore,
    /// Number of rows rejected with a [`ParseError`].
    pub skipped: usize,
}

impl RecordStore {
    /// Parses every data row, skipping (and logging) malformed ones.
    ///
    /// Rows that are blank after trimming are ignored without being
    /// counted as skipped.
    pub fn load<I, S>(rows: I) -> LoadOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut records = Vec::new();
        let mut skipped = 0;

        for (row, line) in rows.into_iter().enumerate() {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }
            match Record::parse(row, line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(row = err.row, field = err.field.unwrap_or("-"), "skipping row: {err}");
                    skipped += 1;
                }
            }
        }

        debug!(records = records.len(), skipped, "record store loaded");
        LoadOutcome {
            store: RecordStore { records },
            skipped,
        }
    }

    /// Builds a store from records parsed elsewhere.
    ///
    /// Records with `cycles_trying == 0` break the store invariant and are
    /// dropped with a warning.
    pub fn from_records(records: Vec<Record>) -> Self {
        let before = records.len();
        let records: Vec<Record> = records.into_iter().filter(|r| r.cycles_trying >= 1).collect();
        if records.len() < before {
            warn!(dropped = before - records.len(), "records without any tried cycle dropped");
        }
        Self { records }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    // Per-field accessors. An out-of-range index and an absent field both
    // come back as `None`.

    pub fn id(&self, index: usize) -> Option<i64> {
        self.get(index).map(|r| r.id)
    }

    pub fn bmi(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|r| r.bmi)
    }

    pub fn age(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|r| r.age)
    }

    pub fn country(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|r| r.country.as_deref())
    }

    pub fn pregnancies_before(&self, index: usize) -> Option<u8> {
        self.get(index).and_then(|r| r.pregnancies_before)
    }

    pub fn education(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|r| r.education.as_deref())
    }

    pub fn sleep_pattern(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|r| r.sleep_pattern.as_deref())
    }

    pub fn cycles_trying(&self, index: usize) -> Option<u32> {
        self.get(index).map(|r| r.cycles_trying)
    }

    pub fn outcome(&self, index: usize) -> Option<Outcome> {
        self.get(index).map(|r| r.outcome)
    }

    pub fn dedication(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|r| r.dedication)
    }

    pub fn average_cycle_length(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|r| r.average_cycle_length)
    }

    pub fn cycle_length_std(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|r| r.cycle_length_std)
    }

    pub fn cycle_regularity(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|r| r.cycle_regularity.as_deref())
    }

    pub fn intercourse_frequency(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|r| r.intercourse_frequency)
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn numeric_fields_round_trip(
            bmi in prop_oneof![Just(-1.0_f64), 10.0_f64..50.0],
            age in prop_oneof![Just(-1.0_f64), 18.0_f64..50.0],
            cycles in 1_u32..30,
        ) {
            let line = format!(
                "1 {bmi} {age} SE No,never Uni Regular {cycles} pregnant -1 28 2 regular 0.1"
            );
            let r = Record::parse(0, &line).expect("valid row");
            if bmi == -1.0 {
                prop_assert_eq!(r.bmi, None);
            } else {
                prop_assert_eq!(r.bmi, Some(bmi));
            }
            if age == -1.0 {
                prop_assert_eq!(r.age, None);
            } else {
                prop_assert_eq!(r.age, Some(age));
            }
            prop_assert_eq!(r.cycles_trying, cycles);
        }
    }
}
