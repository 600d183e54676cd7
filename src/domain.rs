use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

/// Largest page the summary endpoint serves in one response.
pub const MAX_RECORDS_CEILING: usize = 10_000;
pub const DEFAULT_LIMIT: usize = 500;
pub const DEFAULT_SEQ_RANGE: &str = "1:3000";

static LENGTH_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*:\s*(\d+)\s*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxonomyId(u64);

impl TaxonomyId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaxonomyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxonomyId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(KiraError::InvalidTaxonomyId(value.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(Self)
            .map_err(|_| KiraError::InvalidTaxonomyId(value.to_string()))
    }
}

/// A single taxon to query. The label is the text the caller supplied and
/// is what results are keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonInput {
    Name(String),
    Id { id: TaxonomyId, label: String },
}

impl TaxonInput {
    pub fn name(value: impl Into<String>) -> Self {
        TaxonInput::Name(value.into())
    }

    pub fn id(id: TaxonomyId) -> Self {
        TaxonInput::Id {
            id,
            label: id.to_string(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TaxonInput::Name(name) => name,
            TaxonInput::Id { label, .. } => label,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            TaxonInput::Name(name) => Some(name),
            TaxonInput::Id { .. } => None,
        }
    }

    /// Builds the query list from the two mutually exclusive input forms.
    /// Fails before any network activity when neither or both are given.
    pub fn from_args(names: &[String], ids: &[String]) -> Result<Vec<TaxonInput>, KiraError> {
        match (names.is_empty(), ids.is_empty()) {
            (true, true) => Err(KiraError::InvalidTaxonInput(
                "no taxon names or ids supplied".to_string(),
            )),
            (false, false) => Err(KiraError::InvalidTaxonInput(
                "taxon names and ids are mutually exclusive".to_string(),
            )),
            (false, true) => names
                .iter()
                .map(|name| {
                    let trimmed = name.trim();
                    if trimmed.is_empty() {
                        return Err(KiraError::InvalidTaxonInput(
                            "empty taxon name".to_string(),
                        ));
                    }
                    Ok(TaxonInput::Name(trimmed.to_string()))
                })
                .collect(),
            (true, false) => ids
                .iter()
                .map(|raw| {
                    let id: TaxonomyId = raw.parse()?;
                    Ok(TaxonInput::Id {
                        id,
                        label: raw.trim().to_string(),
                    })
                })
                .collect(),
        }
    }
}

/// Inclusive sequence-length bounds, written `MIN:MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LengthRange {
    min: u64,
    max: u64,
}

impl LengthRange {
    pub fn new(min: u64, max: u64) -> Result<Self, KiraError> {
        if min > max {
            return Err(KiraError::InvalidLengthRange(format!("{min}:{max}")));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }
}

impl Default for LengthRange {
    fn default() -> Self {
        Self { min: 1, max: 3000 }
    }
}

impl fmt::Display for LengthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.min, self.max)
    }
}

impl FromStr for LengthRange {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let caps = LENGTH_RANGE_RE
            .captures(value)
            .ok_or_else(|| KiraError::InvalidLengthRange(value.to_string()))?;
        let min = caps[1]
            .parse::<u64>()
            .map_err(|_| KiraError::InvalidLengthRange(value.to_string()))?;
        let max = caps[2]
            .parse::<u64>()
            .map_err(|_| KiraError::InvalidLengthRange(value.to_string()))?;
        Self::new(min, max).map_err(|_| KiraError::InvalidLengthRange(value.to_string()))
    }
}

impl TryFrom<String> for LengthRange {
    type Error = KiraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LengthRange> for String {
    fn from(value: LengthRange) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConstraints {
    pub seq_range: LengthRange,
    /// Forwarded as-is; the remote service truncates above
    /// [`MAX_RECORDS_CEILING`].
    pub max_records: usize,
    pub filter: Option<String>,
    pub keep_hypothetical: bool,
}

impl Default for SearchConstraints {
    fn default() -> Self {
        Self {
            seq_range: LengthRange::default(),
            max_records: DEFAULT_LIMIT,
            filter: None,
            keep_hypothetical: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceRecordId(String);

impl SequenceRecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SequenceRecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SequenceRecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SequenceRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of a [`TaxonResult`]. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceRecord {
    #[serde(rename = "taxon")]
    pub species_label: String,
    pub length: u64,
    #[serde(rename = "gene_desc")]
    pub gene_description: String,
    #[serde(rename = "acc_no")]
    pub accession_number: String,
    #[serde(rename = "gi_no")]
    pub numeric_record_id: u64,
}

/// Records found for one taxon. Never absent: a taxon with no hits has an
/// empty result with the same columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TaxonResult {
    records: Vec<SequenceRecord>,
}

impl TaxonResult {
    pub const COLUMNS: [&'static str; 5] = ["taxon", "length", "gene_desc", "acc_no", "gi_no"];

    pub fn new(records: Vec<SequenceRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SequenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug)]
pub struct TaxonEntry {
    pub label: String,
    pub outcome: Result<TaxonResult, KiraError>,
}

/// Shape of a pipeline run: a bare result for one input, labelled entries
/// (in input order, duplicates kept) for several.
#[derive(Debug)]
pub enum BatchResult {
    Single { label: String, result: TaxonResult },
    Multiple(Vec<TaxonEntry>),
}

impl BatchResult {
    pub fn len(&self) -> usize {
        match self {
            BatchResult::Single { .. } => 1,
            BatchResult::Multiple(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First successful result recorded under `label`.
    pub fn get(&self, label: &str) -> Option<&TaxonResult> {
        match self {
            BatchResult::Single {
                label: own,
                result,
            } => (own == label).then_some(result),
            BatchResult::Multiple(entries) => entries
                .iter()
                .filter(|entry| entry.label == label)
                .find_map(|entry| entry.outcome.as_ref().ok()),
        }
    }

    pub fn failures(&self) -> Vec<(&str, &KiraError)> {
        match self {
            BatchResult::Single { .. } => Vec::new(),
            BatchResult::Multiple(entries) => entries
                .iter()
                .filter_map(|entry| {
                    entry
                        .outcome
                        .as_ref()
                        .err()
                        .map(|err| (entry.label.as_str(), err))
                })
                .collect(),
        }
    }
}
