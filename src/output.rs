use std::io::{self, Write};

use clap::ValueEnum;
use serde::Serialize;
use tracing::warn;

use crate::domain::{BatchResult, SequenceRecord, TaxonResult};
use crate::error::KiraError;
use crate::pipeline::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Tsv,
}

#[derive(Serialize)]
struct SingleDocument<'a> {
    query: &'a str,
    retrieved_at: String,
    columns: [&'static str; 5],
    records: &'a TaxonResult,
}

#[derive(Serialize)]
struct BatchDocument<'a> {
    retrieved_at: String,
    columns: [&'static str; 5],
    taxa: Vec<TaxonDocument<'a>>,
}

#[derive(Serialize)]
struct TaxonDocument<'a> {
    query: &'a str,
    records: Option<&'a TaxonResult>,
    error: Option<String>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn render(batch: &BatchResult) -> Result<String, KiraError> {
        let retrieved_at = chrono::Utc::now().to_rfc3339();
        let json = match batch {
            BatchResult::Single { label, result } => serde_json::to_string_pretty(&SingleDocument {
                query: label,
                retrieved_at,
                columns: TaxonResult::COLUMNS,
                records: result,
            }),
            BatchResult::Multiple(entries) => serde_json::to_string_pretty(&BatchDocument {
                retrieved_at,
                columns: TaxonResult::COLUMNS,
                taxa: entries
                    .iter()
                    .map(|entry| TaxonDocument {
                        query: &entry.label,
                        records: entry.outcome.as_ref().ok(),
                        error: entry.outcome.as_ref().err().map(|err| err.to_string()),
                    })
                    .collect(),
            }),
        };
        json.map_err(|err| KiraError::Output(err.to_string()))
    }

    pub fn write<W: Write>(batch: &BatchResult, mut writer: W) -> Result<(), KiraError> {
        let json = Self::render(batch)?;
        writer
            .write_all(json.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|err| KiraError::Output(err.to_string()))
    }
}

/// Tab-separated rows under the fixed column header. Batches get a leading
/// `query` column; failed taxa contribute no rows.
pub struct TsvOutput;

impl TsvOutput {
    pub fn write<W: Write>(batch: &BatchResult, writer: W) -> Result<(), KiraError> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);

        match batch {
            BatchResult::Single { result, .. } => {
                out.write_record(TaxonResult::COLUMNS).map_err(csv_error)?;
                for record in result.records() {
                    out.write_record(record_fields(record)).map_err(csv_error)?;
                }
            }
            BatchResult::Multiple(entries) => {
                let mut header = vec!["query"];
                header.extend(TaxonResult::COLUMNS);
                out.write_record(&header).map_err(csv_error)?;
                for entry in entries {
                    let Ok(result) = &entry.outcome else {
                        continue;
                    };
                    for record in result.records() {
                        let mut row = vec![entry.label.clone()];
                        row.extend(record_fields(record));
                        out.write_record(&row).map_err(csv_error)?;
                    }
                }
            }
        }
        out.flush().map_err(|err| KiraError::Output(err.to_string()))
    }
}

fn record_fields(record: &SequenceRecord) -> [String; 5] {
    [
        record.species_label.clone(),
        record.length.to_string(),
        record.gene_description.clone(),
        record.accession_number.clone(),
        record.numeric_record_id.to_string(),
    ]
}

fn csv_error(err: csv::Error) -> KiraError {
    KiraError::Output(err.to_string())
}

/// Verbose narration on stderr.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        let mut stderr = io::stderr().lock();
        let written = match event.elapsed {
            Some(elapsed) => writeln!(
                stderr,
                "[{}] {} ({:.1}s)",
                event.label,
                event.message,
                elapsed.as_secs_f64()
            ),
            None => writeln!(stderr, "[{}] {}", event.label, event.message),
        };
        drop(stderr);
        if let Err(err) = written {
            warn!(taxon = %event.label, error = %err, "progress line not written");
        }
    }
}
