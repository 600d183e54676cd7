use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid taxon input: {0}")]
    #[diagnostic(help("pass either taxon names or taxonomy ids, not both"))]
    InvalidTaxonInput(String),

    #[error("invalid taxonomy id: {0}")]
    InvalidTaxonomyId(String),

    #[error("invalid sequence length range: {0} (expected MIN:MAX)")]
    InvalidLengthRange(String),

    #[error("no taxonomy id found for {0}")]
    UnresolvedTaxon(String),

    #[error("Entrez request failed: {0}")]
    EntrezHttp(String),

    #[error("Entrez returned status {status}: {message}")]
    EntrezStatus { status: u16, message: String },

    #[error("Entrez rejected the query: {0}")]
    EntrezQuery(String),

    #[error("unexpected Entrez response: {0}")]
    MalformedResponse(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("failed to write output: {0}")]
    Output(String),
}
