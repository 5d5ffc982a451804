use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Cannot open {source_name} source '{path}': {cause}")]
    SourceUnavailable {
        source_name: String,
        path: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("Cannot read {source_name} source: {cause}")]
    SourceRead {
        source_name: String,
        #[source]
        cause: csv::Error,
    },

    #[error(
        "Incomplete debug context: missing {}. Supply all of reimbursements, \
         returns_to_fba and date_range, or none of them",
        .missing.join(", ")
    )]
    IncompleteDebugContext { missing: Vec<&'static str> },

    #[error("Malformed row in {source_name} source at line {line}: {detail}")]
    MalformedRow {
        source_name: String,
        line: u64,
        detail: String,
    },

    #[error("Missing required configuration value '{field}'")]
    MissingConfig { field: &'static str },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReconResult<T> = Result<T, ReconError>;
