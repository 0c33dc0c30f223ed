use std::path::PathBuf;

use crate::report::PayloadSchema;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("required field missing from upstream payload: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("run id is not part of the ingested batch: {0}")]
    UnknownRun(String),

    #[error("report already holds a {existing:?} payload; refusing to ingest {incoming:?}")]
    SchemaMismatch {
        existing: PayloadSchema,
        incoming: PayloadSchema,
    },

    #[error("expected either a canary config id or canary config object to be present")]
    MissingConfig,
}
