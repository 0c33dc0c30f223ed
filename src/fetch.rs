use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::FetchError;
use crate::model::{
    CanaryAnalysisExecutionStatusResponse, CanaryConfig, CanaryExecutionStatusResponse,
    MetricSetPair, UpstreamPayload,
};
use crate::report::PayloadSchema;
use crate::util::sha256_bytes;

const EXECUTION_KIND: &str = "canary execution";
const ANALYSIS_KIND: &str = "canary analysis execution";

/// Source of raw upstream payloads for a report.
pub trait CanaryApi {
    fn fetch_run_status(
        &self,
        execution_id: &str,
    ) -> Result<CanaryExecutionStatusResponse, FetchError>;

    fn fetch_analysis_status(
        &self,
        execution_id: &str,
    ) -> Result<CanaryAnalysisExecutionStatusResponse, FetchError>;

    fn fetch_config(&self, config_id: &str) -> Result<CanaryConfig, FetchError>;

    fn fetch_metric_pairs(&self, list_id: &str) -> Result<Vec<MetricSetPair>, FetchError>;
}

/// A status payload with the file it came from and the digest of its bytes.
#[derive(Debug)]
pub struct StatusDocument {
    pub payload: UpstreamPayload,
    pub path: PathBuf,
    pub sha256: String,
}

/// Reads payloads previously saved under a cache directory:
/// `executions/`, `analyses/`, `configs/` and `metric-pairs/`, one
/// `<id>.json` file per object.
#[derive(Debug, Clone)]
pub struct FileCanaryApi {
    root: PathBuf,
}

impl FileCanaryApi {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads the status payload once, decoding and hashing the same bytes.
    pub fn fetch_status_document(
        &self,
        schema: PayloadSchema,
        execution_id: &str,
    ) -> Result<StatusDocument, FetchError> {
        let (path, raw) = match schema {
            PayloadSchema::SingleRun => self.read(EXECUTION_KIND, "executions", execution_id)?,
            PayloadSchema::RunBatch => self.read(ANALYSIS_KIND, "analyses", execution_id)?,
        };
        let payload = match schema {
            PayloadSchema::SingleRun => UpstreamPayload::SingleRun(Box::new(decode(&path, &raw)?)),
            PayloadSchema::RunBatch => UpstreamPayload::RunBatch(Box::new(decode(&path, &raw)?)),
        };

        Ok(StatusDocument {
            payload,
            sha256: sha256_bytes(&raw),
            path,
        })
    }

    fn object_path(&self, kind_dir: &str, id: &str) -> PathBuf {
        self.root.join(kind_dir).join(format!("{id}.json"))
    }

    fn read(
        &self,
        kind: &'static str,
        kind_dir: &str,
        id: &str,
    ) -> Result<(PathBuf, Vec<u8>), FetchError> {
        let path = self.object_path(kind_dir, id);
        match fs::read(&path) {
            Ok(raw) => {
                debug!(kind, id, bytes = raw.len(), "read cached payload");
                Ok((path, raw))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(FetchError::NotFound {
                kind,
                id: id.to_string(),
            }),
            Err(source) => Err(FetchError::Io { path, source }),
        }
    }

    fn load<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        kind_dir: &str,
        id: &str,
    ) -> Result<T, FetchError> {
        let (path, raw) = self.read(kind, kind_dir, id)?;
        decode(&path, &raw)
    }
}

fn decode<T: DeserializeOwned>(path: &Path, raw: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(raw).map_err(|source| FetchError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

impl CanaryApi for FileCanaryApi {
    fn fetch_run_status(
        &self,
        execution_id: &str,
    ) -> Result<CanaryExecutionStatusResponse, FetchError> {
        self.load(EXECUTION_KIND, "executions", execution_id)
    }

    fn fetch_analysis_status(
        &self,
        execution_id: &str,
    ) -> Result<CanaryAnalysisExecutionStatusResponse, FetchError> {
        self.load(ANALYSIS_KIND, "analyses", execution_id)
    }

    fn fetch_config(&self, config_id: &str) -> Result<CanaryConfig, FetchError> {
        self.load("canary config", "configs", config_id)
    }

    fn fetch_metric_pairs(&self, list_id: &str) -> Result<Vec<MetricSetPair>, FetchError> {
        self.load("metric set pair list", "metric-pairs", list_id)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::{CanaryApi, FileCanaryApi};
    use crate::error::FetchError;
    use crate::model::UpstreamPayload;
    use crate::report::PayloadSchema;
    use crate::util::sha256_bytes;

    fn write(root: &std::path::Path, relative: &str, body: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("fixture path has a parent"))
            .expect("fixture dir should be creatable");
        fs::write(path, body).expect("fixture should be writable");
    }

    #[test]
    fn fetch_metric_pairs_reads_cached_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = json!([
            {"id": "m1", "name": "cpu", "values": {"control": [1.0], "experiment": [2.0]}},
            {"id": "m2", "name": "errors"}
        ]);
        write(dir.path(), "metric-pairs/list-a.json", &body.to_string());

        let api = FileCanaryApi::new(dir.path());
        let pairs = api.fetch_metric_pairs("list-a").expect("list should load");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].id, "m1");
        assert_eq!(pairs[1].name, "errors");
    }

    #[test]
    fn missing_object_is_reported_as_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let api = FileCanaryApi::new(dir.path());

        let err = api.fetch_config("absent").expect_err("config should be missing");
        assert!(matches!(
            err,
            FetchError::NotFound { kind: "canary config", ref id } if id == "absent"
        ));
    }

    #[test]
    fn malformed_payload_is_reported_as_decode_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "executions/exec-1.json", "{not json");

        let api = FileCanaryApi::new(dir.path());
        let err = api
            .fetch_run_status("exec-1")
            .expect_err("payload should not decode");
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn sparse_run_status_decodes_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "executions/exec-2.json", r#"{"complete": false}"#);

        let api = FileCanaryApi::new(dir.path());
        let response = api.fetch_run_status("exec-2").expect("sparse payload");
        assert!(!response.complete);
        assert!(response.result.is_none());
        assert!(response.canary_execution_request.is_none());
    }

    #[test]
    fn status_document_hashes_the_bytes_it_decoded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = json!({
            "complete": true,
            "canaryAnalysisExecutionRequest": {"lifetimeDurationMins": 30},
            "canaryAnalysisExecutionResult": {"canaryExecutionResults": [
                {"executionId": "r1"}
            ]}
        })
        .to_string();
        write(dir.path(), "analyses/scape-1.json", &body);

        let api = FileCanaryApi::new(dir.path());
        let document = api
            .fetch_status_document(PayloadSchema::RunBatch, "scape-1")
            .expect("batch document");
        assert_eq!(document.sha256, sha256_bytes(body.as_bytes()));
        assert_eq!(document.path, dir.path().join("analyses/scape-1.json"));
        assert!(matches!(document.payload, UpstreamPayload::RunBatch(_)));
    }

    #[test]
    fn missing_status_document_names_the_schema_kind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let api = FileCanaryApi::new(dir.path());

        let err = api
            .fetch_status_document(PayloadSchema::SingleRun, "exec-9")
            .expect_err("no document");
        assert!(matches!(
            err,
            FetchError::NotFound { kind: "canary execution", ref id } if id == "exec-9"
        ));
    }
}
