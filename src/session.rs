//! Report loading: fetch, resolve config, ingest, attach metric pairs, select.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{FetchError, ReportError};
use crate::fetch::CanaryApi;
use crate::model::{
    CanaryAnalysisExecutionStatusResponse, CanaryConfig, CanaryExecutionStatusResponse, KvMap,
    UpstreamPayload,
};
use crate::report::{PayloadSchema, SharedReportStore};

const TERMINAL_STATUS: &str = "terminal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Running,
    Complete,
    Terminal,
}

impl ExecutionPhase {
    pub fn classify(complete: bool, status: Option<&str>) -> Self {
        match (complete, status) {
            (false, _) => Self::Running,
            (true, Some(status)) if status.eq_ignore_ascii_case(TERMINAL_STATUS) => Self::Terminal,
            (true, _) => Self::Complete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Terminal => "terminal",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub execution_id: String,
    pub run_id: Option<String>,
    pub metric_id: Option<String>,
    pub overview: bool,
}

pub fn fetch_payload(
    api: &dyn CanaryApi,
    schema: PayloadSchema,
    execution_id: &str,
) -> Result<UpstreamPayload, FetchError> {
    let fetched = match schema {
        PayloadSchema::SingleRun => api
            .fetch_run_status(execution_id)
            .map(|response| UpstreamPayload::SingleRun(Box::new(response))),
        PayloadSchema::RunBatch => api
            .fetch_analysis_status(execution_id)
            .map(|response| UpstreamPayload::RunBatch(Box::new(response))),
    };

    fetched.inspect_err(|err| {
        error!(
            execution_id,
            error = %err,
            "failed to fetch the execution status response"
        );
    })
}

pub fn execution_phase(payload: &UpstreamPayload) -> ExecutionPhase {
    match payload {
        UpstreamPayload::SingleRun(response) => {
            ExecutionPhase::classify(response.complete, response.status.as_deref())
        }
        UpstreamPayload::RunBatch(response) => {
            ExecutionPhase::classify(response.complete, response.execution_status.as_deref())
        }
    }
}

pub fn application(payload: &UpstreamPayload) -> Option<&str> {
    match payload {
        UpstreamPayload::SingleRun(response) => response.application.as_deref(),
        UpstreamPayload::RunBatch(response) => response.application.as_deref(),
    }
}

/// Uses the embedded config when present, otherwise fetches it by id.
pub fn resolve_config(
    api: &dyn CanaryApi,
    payload: &UpstreamPayload,
) -> Result<CanaryConfig, ReportError> {
    let (embedded, config_id) = match payload {
        UpstreamPayload::SingleRun(response) => {
            (response.config.as_ref(), response.canary_config_id.as_deref())
        }
        UpstreamPayload::RunBatch(response) => (
            response.canary_config.as_ref(),
            response.canary_config_id.as_deref(),
        ),
    };

    if let Some(config) = embedded {
        return Ok(config.clone());
    }

    let config_id = config_id.ok_or(ReportError::MissingConfig)?;
    info!(config_id, "fetching canary config");
    Ok(api.fetch_config(config_id)?)
}

/// Fetches every metric-pair list the payload refers to.
pub fn attach_metric_pairs(
    api: &dyn CanaryApi,
    payload: &UpstreamPayload,
    store: &SharedReportStore,
) -> Result<(), FetchError> {
    match payload {
        UpstreamPayload::SingleRun(response) => attach_single_run_pairs(api, response, store),
        UpstreamPayload::RunBatch(response) => attach_run_batch_pairs(api, response, store),
    }
}

fn attach_single_run_pairs(
    api: &dyn CanaryApi,
    response: &CanaryExecutionStatusResponse,
    store: &SharedReportStore,
) -> Result<(), FetchError> {
    let Some(list_id) = response.metric_set_pair_list_id.as_deref() else {
        warn!("execution has no metric set pair list id; metric pairs left empty");
        return Ok(());
    };

    let pairs = api.fetch_metric_pairs(list_id)?;
    info!(list_id, pairs = pairs.len(), "fetched metric set pair list");
    store.set_metric_pair_list(pairs);
    Ok(())
}

fn attach_run_batch_pairs(
    api: &dyn CanaryApi,
    response: &CanaryAnalysisExecutionStatusResponse,
    store: &SharedReportStore,
) -> Result<(), FetchError> {
    let runs = response
        .canary_analysis_execution_result
        .as_ref()
        .map(|result| result.canary_execution_results.as_slice())
        .unwrap_or_default();

    let mut lists = KvMap::new();
    for list_id in runs
        .iter()
        .filter_map(|run| run.metric_set_pair_list_id.as_deref())
    {
        if lists.contains_key(list_id) {
            continue;
        }
        let pairs = api.fetch_metric_pairs(list_id)?;
        lists.insert(list_id.to_string(), pairs);
    }

    info!(lists = lists.len(), "fetched metric set pair lists");
    store.set_metric_pair_list_map(lists);
    Ok(())
}

/// Builds a report session for one fetched execution payload.
///
/// Metric pairs are only fetched for completed executions. A running or
/// terminal execution that has no judgement yet leaves the report empty
/// instead of failing.
pub fn load_report(
    api: &dyn CanaryApi,
    payload: &UpstreamPayload,
    request: &ReportRequest,
    store: &SharedReportStore,
) -> Result<ExecutionPhase, ReportError> {
    let phase = execution_phase(payload);
    info!(
        execution_id = %request.execution_id,
        application = %application(payload).unwrap_or_default(),
        phase = phase.as_str(),
        "loaded execution status"
    );

    let config = resolve_config(api, payload)?;
    match store.ingest(payload) {
        Ok(()) => {}
        Err(ReportError::MissingField(field)) if phase != ExecutionPhase::Complete => {
            warn!(
                field,
                phase = phase.as_str(),
                "execution has no judgement yet; report left empty"
            );
            return Ok(phase);
        }
        Err(err) => return Err(err),
    }
    store.set_config(config);

    if phase == ExecutionPhase::Complete {
        attach_metric_pairs(api, payload, store)?;
    } else {
        warn!(phase = phase.as_str(), "execution not complete; skipping metric pairs");
    }

    if let Some(run_id) = request.run_id.as_deref() {
        store.select_run(run_id)?;
    }
    if let Some(metric_id) = request.metric_id.as_deref() {
        store.select_metric(metric_id);
    }
    if request.overview {
        store.show_overview();
    }

    Ok(phase)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::{ExecutionPhase, ReportRequest, fetch_payload, load_report, resolve_config};
    use crate::error::{FetchError, ReportError};
    use crate::fetch::CanaryApi;
    use crate::model::{
        CanaryAnalysisExecutionStatusResponse, CanaryConfig, CanaryExecutionStatusResponse,
        MetricSetPair, UpstreamPayload,
    };
    use crate::report::{ClassificationLabel, PayloadSchema, SharedReportStore};

    #[derive(Default)]
    struct StubApi {
        executions: BTreeMap<String, serde_json::Value>,
        analyses: BTreeMap<String, serde_json::Value>,
        configs: BTreeMap<String, serde_json::Value>,
        metric_pairs: BTreeMap<String, serde_json::Value>,
        config_fetches: RefCell<Vec<String>>,
    }

    fn lookup<T: serde::de::DeserializeOwned>(
        table: &BTreeMap<String, serde_json::Value>,
        kind: &'static str,
        id: &str,
    ) -> Result<T, FetchError> {
        let value = table.get(id).ok_or_else(|| FetchError::NotFound {
            kind,
            id: id.to_string(),
        })?;
        Ok(serde_json::from_value(value.clone()).expect("stub fixture should decode"))
    }

    impl CanaryApi for StubApi {
        fn fetch_run_status(
            &self,
            execution_id: &str,
        ) -> Result<CanaryExecutionStatusResponse, FetchError> {
            lookup(&self.executions, "canary execution", execution_id)
        }

        fn fetch_analysis_status(
            &self,
            execution_id: &str,
        ) -> Result<CanaryAnalysisExecutionStatusResponse, FetchError> {
            lookup(&self.analyses, "canary analysis execution", execution_id)
        }

        fn fetch_config(&self, config_id: &str) -> Result<CanaryConfig, FetchError> {
            self.config_fetches.borrow_mut().push(config_id.to_string());
            lookup(&self.configs, "canary config", config_id)
        }

        fn fetch_metric_pairs(&self, list_id: &str) -> Result<Vec<MetricSetPair>, FetchError> {
            lookup(&self.metric_pairs, "metric set pair list", list_id)
        }
    }

    fn load(
        api: &StubApi,
        schema: PayloadSchema,
        request: &ReportRequest,
        store: &SharedReportStore,
    ) -> Result<ExecutionPhase, ReportError> {
        let payload = fetch_payload(api, schema, &request.execution_id)?;
        load_report(api, &payload, request, store)
    }

    fn single_run_body() -> serde_json::Value {
        json!({
            "application": "checkout",
            "complete": true,
            "status": "succeeded",
            "canaryConfigId": "cfg-1",
            "metricSetPairListId": "list-1",
            "result": {
                "judgeResult": {
                    "results": [
                        {"id": "m1", "name": "cpu", "classification": "Pass", "groups": ["system"]},
                        {"id": "m2", "name": "errors", "classification": "High", "groups": ["app"]}
                    ],
                    "groupScores": [{"name": "system", "score": 100.0}]
                }
            },
            "canaryExecutionRequest": {
                "scopes": {"default": {"controlScope": {
                    "start": "2024-01-01T00:00:00Z",
                    "end": "2024-01-01T01:00:00Z"
                }}},
                "thresholds": {"marginal": 50.0, "pass": 75.0}
            }
        })
    }

    fn stub_with_single_run() -> StubApi {
        let mut api = StubApi::default();
        api.executions.insert("exec-1".to_string(), single_run_body());
        api.configs
            .insert("cfg-1".to_string(), json!({"name": "checkout-config"}));
        api.metric_pairs.insert(
            "list-1".to_string(),
            json!([{"id": "m1", "name": "cpu"}, {"id": "m2", "name": "errors"}]),
        );
        api
    }

    #[test]
    fn execution_phase_distinguishes_running_terminal_and_complete() {
        assert_eq!(ExecutionPhase::classify(false, Some("running")), ExecutionPhase::Running);
        assert_eq!(ExecutionPhase::classify(true, Some("terminal")), ExecutionPhase::Terminal);
        assert_eq!(ExecutionPhase::classify(true, Some("succeeded")), ExecutionPhase::Complete);
        assert_eq!(ExecutionPhase::classify(true, None), ExecutionPhase::Complete);
    }

    #[test]
    fn load_report_fetches_config_and_metric_pairs_for_single_run() {
        let api = stub_with_single_run();
        let store = SharedReportStore::default();
        let request = ReportRequest {
            execution_id: "exec-1".to_string(),
            metric_id: Some("m2".to_string()),
            ..ReportRequest::default()
        };

        let phase = load(&api, PayloadSchema::SingleRun, &request, &store)
            .expect("report should load");
        assert_eq!(phase, ExecutionPhase::Complete);
        assert_eq!(api.config_fetches.borrow().as_slice(), ["cfg-1"]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.lifetime_minutes, 60);
        assert_eq!(snapshot.classification_counts[&ClassificationLabel::Fail], 1);
        assert_eq!(snapshot.metric_pair_ids, vec!["m1", "m2"]);
        assert_eq!(
            snapshot.selected_metric_pair.map(|pair| pair.name),
            Some("errors".to_string())
        );

        let handoff = store
            .read(|report| report.config_editor_handoff())
            .expect("config and request should both be present");
        assert_eq!(handoff.config.name.as_deref(), Some("checkout-config"));
    }

    #[test]
    fn embedded_config_skips_the_config_fetch() {
        let api = StubApi::default();
        let mut body = single_run_body();
        body["config"] = json!({"name": "inline"});
        let response: CanaryExecutionStatusResponse =
            serde_json::from_value(body).expect("fixture");

        let config = resolve_config(&api, &UpstreamPayload::SingleRun(Box::new(response)))
            .expect("embedded config");
        assert_eq!(config.name.as_deref(), Some("inline"));
        assert!(api.config_fetches.borrow().is_empty());
    }

    #[test]
    fn missing_config_and_config_id_is_rejected() {
        let api = StubApi::default();
        let mut body = single_run_body();
        body.as_object_mut()
            .expect("object fixture")
            .remove("canaryConfigId");
        let response: CanaryExecutionStatusResponse =
            serde_json::from_value(body).expect("fixture");

        let err = resolve_config(&api, &UpstreamPayload::SingleRun(Box::new(response)))
            .expect_err("neither config nor id");
        assert!(matches!(err, ReportError::MissingConfig));
    }

    #[test]
    fn fetch_failure_is_surfaced_unchanged() {
        let api = StubApi::default();
        let store = SharedReportStore::default();
        let request = ReportRequest {
            execution_id: "missing".to_string(),
            ..ReportRequest::default()
        };

        let err = load(&api, PayloadSchema::SingleRun, &request, &store)
            .expect_err("unknown execution");
        assert!(matches!(
            err,
            ReportError::Fetch(FetchError::NotFound { kind: "canary execution", .. })
        ));
        assert_eq!(store.snapshot().schema, None);
    }

    #[test]
    fn load_report_builds_id_keyed_pairs_for_batch_and_honours_run_selection() {
        let mut api = StubApi::default();
        api.analyses.insert(
            "scape-1".to_string(),
            json!({
                "complete": true,
                "executionStatus": "SUCCEEDED",
                "canaryConfig": {"name": "batch-config"},
                "startTimeIso": "2024-01-01T00:00:00Z",
                "endTimeIso": "2024-01-01T00:45:00Z",
                "canaryAnalysisExecutionRequest": {"lifetimeDurationMins": 90},
                "canaryAnalysisExecutionResult": {"canaryExecutionResults": [
                    {"executionId": "r1", "metricSetPairListId": "list-a",
                     "result": {"judgeResult": {"results": [
                        {"id": "a1", "classification": "Pass", "groups": ["g"]}]}}},
                    {"executionId": "r2", "metricSetPairListId": "list-b",
                     "result": {"judgeResult": {"results": [
                        {"id": "b1", "classification": "Nodata", "groups": ["g"]}]}}}
                ]}
            }),
        );
        api.metric_pairs
            .insert("list-a".to_string(), json!([{"id": "a1"}]));
        api.metric_pairs
            .insert("list-b".to_string(), json!([{"id": "b1"}]));

        let store = SharedReportStore::default();
        let request = ReportRequest {
            execution_id: "scape-1".to_string(),
            run_id: Some("r1".to_string()),
            ..ReportRequest::default()
        };

        load(&api, PayloadSchema::RunBatch, &request, &store).expect("batch report");
        let snapshot = store.snapshot();
        assert_eq!(snapshot.selected_run_id.as_deref(), Some("r1"));
        assert_eq!(snapshot.metric_pair_ids, vec!["a1"]);
        assert_eq!(snapshot.classification_counts[&ClassificationLabel::Pass], 1);
        assert_eq!(snapshot.lifetime_minutes, 45);
        assert!(store.read(|report| report.config_editor_handoff()).is_none());
    }

    #[test]
    fn running_execution_is_ingested_without_metric_pairs() {
        let mut api = stub_with_single_run();
        let mut body = single_run_body();
        body["complete"] = json!(false);
        api.executions.insert("exec-1".to_string(), body);
        api.metric_pairs.clear();

        let store = SharedReportStore::default();
        let request = ReportRequest {
            execution_id: "exec-1".to_string(),
            ..ReportRequest::default()
        };

        let phase = load(&api, PayloadSchema::SingleRun, &request, &store)
            .expect("running execution still loads");
        assert_eq!(phase, ExecutionPhase::Running);
        assert!(store.snapshot().metric_pair_ids.is_empty());
    }

    #[test]
    fn incomplete_execution_without_a_result_loads_an_empty_report() {
        let mut api = stub_with_single_run();
        api.executions.insert(
            "exec-2".to_string(),
            json!({"complete": false, "status": "running", "canaryConfigId": "cfg-1"}),
        );
        api.executions.insert(
            "exec-3".to_string(),
            json!({"complete": true, "status": "terminal", "canaryConfigId": "cfg-1"}),
        );

        for (execution_id, expected) in [
            ("exec-2", ExecutionPhase::Running),
            ("exec-3", ExecutionPhase::Terminal),
        ] {
            let store = SharedReportStore::default();
            let request = ReportRequest {
                execution_id: execution_id.to_string(),
                ..ReportRequest::default()
            };

            let phase = load(&api, PayloadSchema::SingleRun, &request, &store)
                .expect("incomplete execution should not fail");
            assert_eq!(phase, expected);
            let snapshot = store.snapshot();
            assert_eq!(snapshot.schema, None);
            assert!(snapshot.metric_pair_ids.is_empty());
        }
    }

    #[test]
    fn completed_execution_without_a_result_is_still_an_error() {
        let mut api = stub_with_single_run();
        api.executions.insert(
            "exec-4".to_string(),
            json!({"complete": true, "status": "succeeded", "canaryConfigId": "cfg-1"}),
        );
        let store = SharedReportStore::default();
        let request = ReportRequest {
            execution_id: "exec-4".to_string(),
            ..ReportRequest::default()
        };

        let err = load(&api, PayloadSchema::SingleRun, &request, &store)
            .expect_err("complete execution needs a result");
        assert!(matches!(err, ReportError::MissingField("result")));
    }
}
