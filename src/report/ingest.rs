use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::{PayloadSchema, ReportStore, RunState};
use crate::error::ReportError;
use crate::model::{
    CanaryAnalysisExecutionStatusResponse, CanaryExecutionResult, CanaryExecutionStatusResponse,
    UpstreamPayload,
};

impl ReportStore {
    pub fn ingest(&mut self, payload: &UpstreamPayload) -> Result<(), ReportError> {
        match payload {
            UpstreamPayload::SingleRun(response) => self.ingest_single_run(response),
            UpstreamPayload::RunBatch(response) => self.ingest_run_batch(response),
        }
    }

    /// Replaces the run fields from a single-run status payload.
    ///
    /// The judgement result is required; thresholds and the scope window are
    /// optional because some execution requests omit them.
    pub fn ingest_single_run(
        &mut self,
        response: &CanaryExecutionStatusResponse,
    ) -> Result<(), ReportError> {
        self.ensure_schema(PayloadSchema::SingleRun)?;

        let result = response
            .result
            .clone()
            .ok_or(ReportError::MissingField("result"))?;
        let request = response.canary_execution_request.as_ref();
        let control_scope = request.and_then(|request| request.default_control_scope());

        let next = RunState {
            schema: Some(PayloadSchema::SingleRun),
            application: response.application.clone(),
            result: Some(result),
            thresholds: request.and_then(|request| request.thresholds.clone()),
            metric_pair_list_id: response.metric_set_pair_list_id.clone(),
            start_time: control_scope.and_then(|scope| scope.start.clone()),
            end_time: control_scope.and_then(|scope| scope.end.clone()),
            execution_request: request.cloned(),
            config: self.state.config.clone(),
            selected_metric_id: self.state.selected_metric_id.clone(),
            display_metric_overview: self.state.display_metric_overview,
            ..RunState::default()
        };

        debug!(
            application = %next.application.as_deref().unwrap_or_default(),
            metric_pair_list_id = %next.metric_pair_list_id.as_deref().unwrap_or_default(),
            "ingested single-run payload"
        );
        self.state = next;
        Ok(())
    }

    /// Replaces the run fields from a batch payload, activating the last run.
    ///
    /// An empty run sequence is not an error: the previous result and list id
    /// are kept and no run is selected.
    pub fn ingest_run_batch(
        &mut self,
        response: &CanaryAnalysisExecutionStatusResponse,
    ) -> Result<(), ReportError> {
        self.ensure_schema(PayloadSchema::RunBatch)?;

        let request = response
            .canary_analysis_execution_request
            .as_ref()
            .ok_or(ReportError::MissingField("canaryAnalysisExecutionRequest"))?;
        let runs = response
            .canary_analysis_execution_result
            .as_ref()
            .map(|result| result.canary_execution_results.as_slice())
            .unwrap_or_default();

        let run_ids = run_keys(runs);
        let mut all_runs_by_id = BTreeMap::new();
        let mut run_order = Vec::with_capacity(runs.len());
        for (run_id, run) in run_ids.iter().zip(runs) {
            if all_runs_by_id.insert(run_id.clone(), run.clone()).is_none() {
                run_order.push(run_id.clone());
            }
        }

        let mut next = RunState {
            schema: Some(PayloadSchema::RunBatch),
            application: response.application.clone(),
            result: self.state.result.clone(),
            thresholds: request.thresholds.clone(),
            metric_pair_list_id: self.state.metric_pair_list_id.clone(),
            start_time: response.start_time_iso.clone(),
            end_time: response.end_time_iso.clone(),
            planned_lifetime_mins: request.lifetime_duration_mins,
            application_metadata: request
                .site_local
                .as_ref()
                .and_then(|site_local| site_local.application_metadata.clone()),
            all_runs_by_id,
            run_order,
            config: self.state.config.clone(),
            selected_metric_id: self.state.selected_metric_id.clone(),
            display_metric_overview: self.state.display_metric_overview,
            ..RunState::default()
        };

        if let (Some(run_id), Some(last)) = (run_ids.last(), runs.last()) {
            next.selected_run_id = Some(run_id.clone());
            next.result = Some(last.result.clone().unwrap_or_default());
            next.metric_pair_list_id = last.metric_set_pair_list_id.clone();
        }

        debug!(
            runs = runs.len(),
            selected_run_id = %next.selected_run_id.as_deref().unwrap_or_default(),
            "ingested run-batch payload"
        );
        self.state = next;
        Ok(())
    }

    fn ensure_schema(&self, incoming: PayloadSchema) -> Result<(), ReportError> {
        match self.state.schema {
            Some(existing) if existing != incoming => {
                Err(ReportError::SchemaMismatch { existing, incoming })
            }
            _ => Ok(()),
        }
    }
}

fn execution_id(run: &CanaryExecutionResult) -> Option<&str> {
    run.execution_id.as_deref().filter(|id| !id.is_empty())
}

/// Batch runs are keyed by execution id, falling back to `run-<index>`.
///
/// A fallback key never shadows a real execution id elsewhere in the batch;
/// it gains a numeric suffix instead. Repeated real ids still share one key.
fn run_keys(runs: &[CanaryExecutionResult]) -> Vec<String> {
    let explicit = runs.iter().filter_map(execution_id).collect::<BTreeSet<_>>();
    let mut fallbacks = BTreeSet::new();

    runs.iter()
        .enumerate()
        .map(|(index, run)| match execution_id(run) {
            Some(id) => id.to_string(),
            None => {
                let mut key = format!("run-{index}");
                let mut suffix = 1;
                while explicit.contains(key.as_str()) || fallbacks.contains(&key) {
                    key = format!("run-{index}-{suffix}");
                    suffix += 1;
                }
                fallbacks.insert(key.clone());
                key
            }
        })
        .collect()
}
