use std::collections::BTreeMap;

use serde::Serialize;

use super::indices::{self, ClassificationLabel, RunSummary};
use super::{PayloadSchema, ReportStore};
use crate::model::{
    CanaryClassifierThresholdsConfig, CanaryConfig, CanaryExecutionRequest, CanaryJudgeGroupScore,
    KvMap, MetricSetPair,
};

/// Everything a renderer reads, computed from one consistent view of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSnapshot {
    pub schema: Option<PayloadSchema>,
    pub application: Option<String>,
    pub thresholds: Option<CanaryClassifierThresholdsConfig>,
    pub metric_pair_list_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub lifetime_minutes: i64,
    pub application_metadata: Option<KvMap<String>>,
    pub runs: Vec<RunSummary>,
    pub selected_run_id: Option<String>,
    pub selected_metric_id: Option<String>,
    pub display_metric_overview: bool,
    pub overall_score: Option<f64>,
    pub classification_counts: BTreeMap<ClassificationLabel, usize>,
    pub group_to_metric_ids: BTreeMap<String, Vec<String>>,
    pub group_scores_by_name: Option<BTreeMap<String, CanaryJudgeGroupScore>>,
    pub metric_pair_ids: Vec<String>,
    pub selected_metric_pair: Option<MetricSetPair>,
}

/// Values handed to the config editor when the user jumps from a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEditorHandoff {
    pub config: CanaryConfig,
    pub execution_request: CanaryExecutionRequest,
}

impl ReportStore {
    pub fn snapshot(&self) -> ReportSnapshot {
        let state = &self.state;

        ReportSnapshot {
            schema: state.schema,
            application: state.application.clone(),
            thresholds: state.thresholds.clone(),
            metric_pair_list_id: state.metric_pair_list_id.clone(),
            start_time: state.start_time.clone(),
            end_time: state.end_time.clone(),
            lifetime_minutes: self.lifetime_minutes(),
            application_metadata: state.application_metadata.clone(),
            runs: indices::run_summaries(state),
            selected_run_id: state.selected_run_id.clone(),
            selected_metric_id: state.selected_metric_id.clone(),
            display_metric_overview: state.display_metric_overview,
            overall_score: state.result.as_ref().and_then(|result| result.overall_score()),
            classification_counts: self.classification_counts(),
            group_to_metric_ids: self.group_to_metric_ids(),
            group_scores_by_name: indices::group_scores_by_name(state),
            metric_pair_ids: self.metric_pairs_by_id().into_keys().collect(),
            selected_metric_pair: self.selected_metric_pair(),
        }
    }

    /// Available once a config is resolved and the run carried an execution request.
    pub fn config_editor_handoff(&self) -> Option<ConfigEditorHandoff> {
        Some(ConfigEditorHandoff {
            config: self.state.config.clone()?,
            execution_request: self.state.execution_request.clone()?,
        })
    }
}
