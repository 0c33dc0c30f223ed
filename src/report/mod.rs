//! Normalized view model over canary results.
//!
//! A [`ReportStore`] owns one [`RunState`] per report session. It is filled by
//! exactly one ingest call (single-run or batch schema), mutated afterwards only
//! by the selection operations, and every index handed to a renderer is
//! recomputed from the live state on each read.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::model::{
    CanaryClassifierThresholdsConfig, CanaryConfig, CanaryExecutionRequest, CanaryExecutionResult,
    CanaryResult, KvMap, MetricSetPair,
};

mod indices;
mod ingest;
mod selection;
mod shared;
mod snapshot;

use indices::{
    classification_counts, group_to_metric_ids, lifetime_minutes, metric_pairs_by_id,
    selected_metric_pair,
};
pub use indices::{ClassificationLabel, run_summaries};
pub use shared::SharedReportStore;
pub use snapshot::{ConfigEditorHandoff, ReportSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSchema {
    SingleRun,
    RunBatch,
}

/// Where the metric-pair records for the current run come from.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricPairSource {
    List(Vec<MetricSetPair>),
    ListsById(KvMap<Vec<MetricSetPair>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub schema: Option<PayloadSchema>,
    pub application: Option<String>,
    pub result: Option<CanaryResult>,
    pub thresholds: Option<CanaryClassifierThresholdsConfig>,
    pub metric_pair_list_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Planned lifetime from a batch execution request.
    pub planned_lifetime_mins: Option<i64>,
    pub application_metadata: Option<KvMap<String>>,
    pub all_runs_by_id: BTreeMap<String, CanaryExecutionResult>,
    /// Run ids in upstream order; `all_runs_by_id` is keyed but unordered.
    pub run_order: Vec<String>,
    pub selected_run_id: Option<String>,
    pub selected_metric_id: Option<String>,
    pub display_metric_overview: bool,
    pub execution_request: Option<CanaryExecutionRequest>,
    pub config: Option<CanaryConfig>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            schema: None,
            application: None,
            result: None,
            thresholds: None,
            metric_pair_list_id: None,
            start_time: None,
            end_time: None,
            planned_lifetime_mins: None,
            application_metadata: None,
            all_runs_by_id: BTreeMap::new(),
            run_order: Vec::new(),
            selected_run_id: None,
            selected_metric_id: None,
            display_metric_overview: true,
            execution_request: None,
            config: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportStore {
    state: RunState,
    metric_pairs: Option<MetricPairSource>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn set_metric_pair_list(&mut self, list: Vec<MetricSetPair>) {
        debug!(pairs = list.len(), "installed flat metric-pair list");
        self.metric_pairs = Some(MetricPairSource::List(list));
    }

    pub fn set_metric_pair_list_map(&mut self, lists: KvMap<Vec<MetricSetPair>>) {
        debug!(lists = lists.len(), "installed metric-pair lists by id");
        self.metric_pairs = Some(MetricPairSource::ListsById(lists));
    }

    pub fn set_config(&mut self, config: CanaryConfig) {
        self.state.config = Some(config);
    }

    pub fn classification_counts(&self) -> BTreeMap<ClassificationLabel, usize> {
        classification_counts(&self.state)
    }

    pub fn group_to_metric_ids(&self) -> BTreeMap<String, Vec<String>> {
        group_to_metric_ids(&self.state)
    }

    pub fn metric_pairs_by_id(&self) -> BTreeMap<String, MetricSetPair> {
        metric_pairs_by_id(&self.state, self.metric_pairs.as_ref())
    }

    pub fn selected_metric_pair(&self) -> Option<MetricSetPair> {
        selected_metric_pair(&self.state, self.metric_pairs.as_ref())
    }

    pub fn lifetime_minutes(&self) -> i64 {
        lifetime_minutes(&self.state)
    }
}
