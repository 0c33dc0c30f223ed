use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type KvMap<T> = BTreeMap<String, T>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Classification {
    Pass,
    Fail,
    High,
    Low,
    Nodata,
    NodataFailMetric,
    Other(String),
}

impl Classification {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
            Self::High => "High",
            Self::Low => "Low",
            Self::Nodata => "Nodata",
            Self::NodataFailMetric => "NodataFailMetric",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for Classification {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Pass" => Self::Pass,
            "Fail" => Self::Fail,
            "High" => Self::High,
            "Low" => Self::Low,
            "Nodata" => Self::Nodata,
            "NodataFailMetric" => Self::NodataFailMetric,
            _ => Self::Other(raw),
        }
    }
}

impl From<Classification> for String {
    fn from(value: Classification) -> Self {
        match value {
            Classification::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryClassifierThresholdsConfig {
    pub marginal: Option<f64>,
    pub pass: Option<f64>,
}

/// One metric-level verdict inside a judge result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryAnalysisResult {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub classification: Classification,
    pub classification_reason: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub tags: KvMap<String>,
    #[serde(default)]
    pub critical: bool,
    pub result_metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryJudgeGroupScore {
    pub name: String,
    pub score: Option<f64>,
    pub classification: Option<String>,
    pub classification_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryJudgeScore {
    pub score: Option<f64>,
    pub classification: Option<String>,
    pub classification_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryJudgeResult {
    pub judge_name: Option<String>,
    pub results: Option<Vec<CanaryAnalysisResult>>,
    pub group_scores: Option<Vec<CanaryJudgeGroupScore>>,
    pub score: Option<CanaryJudgeScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryResult {
    pub judge_result: Option<CanaryJudgeResult>,
    pub canary_duration: Option<Value>,
}

impl CanaryResult {
    pub fn analysis_results(&self) -> &[CanaryAnalysisResult] {
        self.judge_result
            .as_ref()
            .and_then(|judge| judge.results.as_deref())
            .unwrap_or_default()
    }

    pub fn overall_score(&self) -> Option<f64> {
        self.judge_result
            .as_ref()
            .and_then(|judge| judge.score.as_ref())
            .and_then(|score| score.score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryScope {
    pub scope: Option<String>,
    pub location: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub step: Option<i64>,
    #[serde(default)]
    pub extended_scope_params: KvMap<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryScopePair {
    pub control_scope: Option<CanaryScope>,
    pub experiment_scope: Option<CanaryScope>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryExecutionRequest {
    #[serde(default)]
    pub scopes: KvMap<CanaryScopePair>,
    pub thresholds: Option<CanaryClassifierThresholdsConfig>,
    pub site_local: Option<KvMap<Value>>,
}

impl CanaryExecutionRequest {
    /// The control scope of the `default` scope pair, which carries the run window.
    pub fn default_control_scope(&self) -> Option<&CanaryScope> {
        self.scopes
            .get("default")
            .and_then(|pair| pair.control_scope.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryClassifierConfig {
    #[serde(default)]
    pub group_weights: KvMap<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryConfig {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub config_version: Option<String>,
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<Value>,
    pub classifier: Option<CanaryClassifierConfig>,
}

/// Single-run status payload returned for a `/canary` execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryExecutionStatusResponse {
    pub application: Option<String>,
    pub parent_pipeline_execution_id: Option<String>,
    pub pipeline_id: Option<String>,
    #[serde(default)]
    pub complete: bool,
    pub status: Option<String>,
    pub exception: Option<Value>,
    pub result: Option<CanaryResult>,
    pub config: Option<CanaryConfig>,
    pub canary_config_id: Option<String>,
    pub canary_execution_request: Option<CanaryExecutionRequest>,
    pub metric_set_pair_list_id: Option<String>,
    pub build_time_iso: Option<String>,
    pub start_time_iso: Option<String>,
    pub end_time_iso: Option<String>,
    pub storage_account_name: Option<String>,
    pub metrics_account_name: Option<String>,
    pub configuration_account_name: Option<String>,
}

/// One run inside a canary analysis batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryExecutionResult {
    pub execution_id: Option<String>,
    pub execution_status: Option<String>,
    pub exception: Option<Value>,
    pub result: Option<CanaryResult>,
    pub metric_set_pair_list_id: Option<String>,
    pub build_time_iso: Option<String>,
    pub start_time_iso: Option<String>,
    pub end_time_iso: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryAnalysisExecutionResult {
    #[serde(default)]
    pub did_pass_thresholds: bool,
    #[serde(default)]
    pub has_warnings: bool,
    pub canary_score_message: Option<String>,
    #[serde(default)]
    pub canary_scores: Vec<f64>,
    #[serde(default)]
    pub canary_execution_results: Vec<CanaryExecutionResult>,
    pub build_time_iso: Option<String>,
    pub start_time_iso: Option<String>,
    pub end_time_iso: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteLocal {
    pub application_metadata: Option<KvMap<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryAnalysisExecutionRequest {
    #[serde(default)]
    pub scopes: Vec<Value>,
    pub thresholds: Option<CanaryClassifierThresholdsConfig>,
    pub lifetime_duration_mins: Option<i64>,
    pub begin_after_mins: Option<i64>,
    pub baseline_analysis_offset_in_mins: Option<i64>,
    pub lookback_mins: Option<i64>,
    pub analysis_interval_mins: Option<i64>,
    pub site_local: Option<SiteLocal>,
}

/// Batch status payload returned for a `/canary_analysis` (scape) execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryAnalysisExecutionStatusResponse {
    pub application: Option<String>,
    pub user: Option<String>,
    pub parent_pipeline_execution_id: Option<String>,
    pub pipeline_id: Option<String>,
    #[serde(default)]
    pub complete: bool,
    pub execution_status: Option<String>,
    pub exception: Option<Value>,
    pub canary_analysis_execution_result: Option<CanaryAnalysisExecutionResult>,
    pub canary_analysis_execution_request: Option<CanaryAnalysisExecutionRequest>,
    pub canary_config: Option<CanaryConfig>,
    pub canary_config_id: Option<String>,
    pub build_time_iso: Option<String>,
    pub start_time_iso: Option<String>,
    pub end_time_iso: Option<String>,
    pub metrics_account_name: Option<String>,
    pub storage_account_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSetScope {
    pub start_time_iso: Option<String>,
    pub start_time_millis: Option<i64>,
    pub step_millis: Option<i64>,
}

/// Paired control/experiment series for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSetPair {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: KvMap<String>,
    #[serde(default)]
    pub values: KvMap<Value>,
    #[serde(default)]
    pub scopes: KvMap<MetricSetScope>,
    #[serde(default)]
    pub attributes: KvMap<KvMap<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPayload {
    SingleRun(Box<CanaryExecutionStatusResponse>),
    RunBatch(Box<CanaryAnalysisExecutionStatusResponse>),
}
