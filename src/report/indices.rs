use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::{MetricPairSource, RunState};
use crate::model::{CanaryAnalysisResult, CanaryJudgeGroupScore, Classification, MetricSetPair};
use crate::util::parse_iso_timestamp;

pub const UNKNOWN_LIFETIME: i64 = -1;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ClassificationLabel {
    Fail,
    Nodata,
    Pass,
}

impl ClassificationLabel {
    pub const ALL: [Self; 3] = [Self::Fail, Self::Nodata, Self::Pass];

    /// Folds the directional and no-data failure kinds into `Fail`.
    pub fn for_classification(classification: &Classification) -> Option<Self> {
        match classification {
            Classification::Pass => Some(Self::Pass),
            Classification::Nodata => Some(Self::Nodata),
            Classification::Fail
            | Classification::High
            | Classification::Low
            | Classification::NodataFailMetric => Some(Self::Fail),
            Classification::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub execution_status: Option<String>,
    pub metric_set_pair_list_id: Option<String>,
    pub score: Option<f64>,
    pub selected: bool,
}

/// Metric-level results keyed by id; a repeated id keeps the later entry.
pub fn analysis_results_by_id(state: &RunState) -> BTreeMap<String, CanaryAnalysisResult> {
    state
        .result
        .iter()
        .flat_map(|result| result.analysis_results())
        .map(|analysis| (analysis.id.clone(), analysis.clone()))
        .collect()
}

pub fn classification_counts(state: &RunState) -> BTreeMap<ClassificationLabel, usize> {
    let mut counts = ClassificationLabel::ALL
        .into_iter()
        .map(|label| (label, 0_usize))
        .collect::<BTreeMap<_, _>>();

    for analysis in analysis_results_by_id(state).values() {
        match ClassificationLabel::for_classification(&analysis.classification) {
            Some(label) => *counts.entry(label).or_default() += 1,
            None => debug!(
                metric_id = %analysis.id,
                classification = %analysis.classification.as_str(),
                "skipping unrecognized classification"
            ),
        }
    }

    counts
}

pub fn group_to_metric_ids(state: &RunState) -> BTreeMap<String, Vec<String>> {
    let mut groups = BTreeMap::<String, Vec<String>>::new();

    for analysis in state.result.iter().flat_map(|result| result.analysis_results()) {
        for group in &analysis.groups {
            groups
                .entry(group.clone())
                .or_default()
                .push(analysis.id.clone());
        }
    }

    groups
}

/// `None` when the result carries no group scores, whether the list is
/// missing or empty.
pub fn group_scores_by_name(
    state: &RunState,
) -> Option<BTreeMap<String, CanaryJudgeGroupScore>> {
    let group_scores = state
        .result
        .as_ref()?
        .judge_result
        .as_ref()?
        .group_scores
        .as_ref()
        .filter(|scores| !scores.is_empty())?;

    Some(
        group_scores
            .iter()
            .map(|group_score| (group_score.name.clone(), group_score.clone()))
            .collect(),
    )
}

pub fn metric_pairs_by_id(
    state: &RunState,
    source: Option<&MetricPairSource>,
) -> BTreeMap<String, MetricSetPair> {
    let pairs: &[MetricSetPair] = match source {
        Some(MetricPairSource::List(list)) => list.as_slice(),
        Some(MetricPairSource::ListsById(lists)) => state
            .metric_pair_list_id
            .as_ref()
            .and_then(|list_id| lists.get(list_id))
            .map(Vec::as_slice)
            .unwrap_or_default(),
        None => &[],
    };

    pairs
        .iter()
        .map(|pair| (pair.id.clone(), pair.clone()))
        .collect()
}

pub fn selected_metric_pair(
    state: &RunState,
    source: Option<&MetricPairSource>,
) -> Option<MetricSetPair> {
    let metric_id = state.selected_metric_id.as_ref()?;
    metric_pairs_by_id(state, source).remove(metric_id)
}

/// Run duration in whole minutes, with three fallbacks in order: the absolute
/// start/end difference rounded half-up, the batch's planned lifetime, then
/// [`UNKNOWN_LIFETIME`].
pub fn lifetime_minutes(state: &RunState) -> i64 {
    if let Some(end_raw) = state
        .end_time
        .as_deref()
        .filter(|value| !value.trim().is_empty())
    {
        let start = state.start_time.as_deref().and_then(parse_iso_timestamp);
        match (start, parse_iso_timestamp(end_raw)) {
            (Some(start), Some(end)) => {
                let diff = (end - start).num_milliseconds() as f64 / MILLIS_PER_MINUTE;
                return (diff + 0.5).floor().abs() as i64;
            }
            _ => warn!(
                start_time = %state.start_time.as_deref().unwrap_or_default(),
                end_time = %end_raw,
                "unparseable run window, falling back to planned lifetime"
            ),
        }
    }

    state.planned_lifetime_mins.unwrap_or(UNKNOWN_LIFETIME)
}

pub fn run_summaries(state: &RunState) -> Vec<RunSummary> {
    state
        .run_order
        .iter()
        .filter_map(|run_id| {
            let run = state.all_runs_by_id.get(run_id)?;
            Some(RunSummary {
                run_id: run_id.clone(),
                execution_status: run.execution_status.clone(),
                metric_set_pair_list_id: run.metric_set_pair_list_id.clone(),
                score: run.result.as_ref().and_then(|result| result.overall_score()),
                selected: state.selected_run_id.as_deref() == Some(run_id.as_str()),
            })
        })
        .collect()
}
