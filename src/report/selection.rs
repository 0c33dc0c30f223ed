use tracing::debug;

use super::ReportStore;
use crate::error::ReportError;

impl ReportStore {
    /// Activates one run of an ingested batch.
    ///
    /// An unknown id is rejected and leaves the state untouched.
    pub fn select_run(&mut self, run_id: &str) -> Result<(), ReportError> {
        let run = self
            .state
            .all_runs_by_id
            .get(run_id)
            .ok_or_else(|| ReportError::UnknownRun(run_id.to_string()))?;

        let result = run.result.clone().unwrap_or_default();
        let metric_pair_list_id = run.metric_set_pair_list_id.clone();

        self.state.result = Some(result);
        self.state.metric_pair_list_id = metric_pair_list_id;
        self.state.selected_run_id = Some(run_id.to_string());
        self.state.selected_metric_id = None;
        self.state.display_metric_overview = true;

        debug!(run_id, "selected run");
        Ok(())
    }

    pub fn select_metric(&mut self, metric_id: &str) {
        self.state.selected_metric_id = Some(metric_id.to_string());
        self.state.display_metric_overview = false;
        debug!(metric_id, "selected metric");
    }

    /// Returns to the overview; the metric focus is kept for the next toggle.
    pub fn show_overview(&mut self) {
        self.state.display_metric_overview = true;
    }
}
