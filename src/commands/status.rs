use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::error::ReportError;
use crate::fetch::FileCanaryApi;
use crate::report::{ClassificationLabel, ReportStore};
use crate::session::{application, execution_phase, fetch_payload};

pub fn run(args: StatusArgs) -> Result<()> {
    let execution = &args.execution;
    let api = FileCanaryApi::new(&execution.cache_root);

    info!(
        cache_root = %execution.cache_root.display(),
        execution_id = %execution.execution_id,
        "status requested"
    );

    let payload = fetch_payload(&api, execution.schema.payload_schema(), &execution.execution_id)?;
    let phase = execution_phase(&payload);
    info!(
        phase = phase.as_str(),
        application = %application(&payload).unwrap_or_default(),
        "loaded execution status"
    );

    let mut store = ReportStore::new();
    match store.ingest(&payload) {
        Ok(()) => {}
        Err(ReportError::MissingField(field)) => {
            warn!(field, "execution has no judgement yet");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }

    let counts = store.classification_counts();
    let state = store.state();
    info!(
        lifetime_minutes = store.lifetime_minutes(),
        start_time = %state.start_time.as_deref().unwrap_or_default(),
        end_time = %state.end_time.as_deref().unwrap_or_default(),
        selected_run_id = %state.selected_run_id.as_deref().unwrap_or_default(),
        pass_threshold = ?state.thresholds.as_ref().and_then(|thresholds| thresholds.pass),
        marginal_threshold = ?state.thresholds.as_ref().and_then(|thresholds| thresholds.marginal),
        pass = counts.get(&ClassificationLabel::Pass).copied().unwrap_or_default(),
        fail = counts.get(&ClassificationLabel::Fail).copied().unwrap_or_default(),
        nodata = counts.get(&ClassificationLabel::Nodata).copied().unwrap_or_default(),
        "execution summary"
    );

    Ok(())
}
