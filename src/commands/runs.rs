use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunsArgs;
use crate::fetch::FileCanaryApi;
use crate::report::{PayloadSchema, ReportStore, run_summaries};
use crate::session::fetch_payload;

pub fn run(args: RunsArgs) -> Result<()> {
    let execution = &args.execution;
    let schema = execution.schema.payload_schema();
    if schema == PayloadSchema::SingleRun {
        warn!(
            execution_id = %execution.execution_id,
            "single-run executions have no batch runs to list"
        );
    }

    let api = FileCanaryApi::new(&execution.cache_root);
    let payload = fetch_payload(&api, schema, &execution.execution_id)?;

    let mut store = ReportStore::new();
    store
        .ingest(&payload)
        .with_context(|| format!("failed to ingest execution {}", execution.execution_id))?;

    let runs = run_summaries(store.state());
    info!(runs = runs.len(), "listed batch runs");

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &runs)
            .context("failed to serialize runs json output")?;
        writeln!(output)?;
    } else {
        for run in &runs {
            let marker = if run.selected { "*" } else { " " };
            writeln!(
                output,
                "{marker} {}\tstatus={}\tscore={}\tmetric_set_pair_list_id={}",
                run.run_id,
                run.execution_status.as_deref().unwrap_or("unknown"),
                run.score
                    .map(|score| format!("{score:.2}"))
                    .unwrap_or_else(|| "n/a".to_string()),
                run.metric_set_pair_list_id.as_deref().unwrap_or("n/a"),
            )?;
        }
    }
    output.flush()?;

    Ok(())
}
