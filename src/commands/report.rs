use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::cli::ReportArgs;
use crate::fetch::FileCanaryApi;
use crate::report::{ConfigEditorHandoff, PayloadSchema, ReportSnapshot, SharedReportStore};
use crate::session::{self, ExecutionPhase, ReportRequest};
use crate::util::{now_utc_string, write_json_pretty};

#[derive(Debug, Serialize)]
struct ReportManifest {
    manifest_version: u32,
    generated_at: String,
    execution_id: String,
    schema: PayloadSchema,
    phase: ExecutionPhase,
    source_path: String,
    source_sha256: String,
    report: ReportSnapshot,
    config_editor_handoff: Option<ConfigEditorHandoff>,
}

pub fn run(args: ReportArgs) -> Result<()> {
    let execution = &args.execution;
    let schema = execution.schema.payload_schema();
    let api = FileCanaryApi::new(&execution.cache_root);

    info!(
        cache_root = %execution.cache_root.display(),
        execution_id = %execution.execution_id,
        "building report"
    );

    let document = api
        .fetch_status_document(schema, &execution.execution_id)
        .inspect_err(|err| {
            error!(
                execution_id = %execution.execution_id,
                error = %err,
                "failed to fetch the execution status response"
            );
        })
        .with_context(|| {
            format!(
                "failed to fetch status for execution {}",
                execution.execution_id
            )
        })?;

    let store = SharedReportStore::default();
    store.subscribe(|change| debug!(change = ?change, "report state changed"));

    let request = ReportRequest {
        execution_id: execution.execution_id.clone(),
        run_id: args.run_id.clone(),
        metric_id: args.metric_id.clone(),
        overview: args.overview,
    };
    let phase =
        session::load_report(&api, &document.payload, &request, &store).with_context(|| {
            format!(
                "failed to load report for execution {}",
                execution.execution_id
            )
        })?;

    let report = store.snapshot();
    let config_editor_handoff = store.read(|current| current.config_editor_handoff());
    info!(
        lifetime_minutes = report.lifetime_minutes,
        runs = report.runs.len(),
        metric_pairs = report.metric_pair_ids.len(),
        "report ready"
    );

    let manifest = ReportManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        execution_id: execution.execution_id.clone(),
        schema,
        phase,
        source_path: document.path.display().to_string(),
        source_sha256: document.sha256,
        report,
        config_editor_handoff,
    };

    match args.output_path {
        Some(path) => {
            write_json_pretty(&path, &manifest)?;
            info!(path = %path.display(), "wrote report manifest");
        }
        None => {
            let mut output = io::BufWriter::new(io::stdout().lock());
            serde_json::to_writer_pretty(&mut output, &manifest)
                .context("failed to serialize report json output")?;
            writeln!(output)?;
            output.flush()?;
        }
    }

    Ok(())
}
