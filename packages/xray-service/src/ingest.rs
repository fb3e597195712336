use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{Error, Result, XrayService, convert};
use xray_domain::{Run, RunStatus};
use xray_storage::{
	models::{CandidateRow, RunRow, StepRow},
	queries,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
	pub success: bool,
	pub run_id: Uuid,
}

struct IngestRows {
	run: RunRow,
	steps: Vec<(StepRow, Vec<CandidateRow>)>,
}

impl XrayService {
	/// Persists `run` with all of its steps and candidates in one transaction.
	///
	/// Nothing is written unless every row is. Run ids are not deduplicated, so resubmitting a
	/// run fails on the primary key.
	pub async fn ingest_run(&self, run: &Run) -> Result<IngestResponse> {
		validate_run(run)?;

		let rows = to_rows(run)?;
		let candidate_count: usize = rows.steps.iter().map(|(_, candidates)| candidates.len()).sum();
		let mut tx = self.db.pool.begin().await?;

		if let Err(err) = insert_rows(&mut tx, &rows).await {
			tracing::error!(run_id = %run.id, error = %err, "Run ingestion failed.");

			if let Err(rollback_err) = tx.rollback().await {
				tracing::warn!(run_id = %run.id, error = %rollback_err, "Rollback failed.");
			}

			return Err(err);
		}

		tx.commit().await.inspect_err(|err| {
			tracing::error!(run_id = %run.id, error = %err, "Run ingestion commit failed.");
		})?;

		tracing::info!(
			run_id = %run.id,
			pipeline = %run.pipeline_name,
			steps = rows.steps.len(),
			candidates = candidate_count,
			"Run ingested."
		);

		Ok(IngestResponse { success: true, run_id: run.id })
	}
}

/// Checks the structural invariants a run must satisfy before any row is written.
pub fn validate_run(run: &Run) -> Result<()> {
	if run.pipeline_name.trim().is_empty() {
		return Err(Error::invalid("pipelineName must not be empty."));
	}
	if (run.status == RunStatus::Running) != run.completed_at.is_none() {
		return Err(Error::invalid(format!(
			"completedAt must be present exactly when status is not running; status is {}.",
			run.status.as_str()
		)));
	}

	for (position, step) in run.steps.iter().enumerate() {
		if step.step_index as usize != position {
			return Err(Error::invalid(format!(
				"Step indexes must run 0..n without gaps; found {} at position {position}.",
				step.step_index
			)));
		}
		if step.run_id != run.id {
			return Err(Error::invalid(format!(
				"Step {} belongs to run {}, not {}.",
				step.step_index, step.run_id, run.id
			)));
		}
		if let (Some(before), Some(after)) = (step.candidates_in, step.candidates_out)
			&& after > before
		{
			return Err(Error::invalid(format!(
				"Step {} has candidatesOut ({after}) greater than candidatesIn ({before}).",
				step.step_index
			)));
		}
		if let Some(candidate) = step.candidates.iter().find(|candidate| candidate.step_id != step.id)
		{
			return Err(Error::invalid(format!(
				"Candidate {} references step {}, not step {}.",
				candidate.id, candidate.step_id, step.step_index
			)));
		}
	}

	Ok(())
}

fn to_rows(run: &Run) -> Result<IngestRows> {
	let mut steps = Vec::with_capacity(run.steps.len());

	for step in &run.steps {
		let candidates = step.candidates.iter().map(convert::candidate_row).collect();

		steps.push((convert::step_row(step)?, candidates));
	}

	Ok(IngestRows { run: convert::run_row(run), steps })
}

async fn insert_rows(tx: &mut Transaction<'_, Postgres>, rows: &IngestRows) -> Result<()> {
	queries::insert_run_tx(tx, &rows.run).await?;

	for (step, candidates) in &rows.steps {
		queries::insert_step_tx(tx, step).await?;
		queries::insert_candidates_tx(tx, candidates).await?;
	}

	Ok(())
}
