//! Mapping between the wire model and storage rows.
//!
//! Counts and indexes are unsigned on the wire and `integer` in Postgres, so every crossing is
//! checked. A stored value that no longer maps back onto the model is a storage error.

use serde_json::Value;

use crate::{Error, Result};
use xray_domain::{
	Candidate, CandidateStatus, FilterApplication, Metadata, Run, RunStatus, Step, StepType,
};
use xray_storage::models::{CandidateRow, RunRow, StepRow};

pub(crate) fn run_row(run: &Run) -> RunRow {
	RunRow {
		id: run.id,
		pipeline_name: run.pipeline_name.clone(),
		status: run.status.as_str().to_string(),
		started_at: run.started_at,
		completed_at: run.completed_at,
		input: run.input.clone(),
		output: run.output.clone(),
		metadata: run.metadata.clone().map(Value::Object),
	}
}

pub(crate) fn step_row(step: &Step) -> Result<StepRow> {
	let filters_applied = serde_json::to_value(&step.filters_applied)
		.map_err(|err| Error::invalid(format!("filtersApplied is not serializable: {err}.")))?;

	Ok(StepRow {
		id: step.id,
		run_id: step.run_id,
		step_name: step.step_name.clone(),
		step_type: step.step_type.as_str().to_string(),
		step_index: to_column(step.step_index, "stepIndex")?,
		started_at: step.started_at,
		completed_at: step.completed_at,
		duration_ms: step.duration_ms,
		input: step.input.clone(),
		output: step.output.clone(),
		candidates_in: step.candidates_in.map(|count| to_column(count, "candidatesIn")).transpose()?,
		candidates_out: step
			.candidates_out
			.map(|count| to_column(count, "candidatesOut"))
			.transpose()?,
		reasoning: step.reasoning.clone(),
		filters_applied,
		metadata: step.metadata.clone().map(Value::Object),
	})
}

pub(crate) fn candidate_row(candidate: &Candidate) -> CandidateRow {
	CandidateRow {
		id: candidate.id,
		step_id: candidate.step_id,
		candidate_data: candidate.candidate_data.clone(),
		status: candidate.status.as_str().to_string(),
		score: candidate.score,
		reason: candidate.reason.clone(),
		rejection_reason: candidate.rejection_reason.clone(),
		rejection_filter: candidate.rejection_filter.clone(),
	}
}

/// Rebuilds a run without its steps.
pub(crate) fn run_from_row(row: RunRow) -> Result<Run> {
	let status = parse_run_status(&row.status)?;

	Ok(Run {
		id: row.id,
		pipeline_name: row.pipeline_name,
		status,
		started_at: row.started_at,
		completed_at: row.completed_at,
		input: row.input,
		output: row.output,
		metadata: metadata_from_column(row.metadata, "runs.metadata")?,
		steps: Vec::new(),
	})
}

/// Rebuilds a step without its candidates.
pub(crate) fn step_from_row(row: StepRow) -> Result<Step> {
	let step_type = StepType::parse(&row.step_type)
		.ok_or_else(|| Error::corrupt(format!("Unknown stored step type {:?}.", row.step_type)))?;
	let filters_applied: Vec<FilterApplication> = serde_json::from_value(row.filters_applied)
		.map_err(|err| Error::corrupt(format!("Stored filters_applied is malformed: {err}.")))?;

	Ok(Step {
		id: row.id,
		run_id: row.run_id,
		step_name: row.step_name,
		step_type,
		step_index: from_column(row.step_index, "steps.step_index")?,
		started_at: row.started_at,
		completed_at: row.completed_at,
		duration_ms: row.duration_ms,
		input: row.input,
		output: row.output,
		candidates_in: row
			.candidates_in
			.map(|count| from_column(count, "steps.candidates_in"))
			.transpose()?,
		candidates_out: row
			.candidates_out
			.map(|count| from_column(count, "steps.candidates_out"))
			.transpose()?,
		reasoning: row.reasoning,
		filters_applied,
		metadata: metadata_from_column(row.metadata, "steps.metadata")?,
		candidates: Vec::new(),
	})
}

pub(crate) fn candidate_from_row(row: CandidateRow) -> Result<Candidate> {
	let status = CandidateStatus::parse(&row.status)
		.ok_or_else(|| Error::corrupt(format!("Unknown stored candidate status {:?}.", row.status)))?;

	Ok(Candidate {
		id: row.id,
		step_id: row.step_id,
		candidate_data: row.candidate_data,
		status,
		score: row.score,
		reason: row.reason,
		rejection_reason: row.rejection_reason,
		rejection_filter: row.rejection_filter,
	})
}

pub(crate) fn parse_run_status(value: &str) -> Result<RunStatus> {
	RunStatus::parse(value)
		.ok_or_else(|| Error::corrupt(format!("Unknown stored run status {value:?}.")))
}

fn metadata_from_column(value: Option<Value>, column: &str) -> Result<Option<Metadata>> {
	match value {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Object(map)) => Ok(Some(map)),
		Some(_) => Err(Error::corrupt(format!("Stored {column} is not a JSON object."))),
	}
}

fn to_column(value: u32, field: &str) -> Result<i32> {
	i32::try_from(value)
		.map_err(|_| Error::invalid(format!("{field} ({value}) exceeds the supported maximum.")))
}

fn from_column(value: i32, column: &str) -> Result<u32> {
	u32::try_from(value).map_err(|_| Error::corrupt(format!("Stored {column} is negative.")))
}
