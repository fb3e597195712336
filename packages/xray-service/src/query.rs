use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result, XrayService, convert,
	runs::{self, RunSummary},
};
use xray_domain::{FilterApplication, RunStatus, StepType};
use xray_storage::{
	models::EliminationRow,
	queries::{self, EliminationFilter, RunFilter},
};

pub const MAX_ELIMINATION_MATCHES: i64 = 100;
pub const RECENT_RUNS_LIMIT: i64 = 50;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
	/// Minimum elimination rate within 0.0-1.0. Without it the most recent runs are returned.
	pub min_elimination_rate: Option<f64>,
	pub pipeline_name: Option<String>,
	/// Narrows elimination matches to one step type.
	pub step_type: Option<String>,
	/// Narrows recent runs to one status.
	pub status: Option<String>,
}

/// A step that crossed the elimination threshold, with enough of its run to locate it.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMatch {
	pub step_id: Uuid,
	pub run_id: Uuid,
	pub pipeline_name: String,
	pub run_status: RunStatus,
	#[serde(with = "xray_domain::rfc3339")]
	pub run_started_at: OffsetDateTime,
	pub step_name: String,
	pub step_type: StepType,
	pub step_index: u32,
	pub candidates_in: u32,
	pub candidates_out: u32,
	pub elimination_rate: f64,
	pub reasoning: Option<String>,
	pub filters_applied: Vec<FilterApplication>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
	Steps(Vec<StepMatch>),
	Runs(Vec<RunSummary>),
}

impl XrayService {
	/// Answers a cross-pipeline query.
	///
	/// With `min_elimination_rate`, returns up to 100 steps whose elimination rate is at least the
	/// threshold, highest first. Steps that saw no input candidates never match. Without it,
	/// returns the 50 most recently started runs.
	pub async fn query(&self, req: QueryRequest) -> Result<QueryResponse> {
		let pipeline_name = runs::non_blank(req.pipeline_name.as_deref());

		let Some(min_rate) = req.min_elimination_rate else {
			let status = runs::parse_status_filter(req.status.as_deref())?;
			let filter = RunFilter { pipeline_name, status: status.map(RunStatus::as_str) };
			let rows = queries::list_runs(&self.db, &filter, RECENT_RUNS_LIMIT, 0).await?;

			return Ok(QueryResponse::Runs(runs::summaries(rows)?));
		};

		if !min_rate.is_finite() || !(0.0..=1.0).contains(&min_rate) {
			return Err(Error::invalid("minEliminationRate must be within 0.0-1.0."));
		}

		let step_type = match runs::non_blank(req.step_type.as_deref()) {
			Some(value) => Some(
				StepType::parse(value)
					.ok_or_else(|| Error::invalid(format!("Unknown step type {value:?}.")))?,
			),
			None => None,
		};
		let filter = EliminationFilter {
			min_rate,
			pipeline_name,
			step_type: step_type.map(StepType::as_str),
			limit: MAX_ELIMINATION_MATCHES,
		};
		let rows = queries::steps_by_elimination_rate(&self.db, &filter).await?;
		let matches = rows.into_iter().map(step_match).collect::<Result<Vec<_>>>()?;

		tracing::debug!(min_rate, matches = matches.len(), "Elimination query answered.");

		Ok(QueryResponse::Steps(matches))
	}
}

fn step_match(row: EliminationRow) -> Result<StepMatch> {
	let run_status = convert::parse_run_status(&row.run_status)?;
	let step = convert::step_from_row(row.step)?;
	let (Some(candidates_in), Some(candidates_out)) = (step.candidates_in, step.candidates_out)
	else {
		return Err(Error::corrupt("Elimination match is missing candidate counts."));
	};

	Ok(StepMatch {
		step_id: step.id,
		run_id: step.run_id,
		pipeline_name: row.pipeline_name,
		run_status,
		run_started_at: row.run_started_at,
		step_name: step.step_name,
		step_type: step.step_type,
		step_index: step.step_index,
		candidates_in,
		candidates_out,
		elimination_rate: row.elimination_rate,
		reasoning: step.reasoning,
		filters_applied: step.filters_applied,
	})
}
