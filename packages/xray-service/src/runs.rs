use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, XrayService, convert};
use xray_domain::{Candidate, Metadata, Run, RunStatus};
use xray_storage::{
	models::RunRow,
	queries::{self, RunFilter},
};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRunsRequest {
	pub page: Option<u32>,
	pub limit: Option<u32>,
	pub pipeline_name: Option<String>,
	pub status: Option<String>,
}

/// A run without its steps, as returned by listings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
	pub id: Uuid,
	pub pipeline_name: String,
	pub status: RunStatus,
	#[serde(with = "xray_domain::rfc3339")]
	pub started_at: OffsetDateTime,
	#[serde(default, with = "xray_domain::rfc3339::option")]
	pub completed_at: Option<OffsetDateTime>,
	pub input: Value,
	pub output: Option<Value>,
	pub metadata: Option<Metadata>,
}
impl From<Run> for RunSummary {
	fn from(run: Run) -> Self {
		Self {
			id: run.id,
			pipeline_name: run.pipeline_name,
			status: run.status,
			started_at: run.started_at,
			completed_at: run.completed_at,
			input: run.input,
			output: run.output,
			metadata: run.metadata,
		}
	}
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
	pub page: u32,
	pub limit: u32,
	pub total: u64,
	pub total_pages: u64,
}
impl Pagination {
	pub fn new(page: u32, limit: u32, total: u64) -> Self {
		Self { page, limit, total, total_pages: total.div_ceil(u64::from(limit.max(1))) }
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRunsResponse {
	pub runs: Vec<RunSummary>,
	pub pagination: Pagination,
}

impl XrayService {
	/// Fetches one run with its steps in index order, each carrying its sampled candidates.
	pub async fn get_run(&self, run_id: Uuid) -> Result<Run> {
		let Some(row) = queries::fetch_run(&self.db, run_id).await? else {
			return Err(Error::NotFound { message: "Run not found".to_string() });
		};
		let mut run = convert::run_from_row(row)?;
		let step_rows = queries::fetch_steps(&self.db, run_id).await?;
		let step_ids: Vec<Uuid> = step_rows.iter().map(|step| step.id).collect();
		let mut candidates_by_step: HashMap<Uuid, Vec<Candidate>> = HashMap::new();

		for row in queries::fetch_candidates(&self.db, &step_ids).await? {
			let candidate = convert::candidate_from_row(row)?;

			candidates_by_step.entry(candidate.step_id).or_default().push(candidate);
		}

		for row in step_rows {
			let mut step = convert::step_from_row(row)?;

			step.candidates = candidates_by_step.remove(&step.id).unwrap_or_default();

			run.steps.push(step);
		}

		Ok(run)
	}

	/// Lists runs, most recently started first, one page at a time.
	pub async fn list_runs(&self, req: ListRunsRequest) -> Result<ListRunsResponse> {
		let page = req.page.unwrap_or(1);
		let limit = req.limit.unwrap_or(self.cfg.query.default_page_limit);

		if page == 0 {
			return Err(Error::invalid("page must be at least 1."));
		}
		if limit == 0 || limit > self.cfg.query.max_page_limit {
			return Err(Error::invalid(format!(
				"limit must be between 1 and {}.",
				self.cfg.query.max_page_limit
			)));
		}

		let status = parse_status_filter(req.status.as_deref())?;
		let filter = RunFilter {
			pipeline_name: non_blank(req.pipeline_name.as_deref()),
			status: status.map(RunStatus::as_str),
		};
		let offset = (i64::from(page) - 1) * i64::from(limit);
		let total = queries::count_runs(&self.db, &filter).await?;
		let rows = queries::list_runs(&self.db, &filter, i64::from(limit), offset).await?;
		let runs = summaries(rows)?;

		Ok(ListRunsResponse {
			runs,
			pagination: Pagination::new(page, limit, u64::try_from(total).unwrap_or_default()),
		})
	}
}

pub(crate) fn summaries(rows: Vec<RunRow>) -> Result<Vec<RunSummary>> {
	rows.into_iter().map(|row| convert::run_from_row(row).map(RunSummary::from)).collect()
}

pub(crate) fn parse_status_filter(value: Option<&str>) -> Result<Option<RunStatus>> {
	let Some(value) = non_blank(value) else {
		return Ok(None);
	};

	RunStatus::parse(value)
		.map(Some)
		.ok_or_else(|| Error::invalid(format!("Unknown run status {value:?}.")))
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}
