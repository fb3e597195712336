use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Free-form key/value annotations attached to runs, steps, and filter parameters.
pub type Metadata = Map<String, Value>;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Running,
	Completed,
	Failed,
}
impl RunStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Running => "running",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"running" => Some(Self::Running),
			"completed" => Some(Self::Completed),
			"failed" => Some(Self::Failed),
			_ => None,
		}
	}

	pub fn is_terminal(self) -> bool {
		!matches!(self, Self::Running)
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
	Llm,
	Api,
	Filter,
	Rank,
	#[default]
	Transform,
}
impl StepType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Llm => "llm",
			Self::Api => "api",
			Self::Filter => "filter",
			Self::Rank => "rank",
			Self::Transform => "transform",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"llm" => Some(Self::Llm),
			"api" => Some(Self::Api),
			"filter" => Some(Self::Filter),
			"rank" => Some(Self::Rank),
			"transform" => Some(Self::Transform),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
	Accepted,
	Rejected,
	FilteredOut,
}
impl CandidateStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Accepted => "accepted",
			Self::Rejected => "rejected",
			Self::FilteredOut => "filtered_out",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"accepted" => Some(Self::Accepted),
			"rejected" => Some(Self::Rejected),
			"filtered_out" => Some(Self::FilteredOut),
			_ => None,
		}
	}
}

/// One traced pipeline execution and the root of the trace aggregate.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
	pub id: Uuid,
	pub pipeline_name: String,
	pub status: RunStatus,
	#[serde(with = "crate::rfc3339")]
	pub started_at: OffsetDateTime,
	#[serde(default, with = "crate::rfc3339::option")]
	pub completed_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub input: Value,
	#[serde(default)]
	pub output: Option<Value>,
	#[serde(default)]
	pub metadata: Option<Metadata>,
	#[serde(default)]
	pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
	pub id: Uuid,
	pub run_id: Uuid,
	pub step_name: String,
	#[serde(default)]
	pub step_type: StepType,
	pub step_index: u32,
	#[serde(with = "crate::rfc3339")]
	pub started_at: OffsetDateTime,
	#[serde(default, with = "crate::rfc3339::option")]
	pub completed_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub duration_ms: Option<i64>,
	#[serde(default)]
	pub input: Option<Value>,
	#[serde(default)]
	pub output: Option<Value>,
	#[serde(default)]
	pub candidates_in: Option<u32>,
	#[serde(default)]
	pub candidates_out: Option<u32>,
	#[serde(default)]
	pub reasoning: Option<String>,
	#[serde(default)]
	pub filters_applied: Vec<FilterApplication>,
	#[serde(default)]
	pub metadata: Option<Metadata>,
	#[serde(default)]
	pub candidates: Vec<Candidate>,
}
impl Step {
	/// Fraction of candidates this step removed, if both counts are known and the input was
	/// non-empty.
	pub fn elimination_rate(&self) -> Option<f64> {
		match (self.candidates_in, self.candidates_out) {
			(Some(before), Some(after)) if before > 0 => Some(elimination_rate(before, after)),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterApplication {
	pub filter_name: String,
	pub filter_type: String,
	#[serde(default)]
	pub parameters: Option<Metadata>,
	pub candidates_before: u32,
	pub candidates_after: u32,
	pub elimination_rate: f64,
}
impl FilterApplication {
	pub fn new(
		filter_name: impl Into<String>,
		filter_type: impl Into<String>,
		parameters: Option<Metadata>,
		candidates_before: u32,
		candidates_after: u32,
	) -> Self {
		Self {
			filter_name: filter_name.into(),
			filter_type: filter_type.into(),
			parameters,
			candidates_before,
			candidates_after,
			elimination_rate: elimination_rate(candidates_before, candidates_after),
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
	pub id: Uuid,
	pub step_id: Uuid,
	pub candidate_data: Value,
	pub status: CandidateStatus,
	#[serde(default)]
	pub score: Option<f64>,
	#[serde(default)]
	pub reason: Option<String>,
	#[serde(default)]
	pub rejection_reason: Option<String>,
	#[serde(default)]
	pub rejection_filter: Option<String>,
}

/// `1 - after / before`, defined as `0.0` for an empty input since nothing was eliminated.
pub fn elimination_rate(before: u32, after: u32) -> f64 {
	if before == 0 {
		return 0.0;
	}

	1.0 - f64::from(after) / f64::from(before)
}

/// Returns a new map holding `base` overridden key by key with `patch`.
pub fn merge_metadata(base: Option<&Metadata>, patch: &Metadata) -> Metadata {
	let mut merged = base.cloned().unwrap_or_default();

	for (key, value) in patch {
		merged.insert(key.clone(), value.clone());
	}

	merged
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use crate::model::{
		CandidateStatus, Metadata, Run, RunStatus, StepType, elimination_rate, merge_metadata,
	};

	fn approx(left: f64, right: f64) -> bool {
		(left - right).abs() < 1e-4
	}

	#[test]
	fn elimination_rate_matches_reference_points() {
		assert!(approx(elimination_rate(5_000, 450), 0.91));
		assert!(approx(elimination_rate(120, 4), 0.9667));
		assert!(approx(elimination_rate(450, 30), 0.9333));
		assert_eq!(elimination_rate(10, 10), 0.0);
		assert_eq!(elimination_rate(10, 0), 1.0);
	}

	#[test]
	fn elimination_rate_of_empty_input_is_zero() {
		assert_eq!(elimination_rate(0, 0), 0.0);
	}

	#[test]
	fn merge_metadata_overrides_without_touching_base() {
		let base: Metadata = json!({ "region": "us", "model": "a" }).as_object().cloned().unwrap();
		let patch: Metadata = json!({ "model": "b", "attempt": 2 }).as_object().cloned().unwrap();
		let merged = merge_metadata(Some(&base), &patch);

		assert_eq!(merged["region"], "us");
		assert_eq!(merged["model"], "b");
		assert_eq!(merged["attempt"], 2);
		assert_eq!(base["model"], "a");
		assert_eq!(base.len(), 2);
	}

	#[test]
	fn labels_round_trip_through_parse() {
		for status in [RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
			assert_eq!(RunStatus::parse(status.as_str()), Some(status));
		}
		for step_type in
			[StepType::Llm, StepType::Api, StepType::Filter, StepType::Rank, StepType::Transform]
		{
			assert_eq!(StepType::parse(step_type.as_str()), Some(step_type));
		}
		for status in
			[CandidateStatus::Accepted, CandidateStatus::Rejected, CandidateStatus::FilteredOut]
		{
			assert_eq!(CandidateStatus::parse(status.as_str()), Some(status));
		}

		assert_eq!(StepType::parse("retrieval"), None);
	}

	#[test]
	fn run_payload_uses_camel_case_and_defaults() {
		let payload = json!({
			"id": "5b1f1c52-64c5-4a4e-9a0b-3f8d3f0c2d11",
			"pipelineName": "competitor-selection",
			"status": "completed",
			"startedAt": "2026-01-05T10:00:00Z",
			"completedAt": "2026-01-05T10:00:02Z",
			"input": { "asin": "B0TEST" },
			"steps": [{
				"id": "a3a0c7d6-8f0e-4a55-b1d4-0c4f44a6f1b2",
				"runId": "5b1f1c52-64c5-4a4e-9a0b-3f8d3f0c2d11",
				"stepName": "price_filter",
				"stepType": "filter",
				"stepIndex": 0,
				"startedAt": "2026-01-05T10:00:00Z",
				"candidatesIn": 5000,
				"candidatesOut": 450
			}]
		});
		let run: Run = serde_json::from_value(payload).expect("Failed to decode run payload.");

		assert_eq!(run.pipeline_name, "competitor-selection");
		assert_eq!(run.status, RunStatus::Completed);
		assert!(run.output.is_none());
		assert_eq!(run.steps.len(), 1);
		assert_eq!(run.steps[0].step_type, StepType::Filter);
		assert!(run.steps[0].filters_applied.is_empty());
		assert!(approx(run.steps[0].elimination_rate().expect("Expected a rate."), 0.91));

		let encoded = serde_json::to_value(&run).expect("Failed to encode run.");

		assert_eq!(encoded["pipelineName"], "competitor-selection");
		assert_eq!(encoded["steps"][0]["stepIndex"], 0);
		assert_eq!(encoded["completedAt"], "2026-01-05T10:00:02Z");
	}
}
