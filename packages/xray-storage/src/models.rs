use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct RunRow {
	pub id: Uuid,
	pub pipeline_name: String,
	pub status: String,
	pub started_at: OffsetDateTime,
	pub completed_at: Option<OffsetDateTime>,
	pub input: Value,
	pub output: Option<Value>,
	pub metadata: Option<Value>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct StepRow {
	pub id: Uuid,
	pub run_id: Uuid,
	pub step_name: String,
	pub step_type: String,
	pub step_index: i32,
	pub started_at: OffsetDateTime,
	pub completed_at: Option<OffsetDateTime>,
	pub duration_ms: Option<i64>,
	pub input: Option<Value>,
	pub output: Option<Value>,
	pub candidates_in: Option<i32>,
	pub candidates_out: Option<i32>,
	pub reasoning: Option<String>,
	pub filters_applied: Value,
	pub metadata: Option<Value>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CandidateRow {
	pub id: Uuid,
	pub step_id: Uuid,
	pub candidate_data: Value,
	pub status: String,
	pub score: Option<f64>,
	pub reason: Option<String>,
	pub rejection_reason: Option<String>,
	pub rejection_filter: Option<String>,
}

/// A step matched by the elimination-rate query, joined with its run's identifying fields.
#[derive(Debug, sqlx::FromRow)]
pub struct EliminationRow {
	#[sqlx(flatten)]
	pub step: StepRow,
	pub pipeline_name: String,
	pub run_status: String,
	pub run_started_at: OffsetDateTime,
	pub elimination_rate: f64,
}
