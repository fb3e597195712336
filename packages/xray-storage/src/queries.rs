use sqlx::{Executor, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::{
	Error, Result,
	db::Db,
	models::{CandidateRow, EliminationRow, RunRow, StepRow},
};

const RUN_COLUMNS: &str =
	"id, pipeline_name, status, started_at, completed_at, input, output, metadata";
const STEP_COLUMNS: &str = "\
s.id, s.run_id, s.step_name, s.step_type, s.step_index, s.started_at, s.completed_at, \
s.duration_ms, s.input, s.output, s.candidates_in, s.candidates_out, s.reasoning, \
s.filters_applied, s.metadata";
// Must match the idx_steps_elimination_rate expression for the index to apply.
const ELIMINATION_RATE_EXPR: &str = "(1 - s.candidates_out::double precision / s.candidates_in)";
// Postgres caps a statement at 65535 bind parameters; candidates bind 8 each.
const CANDIDATE_INSERT_CHUNK: usize = 1_000;

/// Equality filters shared by run listing and counting.
#[derive(Debug, Default)]
pub struct RunFilter<'a> {
	pub pipeline_name: Option<&'a str>,
	pub status: Option<&'a str>,
}

#[derive(Debug)]
pub struct EliminationFilter<'a> {
	pub min_rate: f64,
	pub pipeline_name: Option<&'a str>,
	pub step_type: Option<&'a str>,
	pub limit: i64,
}

pub async fn insert_run_tx(tx: &mut Transaction<'_, Postgres>, run: &RunRow) -> Result<()> {
	insert_run_exec(&mut **tx, run).await
}

pub async fn insert_step_tx(tx: &mut Transaction<'_, Postgres>, step: &StepRow) -> Result<()> {
	insert_step_exec(&mut **tx, step).await
}

pub async fn insert_candidates_tx(
	tx: &mut Transaction<'_, Postgres>,
	candidates: &[CandidateRow],
) -> Result<()> {
	for chunk in candidates.chunks(CANDIDATE_INSERT_CHUNK) {
		insert_candidates_exec(&mut **tx, chunk).await?;
	}

	Ok(())
}

pub async fn fetch_run(db: &Db, run_id: Uuid) -> Result<Option<RunRow>> {
	let sql = format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = $1");
	let row = sqlx::query_as::<_, RunRow>(&sql).bind(run_id).fetch_optional(&db.pool).await?;

	Ok(row)
}

pub async fn fetch_steps(db: &Db, run_id: Uuid) -> Result<Vec<StepRow>> {
	let sql = format!("SELECT {STEP_COLUMNS} FROM steps s WHERE s.run_id = $1 ORDER BY s.step_index");
	let rows = sqlx::query_as::<_, StepRow>(&sql).bind(run_id).fetch_all(&db.pool).await?;

	Ok(rows)
}

pub async fn fetch_candidates(db: &Db, step_ids: &[Uuid]) -> Result<Vec<CandidateRow>> {
	if step_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, CandidateRow>(
		"\
SELECT
	id,
	step_id,
	candidate_data,
	status,
	score,
	reason,
	rejection_reason,
	rejection_filter
FROM candidates
WHERE step_id = ANY($1)",
	)
	.bind(step_ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Runs matching `filter`, most recently started first.
pub async fn list_runs(
	db: &Db,
	filter: &RunFilter<'_>,
	limit: i64,
	offset: i64,
) -> Result<Vec<RunRow>> {
	if limit <= 0 || offset < 0 {
		return Err(Error::InvalidArgument(format!(
			"Run listing needs a positive limit and a non-negative offset, got {limit} and {offset}."
		)));
	}

	let mut builder = QueryBuilder::new(format!("SELECT {RUN_COLUMNS} FROM runs WHERE TRUE"));

	push_run_filter(&mut builder, filter);

	builder.push(" ORDER BY started_at DESC, id LIMIT ");
	builder.push_bind(limit);
	builder.push(" OFFSET ");
	builder.push_bind(offset);

	let rows = builder.build_query_as::<RunRow>().fetch_all(&db.pool).await?;

	Ok(rows)
}

pub async fn count_runs(db: &Db, filter: &RunFilter<'_>) -> Result<i64> {
	let mut builder = QueryBuilder::new("SELECT count(*) FROM runs WHERE TRUE");

	push_run_filter(&mut builder, filter);

	let total = builder.build_query_scalar::<i64>().fetch_one(&db.pool).await?;

	Ok(total)
}

/// Steps across all pipelines whose elimination rate is at least `filter.min_rate`, highest
/// rate first. Steps with no input candidates are never matched.
pub async fn steps_by_elimination_rate(
	db: &Db,
	filter: &EliminationFilter<'_>,
) -> Result<Vec<EliminationRow>> {
	if filter.limit <= 0 {
		return Err(Error::InvalidArgument("Elimination query limit must be positive.".to_string()));
	}

	let mut builder = QueryBuilder::new(format!(
		"\
SELECT
	{STEP_COLUMNS},
	r.pipeline_name,
	r.status AS run_status,
	r.started_at AS run_started_at,
	{ELIMINATION_RATE_EXPR} AS elimination_rate
FROM steps s
JOIN runs r ON r.id = s.run_id
WHERE s.candidates_in > 0
	AND s.candidates_out IS NOT NULL
	AND {ELIMINATION_RATE_EXPR} >= "
	));

	builder.push_bind(filter.min_rate);

	if let Some(pipeline_name) = filter.pipeline_name {
		builder.push(" AND r.pipeline_name = ");
		builder.push_bind(pipeline_name);
	}
	if let Some(step_type) = filter.step_type {
		builder.push(" AND s.step_type = ");
		builder.push_bind(step_type);
	}

	builder.push(format!(" ORDER BY {ELIMINATION_RATE_EXPR} DESC, r.started_at DESC LIMIT "));
	builder.push_bind(filter.limit);

	let rows = builder.build_query_as::<EliminationRow>().fetch_all(&db.pool).await?;

	Ok(rows)
}

fn push_run_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &RunFilter<'a>) {
	if let Some(pipeline_name) = filter.pipeline_name {
		builder.push(" AND pipeline_name = ");
		builder.push_bind(pipeline_name);
	}
	if let Some(status) = filter.status {
		builder.push(" AND status = ");
		builder.push_bind(status);
	}
}

async fn insert_run_exec<'e, E>(executor: E, run: &RunRow) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO runs (
	id,
	pipeline_name,
	status,
	started_at,
	completed_at,
	input,
	output,
	metadata
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
	)
	.bind(run.id)
	.bind(run.pipeline_name.as_str())
	.bind(run.status.as_str())
	.bind(run.started_at)
	.bind(run.completed_at)
	.bind(&run.input)
	.bind(run.output.as_ref())
	.bind(run.metadata.as_ref())
	.execute(executor)
	.await?;

	Ok(())
}

async fn insert_step_exec<'e, E>(executor: E, step: &StepRow) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO steps (
	id,
	run_id,
	step_name,
	step_type,
	step_index,
	started_at,
	completed_at,
	duration_ms,
	input,
	output,
	candidates_in,
	candidates_out,
	reasoning,
	filters_applied,
	metadata
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
	)
	.bind(step.id)
	.bind(step.run_id)
	.bind(step.step_name.as_str())
	.bind(step.step_type.as_str())
	.bind(step.step_index)
	.bind(step.started_at)
	.bind(step.completed_at)
	.bind(step.duration_ms)
	.bind(step.input.as_ref())
	.bind(step.output.as_ref())
	.bind(step.candidates_in)
	.bind(step.candidates_out)
	.bind(step.reasoning.as_deref())
	.bind(&step.filters_applied)
	.bind(step.metadata.as_ref())
	.execute(executor)
	.await?;

	Ok(())
}

async fn insert_candidates_exec<'e, E>(executor: E, candidates: &[CandidateRow]) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	if candidates.is_empty() {
		return Ok(());
	}

	let mut builder = QueryBuilder::new(
		"\
INSERT INTO candidates (
	id,
	step_id,
	candidate_data,
	status,
	score,
	reason,
	rejection_reason,
	rejection_filter
) ",
	);

	builder.push_values(candidates, |mut b, candidate| {
		b.push_bind(candidate.id)
			.push_bind(candidate.step_id)
			.push_bind(&candidate.candidate_data)
			.push_bind(candidate.status.as_str())
			.push_bind(candidate.score)
			.push_bind(candidate.reason.as_deref())
			.push_bind(candidate.rejection_reason.as_deref())
			.push_bind(candidate.rejection_filter.as_deref());
	});
	builder.build().execute(executor).await?;

	Ok(())
}
