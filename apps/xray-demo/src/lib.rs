//! A competitor-selection pipeline instrumented end to end.
//!
//! The catalog is synthetic and deterministic so that repeated runs produce comparable traces.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use xray_sdk::{CandidateInput, CandidateStatus, Metadata, Run, StepType, Tracer};

const CATALOG_SIZE: usize = 5_000;
const MAX_PRICE: f64 = 40.0;
const MIN_RATING: f64 = 4.2;
const SHORTLIST: usize = 5;

#[derive(Debug, Parser)]
#[command(
	version = xray_cli::VERSION,
	rename_all = "kebab",
	styles = xray_cli::styles(),
)]
pub struct Args {
	/// Tracer settings file. Defaults apply when omitted.
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: Option<PathBuf>,
	/// Overrides the ingestion endpoint from the config.
	#[arg(long, value_name = "URL")]
	pub endpoint: Option<String>,
	/// Reference product to find competitors for.
	#[arg(long, default_value = "B0DESKLAMP")]
	pub asin: String,
	/// How long to wait for the trace to be delivered before exiting.
	#[arg(long, default_value_t = 1_000, value_name = "MS")]
	pub flush_ms: u64,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	init_tracing();

	let mut cfg = match &args.config {
		Some(path) => xray_config::load_tracer(path)?,
		None => xray_config::Tracer::default(),
	};

	if let Some(endpoint) = args.endpoint {
		cfg.endpoint = endpoint.trim_end_matches('/').to_string();
	}

	let tracer = Tracer::new(cfg)?;
	let run = select_competitor(&tracer, &args.asin)?;

	tracing::info!(
		run_id = %run.id,
		status = run.status.as_str(),
		steps = run.steps.len(),
		"Pipeline finished."
	);

	for step in &run.steps {
		tracing::info!(
			step = %step.step_name,
			candidates_in = ?step.candidates_in,
			candidates_out = ?step.candidates_out,
			elimination_rate = ?step.elimination_rate(),
			sampled = step.candidates.len(),
			"Step recorded."
		);
	}

	tokio::time::sleep(Duration::from_millis(args.flush_ms)).await;

	Ok(())
}

/// Runs keyword generation, catalog search, filtering, ranking, and a final judgement.
pub fn select_competitor(tracer: &Tracer, asin: &str) -> xray_sdk::Result<Run> {
	let mut run = tracer.start_run(
		"competitor-selection",
		json!({ "asin": asin, "title": "Adjustable LED desk lamp" }),
		Some(object(json!({ "source": "xray-demo" }))),
	);

	let keywords = ["desk lamp", "led lamp", "reading light"];

	{
		let mut step = run.add_step("keyword_generation", StepType::Llm)?;
		let generated = CandidateInput::indexed(keywords.iter().map(|keyword| json!(keyword)));

		step.record_input(json!({ "title": "Adjustable LED desk lamp" }))
			.record_candidates(&generated, CandidateStatus::Accepted)?
			.record_llm_decision("Kept the product noun and its two most common modifiers.", None)?
			.record_output(json!(keywords));
	}

	let catalog = catalog();

	run.add_step("catalog_search", StepType::Api)?
		.record_input(json!({ "keywords": keywords, "limit": CATALOG_SIZE }))
		.record_candidates(&catalog, CandidateStatus::Accepted)?
		.record_output(json!({ "hits": catalog.len() }));

	let affordable: Vec<CandidateInput> =
		catalog.iter().filter(|item| price(item) <= MAX_PRICE).cloned().collect();
	let well_rated: Vec<CandidateInput> = affordable
		.iter()
		.filter(|item| rating(item) >= MIN_RATING)
		.cloned()
		.map(|item| item.with_reason(format!("Rated at least {MIN_RATING}.")))
		.collect();

	run.add_step("quality_filter", StepType::Filter)?
		.record_filtering(
			&catalog,
			&affordable,
			"price_band",
			"range",
			Some(object(json!({ "max": MAX_PRICE }))),
		)?
		.record_filtering(
			&affordable,
			&well_rated,
			"min_rating",
			"threshold",
			Some(object(json!({ "min": MIN_RATING }))),
		)?
		.record_output(json!({ "remaining": well_rated.len() }));

	let mut ranked: Vec<CandidateInput> = well_rated
		.iter()
		.map(|item| item.clone().with_score(relevance(item)))
		.collect();

	ranked.sort_by(|a, b| b.score.unwrap_or_default().total_cmp(&a.score.unwrap_or_default()));

	let shortlist: Vec<CandidateInput> = ranked.iter().take(SHORTLIST).cloned().collect();

	run.add_step("relevance_rank", StepType::Rank)?
		.set_metadata(&object(json!({ "model": "bm25", "shortlist": SHORTLIST })))
		.record_filtering(&ranked, &shortlist, "top_k", "limit", None)?
		.record_output(json!(shortlist.iter().map(|item| item.key.clone()).collect::<Vec<_>>()));

	let Some(best) = shortlist.first().cloned() else {
		return Ok(run.fail("No candidate survived filtering."));
	};
	let pick = [best.clone().with_reason("Closest price and category to the reference.")];

	run.add_step("judge", StepType::Llm)?
		.record_filtering(&shortlist, &pick, "llm_judge", "llm", None)?
		.record_llm_decision(
			format!(
				"Chose {} for the highest relevance ({:.3}) inside the price band.",
				best.key,
				best.score.unwrap_or_default()
			),
			Some(1),
		)?
		.record_output(best.data.clone());

	run.set_metadata(&object(json!({ "shortlist": SHORTLIST })));

	Ok(run.complete(json!({ "asin": best.key, "product": best.data })))
}

fn catalog() -> Vec<CandidateInput> {
	(0..CATALOG_SIZE)
		.map(|idx| {
			let data = json!({
				"asin": format!("B0{idx:08}"),
				"price": 5.0 + (idx * 37 % 950) as f64 / 10.0,
				"rating": 3.0 + (idx * 13 % 21) as f64 / 10.0,
				"category": if idx % 3 == 0 { "lamps" } else { "lighting" },
			});

			CandidateInput::new(format!("B0{idx:08}"), data)
		})
		.collect()
}

fn price(item: &CandidateInput) -> f64 {
	item.data["price"].as_f64().unwrap_or(f64::MAX)
}

fn rating(item: &CandidateInput) -> f64 {
	item.data["rating"].as_f64().unwrap_or_default()
}

fn relevance(item: &CandidateInput) -> f64 {
	let category = if item.data["category"] == "lamps" { 1.0 } else { 0.5 };

	category * rating(item) / 5.0 - price(item) / 400.0
}

fn object(value: Value) -> Metadata {
	match value {
		Value::Object(map) => map,
		_ => Metadata::new(),
	}
}

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
