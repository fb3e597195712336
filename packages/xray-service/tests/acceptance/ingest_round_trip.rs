use serde_json::json;
use uuid::Uuid;

use xray_domain::{CandidateStatus, RunStatus, StepType};
use xray_service::Error;

use super::RunFixture;

#[tokio::test]
#[ignore = "Requires external Postgres. Set XRAY_PG_DSN to run."]
async fn ingested_run_reads_back_intact() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping ingested_run_reads_back_intact; set XRAY_PG_DSN to run this test.");

		return;
	};
	let service = super::build_service(&test_db).await;
	let run = RunFixture::new("competitor-selection")
		.step("keyword_generation", StepType::Llm, None, 3)
		.step("catalog_search", StepType::Api, None, 5_000)
		.candidates(5_000, CandidateStatus::Accepted)
		.step("price_filter", StepType::Filter, Some(5_000), 450)
		.candidates(450, CandidateStatus::Accepted)
		.candidates(46, CandidateStatus::Rejected)
		.complete(json!({ "asin": "B0PICK" }));
	let response = service.ingest_run(&run).await.expect("Failed to ingest run.");

	assert!(response.success);
	assert_eq!(response.run_id, run.id);

	let stored = service.get_run(run.id).await.expect("Failed to fetch run.");

	assert_eq!(stored.pipeline_name, "competitor-selection");
	assert_eq!(stored.status, RunStatus::Completed);
	assert_eq!(stored.output, Some(json!({ "asin": "B0PICK" })));
	assert_eq!(stored.steps.len(), 3);

	let names: Vec<&str> = stored.steps.iter().map(|step| step.step_name.as_str()).collect();

	assert_eq!(names, ["keyword_generation", "catalog_search", "price_filter"]);

	let counts: Vec<usize> = stored.steps.iter().map(|step| step.candidates.len()).collect();

	assert_eq!(counts, [0, 5_000, 496]);
	assert_eq!(stored.steps[2].filters_applied.len(), 1);
	assert_eq!(stored.steps[2].filters_applied[0].candidates_after, 450);

	let rejected = stored.steps[2]
		.candidates
		.iter()
		.filter(|candidate| candidate.status == CandidateStatus::Rejected)
		.count();

	assert_eq!(rejected, 46);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set XRAY_PG_DSN to run."]
async fn unknown_run_is_not_found() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping unknown_run_is_not_found; set XRAY_PG_DSN to run this test.");

		return;
	};
	let service = super::build_service(&test_db).await;
	let err = service.get_run(Uuid::new_v4()).await;

	assert!(matches!(err, Err(Error::NotFound { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set XRAY_PG_DSN to run."]
async fn resubmitted_run_fails_without_partial_writes() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping resubmitted_run_fails_without_partial_writes; set XRAY_PG_DSN to run.");

		return;
	};
	let service = super::build_service(&test_db).await;
	let run = RunFixture::new("competitor-selection")
		.step("catalog_search", StepType::Api, None, 10)
		.candidates(10, CandidateStatus::Accepted)
		.complete(json!({}));

	service.ingest_run(&run).await.expect("Failed to ingest run.");

	let err = service.ingest_run(&run).await;

	assert!(matches!(err, Err(Error::Storage { .. })));

	let candidates: i64 = sqlx::query_scalar("SELECT count(*) FROM candidates")
		.fetch_one(&service.db.pool)
		.await
		.expect("Failed to count candidates.");

	assert_eq!(candidates, 10);

	let mut clashing = RunFixture::new("competitor-selection")
		.step("catalog_search", StepType::Api, None, 10)
		.complete(json!({}));

	clashing.steps[0].id = run.steps[0].id;

	assert!(service.ingest_run(&clashing).await.is_err());

	let runs: i64 = sqlx::query_scalar("SELECT count(*) FROM runs")
		.fetch_one(&service.db.pool)
		.await
		.expect("Failed to count runs.");

	assert_eq!(runs, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
