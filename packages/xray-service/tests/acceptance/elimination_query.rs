use serde_json::json;

use xray_domain::{CandidateStatus, StepType};
use xray_service::{QueryRequest, QueryResponse};

use super::RunFixture;

#[tokio::test]
#[ignore = "Requires external Postgres. Set XRAY_PG_DSN to run."]
async fn elimination_query_orders_matches_by_rate() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping elimination_query_orders_matches_by_rate; set XRAY_PG_DSN to run.");

		return;
	};
	let service = super::build_service(&test_db).await;
	let run = RunFixture::new("competitor-selection")
		.step("catalog_search", StepType::Api, None, 5_000)
		.step("price_filter", StepType::Filter, Some(5_000), 450)
		.candidates(450, CandidateStatus::Accepted)
		.candidates(46, CandidateStatus::Rejected)
		.step("rating_filter", StepType::Filter, Some(450), 30)
		.complete(json!({ "asin": "B0PICK" }));

	service.ingest_run(&run).await.expect("Failed to ingest run.");

	let response = service
		.query(QueryRequest { min_elimination_rate: Some(0.9), ..QueryRequest::default() })
		.await
		.expect("Failed to run elimination query.");
	let QueryResponse::Steps(matches) = response else {
		panic!("Expected step matches.");
	};

	assert_eq!(matches.len(), 2);
	assert_eq!(matches[0].step_index, 2);
	assert!((matches[0].elimination_rate - 0.9333).abs() < 1e-4);
	assert_eq!(matches[1].step_index, 1);
	assert!((matches[1].elimination_rate - 0.91).abs() < 1e-4);
	assert!(matches.iter().all(|step| step.run_id == run.id));
	assert!(matches.iter().all(|step| step.pipeline_name == "competitor-selection"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set XRAY_PG_DSN to run."]
async fn elimination_query_skips_empty_steps_and_honors_filters() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping elimination_query_skips_empty_steps_and_honors_filters; set XRAY_PG_DSN to run."
		);

		return;
	};
	let service = super::build_service(&test_db).await;
	let selection = RunFixture::new("competitor-selection")
		.step("empty_filter", StepType::Filter, Some(0), 0)
		.step("judge", StepType::Llm, Some(20), 1)
		.complete(json!({}));
	let optimizer = RunFixture::new("listing-optimizer")
		.step("dedupe", StepType::Filter, Some(100), 2)
		.fail();

	service.ingest_run(&selection).await.expect("Failed to ingest run.");
	service.ingest_run(&optimizer).await.expect("Failed to ingest run.");

	let everything = service
		.query(QueryRequest { min_elimination_rate: Some(0.0), ..QueryRequest::default() })
		.await
		.expect("Failed to run elimination query.");
	let QueryResponse::Steps(everything) = everything else {
		panic!("Expected step matches.");
	};

	assert_eq!(everything.len(), 2);
	assert!(everything.iter().all(|step| step.step_name != "empty_filter"));

	let llm_only = service
		.query(QueryRequest {
			min_elimination_rate: Some(0.5),
			step_type: Some("llm".to_string()),
			..QueryRequest::default()
		})
		.await
		.expect("Failed to run elimination query.");
	let QueryResponse::Steps(llm_only) = llm_only else {
		panic!("Expected step matches.");
	};

	assert_eq!(llm_only.len(), 1);
	assert_eq!(llm_only[0].step_name, "judge");

	let optimizer_only = service
		.query(QueryRequest {
			min_elimination_rate: Some(0.5),
			pipeline_name: Some("listing-optimizer".to_string()),
			..QueryRequest::default()
		})
		.await
		.expect("Failed to run elimination query.");
	let QueryResponse::Steps(optimizer_only) = optimizer_only else {
		panic!("Expected step matches.");
	};

	assert_eq!(optimizer_only.len(), 1);
	assert_eq!(optimizer_only[0].step_name, "dedupe");

	let err = service
		.query(QueryRequest { min_elimination_rate: Some(1.5), ..QueryRequest::default() })
		.await;

	assert!(matches!(err, Err(xray_service::Error::InvalidRequest { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set XRAY_PG_DSN to run."]
async fn query_without_threshold_returns_recent_runs() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping query_without_threshold_returns_recent_runs; set XRAY_PG_DSN to run.");

		return;
	};
	let service = super::build_service(&test_db).await;

	for _ in 0..3 {
		let run = RunFixture::new("competitor-selection")
			.step("catalog_search", StepType::Api, None, 10)
			.complete(json!({}));

		service.ingest_run(&run).await.expect("Failed to ingest run.");
	}

	let failed = RunFixture::new("competitor-selection").fail();

	service.ingest_run(&failed).await.expect("Failed to ingest run.");

	let QueryResponse::Runs(recent) =
		service.query(QueryRequest::default()).await.expect("Failed to query recent runs.")
	else {
		panic!("Expected recent runs.");
	};

	assert_eq!(recent.len(), 4);

	let QueryResponse::Runs(failed_only) = service
		.query(QueryRequest { status: Some("failed".to_string()), ..QueryRequest::default() })
		.await
		.expect("Failed to query recent runs.")
	else {
		panic!("Expected recent runs.");
	};

	assert_eq!(failed_only.len(), 1);
	assert_eq!(failed_only[0].id, failed.id);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
