use serde_json::json;
use time::{Duration, OffsetDateTime};

use xray_service::{Error, ListRunsRequest};

use super::RunFixture;

#[tokio::test]
#[ignore = "Requires external Postgres. Set XRAY_PG_DSN to run."]
async fn runs_page_newest_first_with_totals() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping runs_page_newest_first_with_totals; set XRAY_PG_DSN to run this test.");

		return;
	};
	let service = super::build_service(&test_db).await;
	let origin = OffsetDateTime::now_utc() - Duration::hours(1);
	let mut ids = Vec::new();

	for minute in 0..5 {
		let pipeline = if minute % 2 == 0 { "competitor-selection" } else { "listing-optimizer" };
		let run = RunFixture::started_at(pipeline, origin + Duration::minutes(minute))
			.complete(json!({}));

		service.ingest_run(&run).await.expect("Failed to ingest run.");
		ids.push(run.id);
	}

	let first = service
		.list_runs(ListRunsRequest { page: Some(1), limit: Some(2), ..ListRunsRequest::default() })
		.await
		.expect("Failed to list runs.");

	assert_eq!(first.pagination.total, 5);
	assert_eq!(first.pagination.total_pages, 3);
	assert_eq!(first.runs[0].id, ids[4]);
	assert_eq!(first.runs[1].id, ids[3]);

	let last = service
		.list_runs(ListRunsRequest { page: Some(3), limit: Some(2), ..ListRunsRequest::default() })
		.await
		.expect("Failed to list runs.");

	assert_eq!(last.runs.len(), 1);
	assert_eq!(last.runs[0].id, ids[0]);

	let selection = service
		.list_runs(ListRunsRequest {
			pipeline_name: Some("competitor-selection".to_string()),
			..ListRunsRequest::default()
		})
		.await
		.expect("Failed to list runs.");

	assert_eq!(selection.pagination.total, 3);
	assert_eq!(selection.pagination.limit, 20);

	let err = service
		.list_runs(ListRunsRequest { limit: Some(1_000), ..ListRunsRequest::default() })
		.await;

	assert!(matches!(err, Err(Error::InvalidRequest { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
