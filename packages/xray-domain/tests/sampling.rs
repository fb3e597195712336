use std::collections::HashSet;

use serde_json::json;
use uuid::Uuid;

use xray_config::Sampling;
use xray_domain::{
	CandidateInput, CandidateStatus, partition_by_key, rejected_sample_size, sample_candidates,
};

fn products(count: usize) -> Vec<CandidateInput> {
	(0..count)
		.map(|idx| CandidateInput::new(format!("sku-{idx}"), json!({ "sku": idx })))
		.collect()
}

fn sampling(keep_all_outputs: bool, sample_rate: f64) -> Sampling {
	Sampling { keep_all_outputs, sample_rate, keep_threshold_candidates: 0 }
}

#[test]
fn keep_all_outputs_retains_every_accepted_candidate() {
	let step_id = Uuid::new_v4();

	for count in [0, 1, 7, 250] {
		let inputs = products(count);
		let retained = sample_candidates(
			step_id,
			&inputs,
			CandidateStatus::Accepted,
			None,
			&sampling(true, 0.01),
		);

		assert_eq!(retained.len(), count);
		assert!(retained.iter().all(|candidate| candidate.status == CandidateStatus::Accepted));
		assert!(retained.iter().all(|candidate| candidate.step_id == step_id));
		assert!(retained.iter().all(|candidate| candidate.rejection_filter.is_none()));
	}
}

#[test]
fn accepted_without_keep_all_is_not_rate_reduced() {
	let inputs = products(40);
	let retained = sample_candidates(
		Uuid::new_v4(),
		&inputs,
		CandidateStatus::Accepted,
		None,
		&sampling(false, 0.01),
	);

	assert_eq!(retained.len(), 40);
}

#[test]
fn rejected_sample_is_a_deterministic_prefix() {
	let inputs = products(4_550);
	let cfg = sampling(true, 0.01);
	let first = sample_candidates(
		Uuid::new_v4(),
		&inputs,
		CandidateStatus::Rejected,
		Some("price_band"),
		&cfg,
	);
	let second = sample_candidates(
		Uuid::new_v4(),
		&inputs,
		CandidateStatus::Rejected,
		Some("price_band"),
		&cfg,
	);

	assert_eq!(first.len(), 46);
	assert_eq!(first.len(), rejected_sample_size(inputs.len(), cfg.sample_rate));

	for (idx, candidate) in first.iter().enumerate() {
		assert_eq!(candidate.candidate_data, json!({ "sku": idx }));
		assert_eq!(candidate.candidate_data, second[idx].candidate_data);
		assert_eq!(candidate.status, CandidateStatus::Rejected);
		assert_eq!(candidate.rejection_filter.as_deref(), Some("price_band"));
		assert_eq!(candidate.rejection_reason.as_deref(), Some("Removed by filter price_band."));
	}
}

#[test]
fn rejected_sample_never_exceeds_available() {
	let inputs = products(3);
	let retained = sample_candidates(
		Uuid::new_v4(),
		&inputs,
		CandidateStatus::Rejected,
		Some("stock"),
		&sampling(true, 0.01),
	);

	assert_eq!(retained.len(), 3);
}

#[test]
fn empty_input_yields_empty_output() {
	let inputs: Vec<CandidateInput> = Vec::new();

	for status in [CandidateStatus::Accepted, CandidateStatus::Rejected, CandidateStatus::FilteredOut]
	{
		assert!(
			sample_candidates(Uuid::new_v4(), &inputs, status, None, &sampling(true, 0.5))
				.is_empty()
		);
	}
}

#[test]
fn caller_reason_wins_over_filter_fallback() {
	let inputs = vec![CandidateInput::new("a", json!("a")).with_reason("Out of stock.")];
	let retained = sample_candidates(
		Uuid::new_v4(),
		&inputs,
		CandidateStatus::Rejected,
		Some("stock"),
		&sampling(true, 0.01),
	);

	assert_eq!(retained[0].rejection_reason.as_deref(), Some("Out of stock."));
	assert!(retained[0].reason.is_none());
}

#[test]
fn threshold_candidates_add_highest_scores_beyond_prefix() {
	let mut inputs = products(20);

	inputs[12].score = Some(0.89);
	inputs[17].score = Some(0.95);
	inputs[3].score = Some(0.99);
	inputs[9].score = Some(0.10);

	let cfg = Sampling { keep_all_outputs: true, sample_rate: 0.0, keep_threshold_candidates: 2 };
	let retained =
		sample_candidates(Uuid::new_v4(), &inputs, CandidateStatus::Rejected, Some("score"), &cfg);
	let skus: Vec<_> =
		retained.iter().map(|candidate| candidate.candidate_data["sku"].clone()).collect();

	assert_eq!(skus, [json!(0), json!(1), json!(2), json!(3), json!(4), json!(12), json!(17)]);
}

#[test]
fn partition_is_exhaustive_and_disjoint() {
	let before = products(10);
	let after: Vec<CandidateInput> = before
		.iter()
		.filter(|candidate| candidate.data["sku"].as_u64() < Some(4))
		.cloned()
		.collect();
	let (rejected, survived) = partition_by_key(&before, &after);

	assert_eq!(rejected.len() + survived.len(), before.len());

	let rejected_keys: HashSet<&str> =
		rejected.iter().map(|candidate| candidate.key.as_str()).collect();
	let survived_keys: HashSet<&str> =
		survived.iter().map(|candidate| candidate.key.as_str()).collect();

	assert!(rejected_keys.is_disjoint(&survived_keys));
	assert_eq!(survived_keys, HashSet::from(["sku-0", "sku-1", "sku-2", "sku-3"]));
}

#[test]
fn partition_uses_keys_not_structural_equality() {
	let before = vec![
		CandidateInput::new("first", json!({ "name": "lamp" })),
		CandidateInput::new("second", json!({ "name": "lamp" })),
	];
	let after = vec![before[1].clone()];
	let (rejected, survived) = partition_by_key(&before, &after);

	assert_eq!(rejected.len(), 1);
	assert_eq!(rejected[0].key, "first");
	assert_eq!(survived[0].key, "second");
}
