//! Decides which members of a step's intermediate result set are persisted.
//!
//! Rejections are sampled positionally: the first `min(max(ceil(n * rate), 5), n)` candidates in
//! input order are kept, so replaying the same input yields the same subset. Every other
//! disposition is retained in full.

use std::{borrow::Borrow, collections::HashSet};

use serde_json::Value;
use uuid::Uuid;

use crate::model::{Candidate, CandidateStatus};
use xray_config::Sampling;

/// Lower bound on retained rejections, so tiny rates still leave something to inspect.
pub const MIN_REJECTED_SAMPLE: usize = 5;

/// A member of a pipeline's intermediate result set, carrying the stable key used to tell
/// candidates apart across filtering stages.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateInput {
	pub key: String,
	pub data: Value,
	pub score: Option<f64>,
	pub reason: Option<String>,
}
impl CandidateInput {
	pub fn new(key: impl Into<String>, data: Value) -> Self {
		Self { key: key.into(), data, score: None, reason: None }
	}

	/// Keys the candidate by a BLAKE3 digest of its JSON encoding.
	///
	/// Structurally identical values collapse to the same key; use [`CandidateInput::new`] when
	/// duplicates must stay distinct.
	pub fn hashed(data: Value) -> Self {
		let key = blake3::hash(data.to_string().as_bytes()).to_hex().to_string();

		Self::new(key, data)
	}

	/// Keys each value by its position in `values`.
	pub fn indexed<I>(values: I) -> Vec<Self>
	where
		I: IntoIterator<Item = Value>,
	{
		values.into_iter().enumerate().map(|(idx, data)| Self::new(idx.to_string(), data)).collect()
	}

	pub fn with_score(mut self, score: f64) -> Self {
		self.score = Some(score);

		self
	}

	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}
}

/// Number of rejected candidates kept out of `n` at the given rate.
pub fn rejected_sample_size(n: usize, sample_rate: f64) -> usize {
	if n == 0 {
		return 0;
	}

	let by_rate = (n as f64 * sample_rate).ceil() as usize;

	by_rate.max(MIN_REJECTED_SAMPLE).min(n)
}

/// Splits `before` into the members whose key is missing from `after` and the members that
/// survived. Every element of `before` lands in exactly one side.
pub fn partition_by_key<'a, B, A>(before: &'a [B], after: &[A]) -> (Vec<&'a B>, Vec<&'a B>)
where
	B: Borrow<CandidateInput>,
	A: Borrow<CandidateInput>,
{
	let kept: HashSet<&str> = after.iter().map(key_of).collect();

	before.iter().partition(|candidate| !kept.contains(key_of(*candidate)))
}

/// Applies the sampling policy and materializes the retained candidates for `step_id`.
///
/// `rejection_filter` names the filter responsible when `disposition` is a rejection.
pub fn sample_candidates<C>(
	step_id: Uuid,
	candidates: &[C],
	disposition: CandidateStatus,
	rejection_filter: Option<&str>,
	cfg: &Sampling,
) -> Vec<Candidate>
where
	C: Borrow<CandidateInput>,
{
	retained_indices(candidates, disposition, cfg)
		.into_iter()
		.map(|idx| {
			to_candidate(step_id, input_of(&candidates[idx]), disposition, rejection_filter)
		})
		.collect()
}

fn retained_indices<C>(candidates: &[C], disposition: CandidateStatus, cfg: &Sampling) -> Vec<usize>
where
	C: Borrow<CandidateInput>,
{
	let n = candidates.len();

	match disposition {
		CandidateStatus::Accepted if cfg.keep_all_outputs => (0..n).collect(),
		CandidateStatus::Rejected => {
			let prefix = rejected_sample_size(n, cfg.sample_rate);
			let mut indices: Vec<usize> = (0..prefix).collect();

			indices.extend(near_threshold(candidates, prefix, cfg.keep_threshold_candidates));
			indices.sort_unstable();

			indices
		},
		_ => (0..n).collect(),
	}
}

/// Highest-scored candidates after the positional prefix; unscored candidates never qualify.
fn near_threshold<C>(candidates: &[C], prefix: usize, limit: u32) -> Vec<usize>
where
	C: Borrow<CandidateInput>,
{
	if limit == 0 {
		return Vec::new();
	}

	let mut scored: Vec<(usize, f64)> = candidates
		.iter()
		.enumerate()
		.skip(prefix)
		.filter_map(|(idx, candidate)| {
			input_of(candidate).score.filter(|score| score.is_finite()).map(|score| (idx, score))
		})
		.collect();

	scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
	scored.truncate(limit as usize);

	scored.into_iter().map(|(idx, _)| idx).collect()
}

fn input_of<C>(candidate: &C) -> &CandidateInput
where
	C: Borrow<CandidateInput>,
{
	<C as Borrow<CandidateInput>>::borrow(candidate)
}

fn key_of<C>(candidate: &C) -> &str
where
	C: Borrow<CandidateInput>,
{
	input_of(candidate).key.as_str()
}

fn to_candidate(
	step_id: Uuid,
	input: &CandidateInput,
	status: CandidateStatus,
	rejection_filter: Option<&str>,
) -> Candidate {
	let rejected = status != CandidateStatus::Accepted;
	let (reason, rejection_reason) = if rejected {
		let fallback = rejection_filter.map(|filter| format!("Removed by filter {filter}."));

		(None, input.reason.clone().or(fallback))
	} else {
		(input.reason.clone(), None)
	};

	Candidate {
		id: Uuid::new_v4(),
		step_id,
		candidate_data: input.data.clone(),
		status,
		score: input.score,
		reason,
		rejection_reason,
		rejection_filter: if rejected { rejection_filter.map(str::to_string) } else { None },
	}
}
