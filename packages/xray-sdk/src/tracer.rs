//! In-process construction of a run trace.
//!
//! A [`RunTrace`] is owned by the pipeline execution that started it. Steps are appended in
//! creation order and recorded through [`StepTrace`]. `complete` and `fail` consume the trace, so
//! a finished run cannot be mutated, and hand a copy to the transport without waiting on it.

use std::{fmt::Display, sync::Arc};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, HttpTransport, Result, Transport, dispatch};
use xray_config::Sampling;
use xray_domain::{
	CandidateInput, CandidateStatus, FilterApplication, Metadata, Run, RunStatus, Step, StepType,
	merge_metadata, partition_by_key, sample_candidates,
};

pub struct Tracer {
	cfg: xray_config::Tracer,
	transport: Arc<dyn Transport>,
}
impl Tracer {
	/// Builds a tracer that posts finished runs to `cfg.endpoint`.
	pub fn new(cfg: xray_config::Tracer) -> Result<Self> {
		xray_config::validate_tracer(&cfg)?;

		let transport = Arc::new(HttpTransport::new(&cfg)?);

		Ok(Self { cfg, transport })
	}

	pub fn with_transport(cfg: xray_config::Tracer, transport: Arc<dyn Transport>) -> Result<Self> {
		xray_config::validate_tracer(&cfg)?;

		Ok(Self { cfg, transport })
	}

	pub fn config(&self) -> &xray_config::Tracer {
		&self.cfg
	}

	pub fn start_run(
		&self,
		pipeline_name: impl Into<String>,
		input: Value,
		metadata: Option<Metadata>,
	) -> RunTrace {
		let run = Run {
			id: Uuid::new_v4(),
			pipeline_name: pipeline_name.into(),
			status: RunStatus::Running,
			started_at: OffsetDateTime::now_utc(),
			completed_at: None,
			input,
			output: None,
			metadata,
			steps: Vec::new(),
		};

		tracing::debug!(run_id = %run.id, pipeline = %run.pipeline_name, "Run trace started.");

		RunTrace { run, sampling: self.cfg.sampling.clone(), transport: self.transport.clone() }
	}
}

pub struct RunTrace {
	run: Run,
	sampling: Sampling,
	transport: Arc<dyn Transport>,
}
impl RunTrace {
	pub fn id(&self) -> Uuid {
		self.run.id
	}

	pub fn run(&self) -> &Run {
		&self.run
	}

	/// Appends a new step at the next index.
	pub fn add_step(
		&mut self,
		name: impl Into<String>,
		step_type: StepType,
	) -> Result<StepTrace<'_>> {
		let index = self.run.steps.len();
		let step_index = to_count(index)?;
		let step = Step {
			id: Uuid::new_v4(),
			run_id: self.run.id,
			step_name: name.into(),
			step_type,
			step_index,
			started_at: OffsetDateTime::now_utc(),
			completed_at: None,
			duration_ms: None,
			input: None,
			output: None,
			candidates_in: None,
			candidates_out: None,
			reasoning: None,
			filters_applied: Vec::new(),
			metadata: None,
			candidates: Vec::new(),
		};

		self.run.steps.push(step);

		Ok(StepTrace { step: &mut self.run.steps[index], sampling: &self.sampling })
	}

	/// Reopens an earlier step for further recording.
	pub fn step_mut(&mut self, index: u32) -> Option<StepTrace<'_>> {
		let step = self.run.steps.get_mut(index as usize)?;

		Some(StepTrace { step, sampling: &self.sampling })
	}

	pub fn set_metadata(&mut self, patch: &Metadata) {
		self.run.metadata = Some(merge_metadata(self.run.metadata.as_ref(), patch));
	}

	pub fn complete(self, output: Value) -> Run {
		self.finish(RunStatus::Completed, Some(output), None)
	}

	/// Marks the run failed, keeping `error` under the `error` metadata key.
	pub fn fail(self, error: impl Display) -> Run {
		let mut patch = Metadata::new();

		patch.insert("error".to_string(), Value::String(error.to_string()));

		self.finish(RunStatus::Failed, None, Some(patch))
	}

	fn finish(mut self, status: RunStatus, output: Option<Value>, patch: Option<Metadata>) -> Run {
		if let Some(patch) = patch {
			self.set_metadata(&patch);
		}

		self.run.status = status;
		self.run.output = output;
		self.run.completed_at = Some(OffsetDateTime::now_utc());

		tracing::debug!(
			run_id = %self.run.id,
			status = status.as_str(),
			steps = self.run.steps.len(),
			"Run trace finished."
		);

		dispatch(self.transport, self.run.clone());

		self.run
	}
}

pub struct StepTrace<'a> {
	step: &'a mut Step,
	sampling: &'a Sampling,
}
impl StepTrace<'_> {
	pub fn step(&self) -> &Step {
		self.step
	}

	pub fn record_input(&mut self, value: Value) -> &mut Self {
		self.step.input = Some(value);

		self
	}

	/// Stores the output and stamps completion time and duration.
	pub fn record_output(&mut self, value: Value) -> &mut Self {
		let now = OffsetDateTime::now_utc();

		self.step.output = Some(value);
		self.step.completed_at = Some(now);
		self.step.duration_ms = Some((now - self.step.started_at).whole_milliseconds() as i64);

		self
	}

	/// Samples `candidates` into the step.
	///
	/// For accepted candidates `candidates_out` is set to the full count, not the retained one.
	pub fn record_candidates(
		&mut self,
		candidates: &[CandidateInput],
		disposition: CandidateStatus,
	) -> Result<&mut Self> {
		if disposition == CandidateStatus::Accepted {
			let count = to_count(candidates.len())?;

			check_counts(self.step.candidates_in, Some(count))?;

			self.step.candidates_out = Some(count);
		}

		let sampled = sample_candidates(self.step.id, candidates, disposition, None, self.sampling);

		self.step.candidates.extend(sampled);

		Ok(self)
	}

	/// Records one filtering pass from `before` to `after`.
	///
	/// Candidates are matched across the two sets by key. Keys in `before` but not in `after` are
	/// sampled as rejections attributed to `filter_name`; `after` is sampled as accepted. Each pass
	/// sets the step counts from its own `before` and `after`.
	pub fn record_filtering(
		&mut self,
		before: &[CandidateInput],
		after: &[CandidateInput],
		filter_name: &str,
		filter_type: &str,
		parameters: Option<Metadata>,
	) -> Result<&mut Self> {
		let before_count = to_count(before.len())?;
		let after_count = to_count(after.len())?;

		check_counts(Some(before_count), Some(after_count))?;

		let (rejected, _) = partition_by_key(before, after);
		let step_id = self.step.id;

		self.step.candidates_in = Some(before_count);
		self.step.candidates_out = Some(after_count);
		self.step.filters_applied.push(FilterApplication::new(
			filter_name,
			filter_type,
			parameters,
			before_count,
			after_count,
		));
		self.step.candidates.extend(sample_candidates(
			step_id,
			&rejected,
			CandidateStatus::Rejected,
			Some(filter_name),
			self.sampling,
		));
		self.step.candidates.extend(sample_candidates(
			step_id,
			after,
			CandidateStatus::Accepted,
			None,
			self.sampling,
		));

		Ok(self)
	}

	/// Records the reasoning behind an LLM-driven decision and marks the step as `llm`.
	pub fn record_llm_decision(
		&mut self,
		reasoning: impl Into<String>,
		candidates_out: Option<u32>,
	) -> Result<&mut Self> {
		if candidates_out.is_some() {
			check_counts(self.step.candidates_in, candidates_out)?;

			self.step.candidates_out = candidates_out;
		}

		self.step.step_type = StepType::Llm;
		self.step.reasoning = Some(reasoning.into());

		Ok(self)
	}

	pub fn set_metadata(&mut self, patch: &Metadata) -> &mut Self {
		self.step.metadata = Some(merge_metadata(self.step.metadata.as_ref(), patch));

		self
	}
}

fn to_count(len: usize) -> Result<u32> {
	u32::try_from(len).map_err(|_| Error::InvalidCounts {
		message: format!("{len} candidates exceed the supported maximum."),
	})
}

fn check_counts(candidates_in: Option<u32>, candidates_out: Option<u32>) -> Result<()> {
	if let (Some(before), Some(after)) = (candidates_in, candidates_out)
		&& after > before
	{
		return Err(Error::InvalidCounts {
			message: format!("candidates_out ({after}) exceeds candidates_in ({before})."),
		});
	}

	Ok(())
}
